//! Type-safe tool argument contracts.
//!
//! Every external command the orchestrator runs is described by a struct that
//! implements [`ToolArgs`]. The struct definition is the single place the
//! argument vector for that tool is built, so flag typos are compile errors
//! in one file rather than string mistakes scattered across the call sites.

/// Trait for typed tool arguments.
///
/// # Contract
///
/// - `program()`: the executable name, resolved through `PATH`.
/// - `to_cli_args()`: arguments exactly as the tool expects them.
/// - `mutates_host()`: whether running the tool changes host state. Used for
///   logging only; read-only queries are logged at debug.
///
/// # Example
///
/// ```ignore
/// use twinportal::tools::IpLinkArgs;
/// use twinportal::types::LinkState;
///
/// let args = IpLinkArgs { interface: "wlan0".into(), state: LinkState::Down };
/// assert_eq!(args.command_line(), "ip link set dev wlan0 down");
/// ```
pub trait ToolArgs {
    /// Executable name (e.g. `"systemctl"`).
    fn program(&self) -> &'static str;

    /// Convert struct fields to CLI arguments.
    fn to_cli_args(&self) -> Vec<String>;

    /// Whether the tool changes host state.
    fn mutates_host(&self) -> bool;

    /// Full command line for logs and test assertions.
    fn command_line(&self) -> String {
        let args = self.to_cli_args();
        if args.is_empty() {
            self.program().to_string()
        } else {
            format!("{} {}", self.program(), args.join(" "))
        }
    }
}
