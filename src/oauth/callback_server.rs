use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{Method, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};

use crate::config::CallbackSettings;
use crate::error::AppError;
use crate::oauth::state::state_matches;
use crate::oauth::types::AuthorizationCode;

/// How long a stopping server may take to drain its last connection
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Result of the one terminal callback request
#[derive(Debug)]
enum CallbackOutcome {
    Code(String),
    Rejected(String),
}

#[derive(Clone)]
struct CallbackState {
    capture: Arc<Mutex<Option<oneshot::Sender<CallbackOutcome>>>>,
    expected_state: Option<Arc<str>>,
}

/// Loopback listener that accepts exactly one OAuth redirect.
///
/// The socket is bound in [`CallbackListener::bind`], so a redirect that races
/// ahead of [`CallbackListener::wait`] sits in the accept backlog instead of
/// being refused.
pub struct CallbackListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    path: String,
    expected_state: Option<String>,
}

impl CallbackListener {
    /// Bind the loopback socket
    pub async fn bind(settings: &CallbackSettings) -> Result<Self, AppError> {
        let addr = format!("127.0.0.1:{}", settings.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            AppError::CallbackServer(format!("Failed to bind callback server on {}: {}", addr, e))
        })?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| AppError::CallbackServer(format!("Failed to read bound address: {}", e)))?;

        tracing::debug!(addr = %local_addr, path = %settings.path, "Callback listener bound");

        Ok(Self {
            listener,
            local_addr,
            path: settings.path.clone(),
            expected_state: None,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Redirect URI to register with the authorization request
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}{}", self.local_addr.port(), self.path)
    }

    /// Require the callback to echo `state`
    pub fn expect_state(&mut self, state: impl Into<String>) {
        self.expected_state = Some(state.into());
    }

    /// Serve until one terminal callback request arrives or `timeout` elapses.
    ///
    /// The server task is stopped and joined before this returns, whatever the outcome.
    pub async fn wait(self, timeout: Duration) -> Result<AuthorizationCode, AppError> {
        let (capture_tx, capture_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = CallbackState {
            capture: Arc::new(Mutex::new(Some(capture_tx))),
            expected_state: self.expected_state.map(Arc::from),
        };

        let app = Router::new()
            .route(&self.path, get(handle_callback))
            .fallback(not_found)
            .with_state(state);

        let mut server = tokio::spawn(async move {
            let result = axum::serve(self.listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "OAuth callback server error");
            }
        });

        let outcome = tokio::time::timeout(timeout, capture_rx).await;

        let _ = shutdown_tx.send(());
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await.is_err() {
            tracing::warn!("Callback server did not stop in time, aborting");
            server.abort();
        }

        match outcome {
            Ok(Ok(CallbackOutcome::Code(code))) => {
                tracing::info!("Authorization code received");
                AuthorizationCode::new(code)
            }
            Ok(Ok(CallbackOutcome::Rejected(reason))) => {
                tracing::warn!(reason = %reason, "Authorization callback rejected");
                Err(AppError::AuthorizationRejected(reason))
            }
            Ok(Err(_)) => Err(AppError::CallbackServer(
                "Callback channel closed unexpectedly".to_string(),
            )),
            Err(_) => Err(AppError::AuthorizationTimeout {
                seconds: timeout.as_secs(),
            }),
        }
    }
}

fn classify(params: &HashMap<String, String>, expected_state: Option<&str>) -> CallbackOutcome {
    let code = params.get("code").filter(|code| !code.is_empty());

    let Some(code) = code else {
        let reason = match (params.get("error"), params.get("error_description")) {
            (Some(error), Some(description)) => format!("{}: {}", error, description),
            (Some(error), None) => error.clone(),
            _ => "no authorization code in callback".to_string(),
        };
        return CallbackOutcome::Rejected(reason);
    };

    if let Some(expected) = expected_state {
        if !state_matches(expected, params.get("state").map(String::as_str)) {
            return CallbackOutcome::Rejected(
                "state parameter mismatch - possible CSRF attempt".to_string(),
            );
        }
    }

    CallbackOutcome::Code(code.clone())
}

async fn handle_callback(
    method: Method,
    State(state): State<CallbackState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    // Link prefetchers probe with HEAD; only the browser's GET is terminal
    if method != Method::GET {
        return (StatusCode::OK, Html(""));
    }

    let outcome = classify(&params, state.expected_state.as_deref());
    let accepted = matches!(outcome, CallbackOutcome::Code(_));

    if let Some(sender) = state.capture.lock().await.take() {
        let _ = sender.send(outcome);
    }

    if accepted {
        (StatusCode::OK, Html(SUCCESS_PAGE))
    } else {
        (StatusCode::BAD_REQUEST, Html(FAILURE_PAGE))
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Authorization Complete</title>
    <style>
        body { font-family: Arial, sans-serif; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; background-color: #f5f5f5; }
        .container { text-align: center; padding: 40px; background: white; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }
        h1 { color: #4CAF50; }
        p { color: #666; }
    </style>
</head>
<body>
    <div class="container">
        <h1>Authorization Successful</h1>
        <p>You can close this window and return to the application.</p>
    </div>
    <script>setTimeout(function(){ window.close(); }, 3000);</script>
</body>
</html>"#;

const FAILURE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Authorization Failed</title></head>
<body><h1>Authorization Failed</h1><p>No valid authorization code was received. Please restart the authorization from the application.</p></body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn ephemeral() -> CallbackSettings {
        CallbackSettings {
            port: 0,
            path: "/callback".to_string(),
        }
    }

    #[test]
    fn test_classify() {
        let params = |pairs: &[(&str, &str)]| -> HashMap<String, String> {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };

        assert!(matches!(
            classify(&params(&[("code", "abc"), ("state", "s")]), Some("s")),
            CallbackOutcome::Code(code) if code == "abc"
        ));
        assert!(matches!(
            classify(&params(&[("code", "abc")]), None),
            CallbackOutcome::Code(_)
        ));
        assert!(matches!(
            classify(&params(&[("code", "")]), None),
            CallbackOutcome::Rejected(_)
        ));
        assert!(matches!(
            classify(&params(&[("code", "abc"), ("state", "other")]), Some("s")),
            CallbackOutcome::Rejected(reason) if reason.contains("state")
        ));
        assert!(matches!(
            classify(&params(&[("error", "access_denied"), ("error_description", "user declined")]), None),
            CallbackOutcome::Rejected(reason) if reason == "access_denied: user declined"
        ));
    }

    #[tokio::test]
    async fn test_redirect_uri_uses_bound_port() {
        let listener = CallbackListener::bind(&ephemeral()).await.unwrap();
        let port = listener.local_addr().port();
        assert_ne!(port, 0);
        assert_eq!(
            listener.redirect_uri(),
            format!("http://localhost:{}/callback", port)
        );
    }

    #[tokio::test]
    async fn test_code_captured_and_listener_stops() {
        let mut listener = CallbackListener::bind(&ephemeral()).await.unwrap();
        listener.expect_state("expected-state");
        let addr = listener.local_addr();

        let waiter = tokio::spawn(listener.wait(Duration::from_secs(10)));

        let response = reqwest::get(format!(
            "http://{}/callback?code=abc&state=expected-state",
            addr
        ))
        .await
        .unwrap();
        assert_eq!(response.status(), 200);
        assert!(response.text().await.unwrap().contains("Authorization Successful"));

        let code = waiter.await.unwrap().unwrap();
        assert_eq!(code.as_str(), "abc");

        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_head_request_does_not_consume_callback() {
        let mut listener = CallbackListener::bind(&ephemeral()).await.unwrap();
        listener.expect_state("expected-state");
        let addr = listener.local_addr();
        let url = format!("http://{}/callback?code=abc&state=expected-state", addr);

        let waiter = tokio::spawn(listener.wait(Duration::from_secs(10)));

        let head = reqwest::Client::new().head(&url).send().await.unwrap();
        assert_eq!(head.status(), 200);
        assert!(!waiter.is_finished());

        let response = reqwest::get(&url).await.unwrap();
        assert_eq!(response.status(), 200);

        let code = waiter.await.unwrap().unwrap();
        assert_eq!(code.as_str(), "abc");
    }

    #[tokio::test]
    async fn test_missing_code_is_rejected_with_400() {
        let listener = CallbackListener::bind(&ephemeral()).await.unwrap();
        let addr = listener.local_addr();

        let waiter = tokio::spawn(listener.wait(Duration::from_secs(10)));

        let response = reqwest::get(format!("http://{}/callback?foo=bar", addr))
            .await
            .unwrap();
        assert_eq!(response.status(), 400);

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(AppError::AuthorizationRejected(_))));
    }

    #[tokio::test]
    async fn test_other_paths_return_404_and_keep_listening() {
        let listener = CallbackListener::bind(&ephemeral()).await.unwrap();
        let addr = listener.local_addr();

        let waiter = tokio::spawn(listener.wait(Duration::from_secs(10)));

        let favicon = reqwest::get(format!("http://{}/favicon.ico", addr))
            .await
            .unwrap();
        assert_eq!(favicon.status(), 404);
        assert!(!waiter.is_finished());

        let response = reqwest::get(format!("http://{}/callback?code=later", addr))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let code = waiter.await.unwrap().unwrap();
        assert_eq!(code.into_inner(), "later");
    }

    #[tokio::test]
    async fn test_state_mismatch_is_rejected() {
        let mut listener = CallbackListener::bind(&ephemeral()).await.unwrap();
        listener.expect_state("expected-state");
        let addr = listener.local_addr();

        let waiter = tokio::spawn(listener.wait(Duration::from_secs(10)));

        let response = reqwest::get(format!("http://{}/callback?code=abc&state=forged", addr))
            .await
            .unwrap();
        assert_eq!(response.status(), 400);

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(AppError::AuthorizationRejected(reason)) if reason.contains("state")));
    }

    #[tokio::test]
    async fn test_timeout_stops_listener() {
        let listener = CallbackListener::bind(&ephemeral()).await.unwrap();
        let addr = listener.local_addr();

        let result = listener.wait(Duration::from_millis(200)).await;
        assert!(matches!(result, Err(AppError::AuthorizationTimeout { .. })));

        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }
}
