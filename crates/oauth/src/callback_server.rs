//! Ephemeral localhost listener that receives one OAuth authorization code.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use {
    axum::{
        Router,
        extract::{Query, State},
        http::StatusCode,
        response::Html,
        routing::get,
    },
    tokio::{
        sync::{oneshot, watch},
        task::JoinHandle,
    },
    tracing::{debug, warn},
};

use crate::error::{Error, Result};

pub const CALLBACK_PATH: &str = "/auth/callback";

/// How long a graceful shutdown may take before the server task is aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Lifecycle of a [`CallbackListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Bound, nobody waiting on the code yet.
    Listening,
    /// A caller is blocked in [`CallbackListener::wait_for_code`].
    AwaitingCode,
    /// A code with the right state arrived and was handed over.
    Delivered,
    /// The provider reported an error, or the listener was dropped first.
    Rejected,
}

type CodeSender = oneshot::Sender<Result<String>>;

#[derive(Clone)]
struct Shared {
    expected_state: Arc<str>,
    sender: Arc<Mutex<Option<CodeSender>>>,
    status: Arc<watch::Sender<ListenerState>>,
}

impl Shared {
    fn take_sender(&self) -> Option<CodeSender> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Local HTTP server on `127.0.0.1` with an OS-assigned port.
///
/// The port is released when the listener is dropped or after
/// [`wait_for_code`](Self::wait_for_code) returns, whichever comes first.
pub struct CallbackListener {
    addr: SocketAddr,
    status: Arc<watch::Sender<ListenerState>>,
    code: Option<oneshot::Receiver<Result<String>>>,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
}

impl CallbackListener {
    /// Bind an ephemeral port and start serving. `expected_state` is the
    /// nonce placed in the authorization URL.
    pub async fn bind(expected_state: impl Into<String>) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;

        let (code_tx, code_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let status = Arc::new(watch::Sender::new(ListenerState::Listening));

        let shared = Shared {
            expected_state: Arc::from(expected_state.into()),
            sender: Arc::new(Mutex::new(Some(code_tx))),
            status: Arc::clone(&status),
        };
        let app = Router::new()
            .route(CALLBACK_PATH, get(callback))
            .fallback(|| async { StatusCode::NOT_FOUND })
            .with_state(shared);

        let server = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                warn!(error = %e, "callback listener stopped with an error");
            }
        });

        debug!(%addr, "callback listener bound");
        Ok(Self {
            addr,
            status,
            code: Some(code_rx),
            shutdown: Some(shutdown_tx),
            server: Some(server),
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Redirect URI to put in the authorization request.
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("http://{}{CALLBACK_PATH}", self.addr)
    }

    #[must_use]
    pub fn state(&self) -> ListenerState {
        *self.status.borrow()
    }

    /// Observe state changes, including after the listener is consumed.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ListenerState> {
        self.status.subscribe()
    }

    /// Block until a matching callback delivers a code, then shut down.
    ///
    /// There is no timeout; the user may take as long as they need.
    pub async fn wait_for_code(mut self) -> Result<String> {
        let code_rx = self
            .code
            .take()
            .ok_or_else(|| Error::message("callback listener already consumed"))?;

        self.status.send_if_modified(|s| {
            if *s == ListenerState::Listening {
                *s = ListenerState::AwaitingCode;
                true
            } else {
                false
            }
        });

        let result = match code_rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::authorization(
                "callback listener stopped before a code arrived",
            )),
        };
        self.shutdown().await;
        result
    }

    async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(mut server) = self.server.take()
            && tokio::time::timeout(SHUTDOWN_GRACE, &mut server)
                .await
                .is_err()
        {
            warn!("callback listener did not stop in time; aborting");
            server.abort();
        }
        debug!(addr = %self.addr, "callback listener closed");
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(server) = self.server.take() {
            server.abort();
        }
        self.status.send_if_modified(|s| {
            if *s == ListenerState::Delivered || *s == ListenerState::Rejected {
                false
            } else {
                *s = ListenerState::Rejected;
                true
            }
        });
    }
}

const SUCCESS_PAGE: &str =
    "<h1>Success!</h1><p>skiff is now authorized. You can close this window.</p>";

async fn callback(
    State(shared): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<String>) {
    if params.get("state").map(String::as_str) != Some(&*shared.expected_state) {
        warn!(
            has_state = params.contains_key("state"),
            "callback state does not match; ignoring request"
        );
        return failure(StatusCode::BAD_REQUEST, "state mismatch");
    }

    if let Some(error) = params.get("error") {
        let Some(tx) = shared.take_sender() else {
            return failure(StatusCode::CONFLICT, "authorization already completed");
        };
        let _ = tx.send(Err(Error::authorization(format!(
            "provider returned \"{error}\""
        ))));
        shared.status.send_replace(ListenerState::Rejected);
        return failure(StatusCode::BAD_REQUEST, "authorization was denied");
    }

    let Some(code) = params.get("code").filter(|c| !c.is_empty()) else {
        return failure(StatusCode::BAD_REQUEST, "missing code");
    };
    let Some(tx) = shared.take_sender() else {
        return failure(StatusCode::CONFLICT, "authorization already completed");
    };
    if tx.send(Ok(code.clone())).is_err() {
        return failure(StatusCode::GONE, "nobody is waiting for this code");
    }
    shared.status.send_replace(ListenerState::Delivered);
    debug!("authorization code delivered");
    (StatusCode::OK, Html(SUCCESS_PAGE.to_string()))
}

fn failure(status: StatusCode, reason: &str) -> (StatusCode, Html<String>) {
    (
        status,
        Html(format!("<h1>Authorization failed</h1><p>{reason}</p>")),
    )
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn http() -> reqwest::Client {
        reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn delivers_matching_code_once() {
        let listener = CallbackListener::bind("st-1").await.unwrap();
        let uri = listener.redirect_uri();
        let states = listener.watch_state();
        assert_eq!(listener.state(), ListenerState::Listening);

        let waiter = tokio::spawn(listener.wait_for_code());

        let resp = http()
            .get(&uri)
            .query(&[("state", "st-1"), ("code", "abc")])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        assert_eq!(waiter.await.unwrap().unwrap(), "abc");
        assert_eq!(*states.borrow(), ListenerState::Delivered);
    }

    #[tokio::test]
    async fn mismatched_state_keeps_waiting() {
        let listener = CallbackListener::bind("expected").await.unwrap();
        let uri = listener.redirect_uri();
        let states = listener.watch_state();
        let waiter = tokio::spawn(listener.wait_for_code());

        let resp = http()
            .get(&uri)
            .query(&[("state", "forged"), ("code", "evil")])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        assert_eq!(*states.borrow(), ListenerState::AwaitingCode);

        http()
            .get(&uri)
            .query(&[("state", "expected"), ("code", "good")])
            .send()
            .await
            .unwrap();
        assert_eq!(waiter.await.unwrap().unwrap(), "good");
    }

    #[tokio::test]
    async fn stray_requests_get_benign_errors() {
        let listener = CallbackListener::bind("s").await.unwrap();
        let base = format!("http://{}", listener.local_addr());

        let favicon = http()
            .get(format!("{base}/favicon.ico"))
            .send()
            .await
            .unwrap();
        assert_eq!(favicon.status(), StatusCode::NOT_FOUND);

        let no_code = http()
            .get(listener.redirect_uri())
            .query(&[("state", "s")])
            .send()
            .await
            .unwrap();
        assert_eq!(no_code.status(), StatusCode::BAD_REQUEST);
        assert_eq!(listener.state(), ListenerState::Listening);
    }

    #[tokio::test]
    async fn provider_error_rejects() {
        let listener = CallbackListener::bind("s").await.unwrap();
        let uri = listener.redirect_uri();
        let states = listener.watch_state();
        let waiter = tokio::spawn(listener.wait_for_code());

        http()
            .get(&uri)
            .query(&[("state", "s"), ("error", "access_denied")])
            .send()
            .await
            .unwrap();

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::AuthorizationFailed { .. }));
        assert!(err.to_string().contains("access_denied"));
        assert_eq!(*states.borrow(), ListenerState::Rejected);
    }

    #[tokio::test]
    async fn port_released_after_delivery() {
        let listener = CallbackListener::bind("s").await.unwrap();
        let addr = listener.local_addr();
        let uri = listener.redirect_uri();
        let waiter = tokio::spawn(listener.wait_for_code());

        http()
            .get(&uri)
            .query(&[("state", "s"), ("code", "c")])
            .send()
            .await
            .unwrap();
        waiter.await.unwrap().unwrap();

        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn dropped_listener_is_rejected_and_closed() {
        let listener = CallbackListener::bind("s").await.unwrap();
        let addr = listener.local_addr();
        let states = listener.watch_state();
        drop(listener);

        assert_eq!(*states.borrow(), ListenerState::Rejected);
        // Abort is processed on the next scheduler tick.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }
}
