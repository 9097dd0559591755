//! Victim notification.
//!
//! Notification is fire-and-forget from the engine's point of view: a
//! failing notifier is logged and never aborts a batch.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use havoc_core::{Instance, InstanceId};
use http::Uri;
use http_body_util::Full;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::NotifyError;

/// Boxed future returned by [`Notifier::notify`].
pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>>;

/// Announces that an instance was selected for termination.
pub trait Notifier: Send + Sync {
    fn notify<'a>(&'a self, victim: &'a Instance) -> NotifyFuture<'a>;
}

// ── Noop ──────────────────────────────────────────────────────────

/// Notifier that only remembers who it was told about.
#[derive(Debug, Default)]
pub struct NoopNotifier {
    calls: AtomicUsize,
    notified: Mutex<Vec<InstanceId>>,
}

impl NoopNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    pub async fn notified(&self) -> Vec<InstanceId> {
        self.notified.lock().await.clone()
    }
}

impl Notifier for NoopNotifier {
    fn notify<'a>(&'a self, victim: &'a Instance) -> NotifyFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.notified.lock().await.push(victim.id());
            Ok(())
        })
    }
}

// ── Webhook ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct WebhookMessage {
    text: String,
}

/// Posts `{"text": "..."}` to a plain-HTTP webhook for every victim.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    uri: Uri,
    address: String,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let invalid = |reason: &str| NotifyError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
        if uri.scheme_str() != Some("http") {
            return Err(invalid("only http:// webhooks are supported"));
        }
        let host = uri.host().ok_or_else(|| invalid("missing host"))?;
        let address = format!("{host}:{}", uri.port_u16().unwrap_or(80));

        Ok(Self {
            uri,
            address,
            timeout,
        })
    }

    pub fn url(&self) -> String {
        self.uri.to_string()
    }

    fn message(victim: &Instance) -> WebhookMessage {
        WebhookMessage {
            text: format!("Chaos event: instance {} is being terminated.", victim.key()),
        }
    }

    async fn post(&self, body: Vec<u8>) -> Result<(), NotifyError> {
        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let path = self
            .uri
            .path_and_query()
            .map(|p| p.as_str())
            .unwrap_or("/");
        let req = http::Request::builder()
            .method("POST")
            .uri(path)
            .header("host", &self.address)
            .header("content-type", "application/json")
            .header("user-agent", "havoc/0.1")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(NotifyError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}

impl Notifier for WebhookNotifier {
    fn notify<'a>(&'a self, victim: &'a Instance) -> NotifyFuture<'a> {
        Box::pin(async move {
            let body = serde_json::to_vec(&Self::message(victim))
                .map_err(|e| NotifyError::Request(e.to_string()))?;

            tokio::time::timeout(self.timeout, self.post(body))
                .await
                .map_err(|_| NotifyError::Timeout)??;

            debug!(instance = %victim.key(), url = %self.uri, "webhook notified");
            Ok(())
        })
    }
}
