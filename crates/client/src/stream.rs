// crates/client/src/stream.rs
//! Duplex progress-streaming client.
//!
//! One instance serves one document's progress channel. A driver task owns
//! the only transport connection; it decodes inbound frames, swallows
//! heartbeats, drops malformed frames, and reconnects with bounded linear
//! backoff. Callback delivery is strictly sequential, and nothing is
//! delivered after `unsubscribe()` — the `manually_closed` flag is checked
//! immediately before every delivery and is permanent for the instance.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use axiomflow_types::ProgressEvent;

use crate::config::{ClientConfig, StreamConfig};

/// Transport lifecycle of one stream instance.
///
/// `Closing` and `Closed` are sticky: once either is reached the state can
/// only move forward to `Closed`, which structurally rules out a
/// reconnection racing an unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle = 0,
    Connecting = 1,
    Open = 2,
    Closing = 3,
    Closed = 4,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Idle,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Open,
            3 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

/// Subscriber callbacks.
///
/// `on_event` never receives [`ProgressEvent::Heartbeat`] — heartbeats exist
/// to keep the transport alive and are consumed internally.
/// `on_connection_failed` fires at most once, when reconnection attempts are
/// exhausted; it is the one clear terminal notification, not a stream of
/// repeated alerts.
pub trait ProgressObserver: Send + Sync + 'static {
    fn on_event(&self, event: ProgressEvent);
    fn on_connection_failed(&self, message: &str);
}

/// Handle to a live subscription. Cheap to clone; `unsubscribe` is safe to
/// call from inside an observer callback.
#[derive(Clone)]
pub struct ProgressStream {
    inner: Arc<StreamInner>,
}

struct StreamInner {
    document_id: String,
    url: String,
    observer: Box<dyn ProgressObserver>,
    state: AtomicU8,
    /// Permanent once set; suppresses all further reconnection and delivery.
    manually_closed: AtomicBool,
    cancel: CancellationToken,
    config: StreamConfig,
}

impl ProgressStream {
    /// Open the progress channel for `document_id` and start delivering
    /// events to `observer`.
    pub fn subscribe(
        config: &ClientConfig,
        document_id: impl Into<String>,
        observer: impl ProgressObserver,
    ) -> Self {
        let document_id = document_id.into();
        let url = format!(
            "{}/v1/ws/documents/{}/progress",
            config.ws_base.trim_end_matches('/'),
            urlencoding::encode(&document_id)
        );
        let inner = Arc::new(StreamInner {
            document_id,
            url,
            observer: Box::new(observer),
            state: AtomicU8::new(ConnectionState::Idle as u8),
            manually_closed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            config: config.stream.clone(),
        });
        tokio::spawn(drive(Arc::clone(&inner)));
        Self { inner }
    }

    pub fn document_id(&self) -> &str {
        &self.inner.document_id
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    /// Stop the subscription. Takes effect immediately from the caller's
    /// perspective: no callback runs after this returns, even for frames
    /// already in flight (they are dropped, not queued). The transport close
    /// itself completes asynchronously.
    pub fn unsubscribe(&self) {
        self.inner.manually_closed.store(true, Ordering::SeqCst);
        self.inner.set_state(ConnectionState::Closing);
        self.inner.cancel.cancel();
    }
}

impl StreamInner {
    fn set_state(&self, next: ConnectionState) {
        let _ = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                match ConnectionState::from_u8(current) {
                    ConnectionState::Closed => None,
                    ConnectionState::Closing if next != ConnectionState::Closed => None,
                    _ => Some(next as u8),
                }
            });
    }
}

fn backoff_delay(base: Duration, failures: u32) -> Duration {
    base * failures
}

enum PumpExit {
    Manual,
    Transport,
}

/// Connect/reconnect loop. Runs until unsubscribed or the failure budget is
/// spent; either way the instance ends in `Closed`.
async fn drive(inner: Arc<StreamInner>) {
    let mut failures: u32 = 0;
    loop {
        if inner.cancel.is_cancelled() {
            break;
        }
        inner.set_state(ConnectionState::Connecting);

        let connected = tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => break,
            result = connect_async(inner.url.as_str()) => result,
        };

        match connected {
            Ok((ws, _response)) => {
                failures = 0;
                inner.set_state(ConnectionState::Open);
                tracing::debug!(document_id = %inner.document_id, "progress channel open");
                if let PumpExit::Manual = pump(&inner, ws).await {
                    break;
                }
                // Transport dropped: re-enter the backoff ladder below.
            }
            Err(e) => {
                tracing::warn!(
                    document_id = %inner.document_id,
                    error = %e,
                    "progress channel connect failed"
                );
            }
        }

        failures += 1;
        if failures > inner.config.max_attempts {
            inner.set_state(ConnectionState::Closed);
            if !inner.manually_closed.load(Ordering::SeqCst) {
                inner.observer.on_connection_failed(&format!(
                    "progress channel for document {} lost after {} reconnect attempts",
                    inner.document_id, inner.config.max_attempts
                ));
            }
            return;
        }

        let delay = backoff_delay(inner.config.base_delay, failures);
        tracing::debug!(
            document_id = %inner.document_id,
            attempt = failures,
            delay_ms = delay.as_millis() as u64,
            "reconnecting after backoff"
        );
        tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
    inner.set_state(ConnectionState::Closed);
}

/// Service one open connection. Returns how it ended.
async fn pump(
    inner: &StreamInner,
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
) -> PumpExit {
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => {
                // Best-effort close frame; delivery is already fenced off by
                // the manually_closed flag.
                let _ = sink.send(Message::Close(None)).await;
                return PumpExit::Manual;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match ProgressEvent::decode(&text) {
                    // Heartbeats keep the transport alive; subscribers never see them.
                    Ok(ProgressEvent::Heartbeat) => {}
                    Ok(event) => {
                        if inner.manually_closed.load(Ordering::SeqCst) {
                            return PumpExit::Manual;
                        }
                        inner.observer.on_event(event);
                    }
                    Err(err) => {
                        tracing::warn!(
                            document_id = %inner.document_id,
                            error = %err,
                            "dropping malformed frame"
                        );
                    }
                },
                Some(Ok(Message::Close(_))) | None => return PumpExit::Transport,
                // Ping/pong/binary are transport-level only.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(
                        document_id = %inner.document_id,
                        error = %e,
                        "progress channel read failed"
                    );
                    return PumpExit::Transport;
                }
            },
            _ = tokio::time::sleep(inner.config.heartbeat_interval) => {
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    return PumpExit::Transport;
                }
            }
        }
    }
}
