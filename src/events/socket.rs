//! Socket.IO subscription to the service's push events.
//!
//! [`WsPushChannel::subscribe`] opens `{ws_url}/socket.io/?EIO=4&transport=websocket`
//! with the session cookie, joins the default namespace, answers pings and
//! forwards every recognised event to the caller. When the socket drops or
//! goes quiet it reconnects with exponential backoff until the
//! [`CancellationToken`] fires.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::COOKIE, HeaderValue};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::socketio::{self, Handshake, Packet};
use super::PushEvent;
use crate::api::SessionCookies;
use crate::job::JobId;
use crate::ClipperError;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Source of push events for one job.
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Forward events for `job_id` into `sink` until `cancel` fires or the
    /// receiving side goes away.
    async fn subscribe(
        &self,
        job_id: JobId,
        sink: mpsc::UnboundedSender<PushEvent>,
        cancel: CancellationToken,
    );
}

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay, clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Push channel backed by the service's Socket.IO endpoint
pub struct WsPushChannel {
    ws_url: String,
    reconnect: ReconnectConfig,
    cookies: Option<SessionCookies>,
}

enum StreamEnd {
    Cancelled,
    SinkClosed,
    Disconnected,
}

impl WsPushChannel {
    pub fn new(ws_url: impl Into<String>, reconnect: ReconnectConfig) -> Self {
        Self {
            ws_url: ws_url.into(),
            reconnect,
            cookies: None,
        }
    }

    /// Present the HTTP session on the handshake so the server puts us in
    /// the room its jobs report to
    pub fn with_cookies(mut self, cookies: SessionCookies) -> Self {
        self.cookies = Some(cookies);
        self
    }

    pub fn endpoint(&self, job_id: &JobId) -> String {
        format!(
            "{}/socket.io/?EIO=4&transport=websocket&job_id={}",
            self.ws_url.trim_end_matches('/'),
            urlencoding::encode(job_id.as_str())
        )
    }

    async fn connect(&self, job_id: &JobId) -> Result<WsStream, ClipperError> {
        let mut request = self
            .endpoint(job_id)
            .into_client_request()
            .map_err(|e| ClipperError::Transport(format!("Invalid push URL {}: {e}", self.ws_url)))?;

        if let Some(header) = self.cookies.as_ref().and_then(SessionCookies::header) {
            let value = HeaderValue::from_str(&header)
                .map_err(|e| ClipperError::Protocol(format!("Unusable session cookie: {e}")))?;
            request.headers_mut().insert(COOKIE, value);
        }

        let (stream, _response) = connect_async(request).await.map_err(|e| {
            ClipperError::Transport(format!("Failed to connect to {}: {e}", self.ws_url))
        })?;

        tracing::info!(job_id = %job_id, "Push channel connected to {}", self.ws_url);
        Ok(stream)
    }

    async fn pump(
        &self,
        job_id: &JobId,
        mut stream: WsStream,
        sink: &mpsc::UnboundedSender<PushEvent>,
        cancel: &CancellationToken,
    ) -> StreamEnd {
        let mut liveness = Handshake::default().liveness();

        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let _ = stream.close(None).await;
                    return StreamEnd::Cancelled;
                }
                frame = tokio::time::timeout(liveness, stream.next()) => frame,
            };

            let text = match frame {
                Err(_) => {
                    tracing::warn!(job_id = %job_id, "Push channel went quiet");
                    return StreamEnd::Disconnected;
                }
                Ok(Some(Ok(Message::Text(text)))) => text,
                Ok(Some(Ok(Message::Close(_)))) | Ok(None) => return StreamEnd::Disconnected,
                Ok(Some(Ok(_))) => continue,
                Ok(Some(Err(e))) => {
                    tracing::warn!(job_id = %job_id, error = %e, "Push channel read failed");
                    return StreamEnd::Disconnected;
                }
            };

            let reply = match socketio::decode(&text) {
                Ok(Packet::Open(handshake)) => {
                    liveness = handshake.liveness();
                    Some(socketio::CONNECT)
                }
                Ok(Packet::Ping) => Some(socketio::PONG),
                Ok(Packet::Connected) => {
                    tracing::debug!(job_id = %job_id, "Joined push namespace");
                    None
                }
                Ok(Packet::Event { name, data }) => {
                    match PushEvent::from_event(&name, data) {
                        Ok(event) => {
                            tracing::debug!(job_id = %job_id, kind = event.kind(), "Push event");
                            if sink.send(event).is_err() {
                                return StreamEnd::SinkClosed;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(job_id = %job_id, event = %name, error = %e, "Skipping unrecognised push event");
                        }
                    }
                    None
                }
                Ok(Packet::ConnectError(message)) => {
                    tracing::warn!(job_id = %job_id, "Push namespace refused: {}", message);
                    return StreamEnd::Disconnected;
                }
                Ok(Packet::Close) | Ok(Packet::Disconnected) => return StreamEnd::Disconnected,
                Ok(Packet::Pong) | Ok(Packet::Noop) | Ok(Packet::Other) => None,
                Err(e) => {
                    tracing::warn!(job_id = %job_id, error = %e, "Skipping malformed push frame");
                    None
                }
            };

            if let Some(reply) = reply {
                if let Err(e) = stream.send(Message::Text(reply.to_string())).await {
                    tracing::warn!(job_id = %job_id, error = %e, "Push channel write failed");
                    return StreamEnd::Disconnected;
                }
            }
        }
    }
}

#[async_trait]
impl PushChannel for WsPushChannel {
    async fn subscribe(
        &self,
        job_id: JobId,
        sink: mpsc::UnboundedSender<PushEvent>,
        cancel: CancellationToken,
    ) {
        let mut delay = self.reconnect.initial_delay;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let connected = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = self.connect(&job_id) => result,
            };

            match connected {
                Ok(stream) => {
                    attempt = 0;
                    delay = self.reconnect.initial_delay;
                    match self.pump(&job_id, stream, &sink, &cancel).await {
                        StreamEnd::Cancelled | StreamEnd::SinkClosed => return,
                        StreamEnd::Disconnected => {
                            tracing::info!(job_id = %job_id, "Push channel dropped, reconnecting");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        job_id = %job_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Push channel connect attempt failed",
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            delay = next_delay(delay, &self.reconnect);
        }
    }
}
