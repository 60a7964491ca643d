use std::sync::Arc;

use cdu_grid::Frame;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::LinkConfig;
use crate::error::{LinkError, LinkResult};
use crate::state::ConnectionState;
use crate::transport::Shared;

pub(crate) type DisplaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How an open session ended without an error.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    Cancelled,
}

pub(crate) async fn connect(config: &LinkConfig) -> LinkResult<DisplaySocket> {
    let handshake = connect_async(config.url.as_str());
    let (socket, _response) = time::timeout(config.connect_timeout, handshake)
        .await
        .map_err(|_| LinkError::Timeout(config.connect_timeout))?
        .map_err(|source| LinkError::Connect {
            url: config.url.clone(),
            source,
        })?;
    Ok(socket)
}

/// Drives one connected socket until it fails or the link is cancelled.
///
/// The font directive always goes out first. `last_sent` survives across
/// sessions so the newest delivered frame can be replayed after a reconnect.
pub(crate) async fn run(
    socket: DisplaySocket,
    shared: &Arc<Shared>,
    cancel: &CancellationToken,
    state: &watch::Sender<ConnectionState>,
    last_sent: &mut Option<Frame>,
) -> LinkResult<SessionEnd> {
    let config = &shared.config;
    let (mut sink, mut stream) = socket.split();

    let font = Frame::font(config.font.as_str()).to_json()?;
    sink.send(Message::Text(font)).await?;
    debug!(
        target: "display_link::session",
        device = %config.label,
        font = %config.font,
        "font selected"
    );

    if !config.font_settle.is_zero() {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.close().await;
                return Ok(SessionEnd::Cancelled);
            }
            _ = time::sleep(config.font_settle) => {}
        }
    }

    state.send_replace(ConnectionState::Connected);
    shared.stats.connected();

    if config.replay_last_frame && shared.mailbox.is_empty() {
        if let Some(frame) = last_sent.take() {
            debug!(
                target: "display_link::session",
                device = %config.label,
                "replaying last frame after reconnect"
            );
            shared.mailbox.restore(frame);
        }
    }

    let mut ping = time::interval_at(Instant::now() + config.ping_interval, config.ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut pong_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                let _ = sink.close().await;
                return Ok(SessionEnd::Cancelled);
            }
            frame = shared.mailbox.recv() => {
                let payload = frame.to_json()?;
                if let Err(err) = sink.send(Message::Text(payload)).await {
                    // Keep the frame for the next session unless a newer one is waiting.
                    shared.mailbox.restore(frame);
                    return Err(err.into());
                }
                shared.stats.sent();
                trace!(target: "display_link::session", device = %config.label, "frame sent");
                *last_sent = Some(frame);
            }
            _ = ping.tick(), if pong_deadline.is_none() => {
                sink.send(Message::Ping(Vec::new())).await?;
                pong_deadline = Some(Instant::now() + config.pong_timeout);
            }
            _ = time::sleep_until(pong_deadline.unwrap_or_else(Instant::now)), if pong_deadline.is_some() => {
                return Err(LinkError::KeepaliveExpired(config.pong_timeout));
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Pong(_))) => pong_deadline = None,
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|close| close.reason.into_owned())
                        .unwrap_or_default();
                    return Err(LinkError::Closed(reason));
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err.into()),
                None => return Err(LinkError::Closed("stream ended".into())),
            },
        }
    }
}
