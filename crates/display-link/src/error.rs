use std::time::Duration;

use cdu_grid::FrameError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

pub type LinkResult<T> = Result<T, LinkError>;

/// Why a connection attempt or an open session ended. None of these escape
/// the transport task; they drive the backoff loop and the logs.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },
    #[error("no handshake from display within {0:?}")]
    Timeout(Duration),
    #[error("websocket error: {0}")]
    Socket(#[from] tungstenite::Error),
    #[error("no pong within {0:?}")]
    KeepaliveExpired(Duration),
    #[error("display closed the connection: {0}")]
    Closed(String),
    #[error(transparent)]
    Encode(#[from] FrameError),
}
