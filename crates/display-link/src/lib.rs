//! Display link: a persistent, self-healing WebSocket connection to one
//! character display.
//!
//! Producers hand frames over with [`FrameTransport::enqueue`], which never
//! blocks and never fails. A background task owns the socket, drains the
//! single-slot mailbox to the latest frame, keeps the connection alive with
//! pings, and reconnects after a fixed delay whenever anything goes wrong.

mod config;
mod error;
mod mailbox;
mod session;
mod state;
mod transport;

pub use config::LinkConfig;
pub use error::{LinkError, LinkResult};
pub use mailbox::Mailbox;
pub use state::{ConnectionState, LinkStats, Readiness};
pub use transport::FrameTransport;
