//! Telemetry-to-CDU bridge: named simulator variables or raw display memory
//! in, WebSocket display frames out, one independent bridge per display.

pub mod app;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod feed;
pub mod logging;
pub mod registry;
