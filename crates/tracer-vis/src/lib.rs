//! AGV Journey Tracer visualization server
//!
//! Serves a playback session over HTTP and WebSocket to a browser renderer.
//!
//! # Architecture
//!
//! - **Config**: environment and command line settings
//! - **Driver**: a [`tracer_core::PlaybackDriver`] owns the session and ticks it
//! - **REST API**: load datasets, control playback, fetch graph and overlays
//! - **WebSocket**: pushes every tick and scrub as a status plus fleet snapshot
//!
//! # Usage
//!
//! ```ignore
//! let config = VisConfig::from_env()?;
//! let driver = config.build_driver().await?;
//! VisServer::new(driver).serve(config.addr).await?;
//! ```

mod config;
mod error;
mod server;

pub use config::VisConfig;
pub use error::{Error, Result};
pub use server::{AppState, ErrorResponse, VisServer};
