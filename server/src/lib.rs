#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

//! termgate library: serve a server-side terminal application to browsers.
//!
//! One controller drives the application over a WebSocket; any number of
//! viewers receive a mirror of its output. The building blocks:
//! - `ws`: RFC 6455 framing, the upgrade handshake, and [`Connection`]
//! - `http`: the minimal request reader and response writer
//! - `sessions`: the single controller [`Session`], its viewers, and the slot
//! - `engine`: the [`Page`] trait, [`RemoteTerminal`], and the driver loop
//! - `routes`: the accept loop and per-path handlers
//! - `config`, `auth`, `assets`, `state`: startup configuration and shared state
//! - `demo`: the sample pages the binary serves

pub mod assets;
pub mod auth;
pub mod config;
pub mod demo;
pub mod engine;
pub mod http;
pub mod routes;
pub mod sessions;
pub mod state;
pub mod ws;

// Re-export key types at crate root for convenience.
pub use assets::{Asset, Assets};
pub use config::Config;
pub use engine::{Event, Outcome, Page, PageRegistry, RemoteTerminal};
pub use routes::Server;
pub use sessions::buffer::OutputBuffer;
pub use sessions::{Session, SessionSlot};
pub use state::AppState;
pub use ws::Connection;
