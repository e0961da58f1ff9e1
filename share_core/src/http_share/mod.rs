//! HTTP and WebSocket surface
//!
//! Thin axum layer over [`crate::SignalHub`].

pub mod api;
pub mod server;
pub mod websocket;

pub use server::{create_router, serve, start_server};
pub use websocket::ShareState;
