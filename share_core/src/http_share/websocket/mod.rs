//! Realtime signaling channel
//!
//! One WebSocket per peer carries JSON events in both directions.

mod handler;
mod state;
mod utils;

pub use handler::handle_socket;
pub use state::{ConnectionSlot, ShareState};

use axum::{
    Extension,
    extract::{ConnectInfo, State, WebSocketUpgrade},
    response::Response,
};
use std::{net::SocketAddr, sync::Arc};

/// WebSocket upgrade handler. Routers served without connect info log the
/// client as "unknown".
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ShareState>>,
    connect_info: Option<Extension<ConnectInfo<SocketAddr>>>,
) -> Response {
    let client_ip = connect_info
        .map(|Extension(ConnectInfo(addr))| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    ws.on_upgrade(move |socket| handle_socket(socket, state, client_ip))
}
