#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use share_core::http_share::{ShareState, create_router, serve};
use share_core::{ServerConfig, SignalHub};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub hub: Arc<SignalHub>,
    pub config: ServerConfig,
    pub port: u16,
    pub cancel_token: CancellationToken,
}

impl TestServer {
    pub async fn start(config: ServerConfig) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("info")
            .with_test_writer()
            .try_init();

        let hub = Arc::new(SignalHub::new(&config));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let cancel_token = CancellationToken::new();

        let (h, c, ct) = (hub.clone(), config.clone(), cancel_token.clone());
        tokio::spawn(async move {
            serve(listener, h, &c, ct).await.unwrap();
        });

        Self {
            hub,
            config,
            port,
            cancel_token,
        }
    }

    /// Router sharing this server's hub, for `oneshot` HTTP calls
    pub fn router(&self) -> axum::Router {
        create_router(
            Arc::new(ShareState::new(self.hub.clone(), &self.config)),
            &self.config,
        )
    }

    pub async fn connect(&self) -> Client {
        let url = format!("ws://127.0.0.1:{}/ws", self.port);
        let (client, _) = connect_async(&url).await.unwrap();
        client
    }

    /// Connect and consume the `connected` greeting, returning our ref
    pub async fn connect_peer(&self) -> (Client, String) {
        let mut client = self.connect().await;
        let greeting = next_event(&mut client).await;
        assert_eq!(greeting["type"], "connected");
        let connection_ref = greeting["connectionRef"].as_str().unwrap().to_string();
        (client, connection_ref)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        static_dir: None,
        ..ServerConfig::default()
    }
}

pub async fn send_event(client: &mut Client, event: Value) {
    client
        .send(Message::Text(event.to_string().into()))
        .await
        .unwrap();
}

/// Next JSON event, skipping keepalive frames
pub async fn next_event(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for event")
            .expect("connection ended")
            .expect("websocket error");
        match frame {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame {:?}", other),
        }
    }
}
