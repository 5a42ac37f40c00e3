use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::error::RealtimeError;

/// One open connection: text frames out through `tx`, text frames in
/// through `rx`. `rx` yields `None` once the peer has gone away, and
/// dropping every clone of `tx` closes the connection.
pub struct Link {
    pub tx: mpsc::UnboundedSender<String>,
    pub rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Link, RealtimeError>;
}

/// WebSocket transport over `tokio-tungstenite`.
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Link, RealtimeError> {
        let (socket, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| RealtimeError::Connect(e.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(e) = sink.send(Message::text(text)).await {
                    warn!(%e, "Failed to send WS frame");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if in_tx.send(text.as_str().to_owned()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Err(e) => {
                        debug!(%e, "WS read error");
                        break;
                    }
                    _ => {}
                }
            }
        });

        Ok(Link {
            tx: out_tx,
            rx: in_rx,
        })
    }
}

/// The server half of an in-memory connection.
pub struct ServerEnd {
    pub url: String,
    pub to_client: mpsc::UnboundedSender<String>,
    pub from_client: mpsc::UnboundedReceiver<String>,
}

/// In-process transport for exercising clients without a server. Every
/// successful connect hands its `ServerEnd` to the receiver returned by
/// [`MemoryConnector::new`].
pub struct MemoryConnector {
    accept: mpsc::UnboundedSender<ServerEnd>,
    refusals: Mutex<u32>,
    attempts: Mutex<Vec<String>>,
}

impl MemoryConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        let (accept, accepted) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            accept,
            refusals: Mutex::new(0),
            attempts: Mutex::new(Vec::new()),
        });
        (connector, accepted)
    }

    /// Makes the next `n` connection attempts fail.
    pub fn refuse_next(&self, n: u32) {
        *self.refusals.lock() = n;
    }

    /// URLs of every connection attempt so far, refused ones included.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<Link, RealtimeError> {
        self.attempts.lock().push(url.to_string());
        {
            let mut refusals = self.refusals.lock();
            if *refusals > 0 {
                *refusals -= 1;
                return Err(RealtimeError::Connect("connection refused".to_string()));
            }
        }

        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();
        self.accept
            .send(ServerEnd {
                url: url.to_string(),
                to_client: server_tx,
                from_client: server_rx,
            })
            .map_err(|_| RealtimeError::Connect("no listener".to_string()))?;

        Ok(Link {
            tx: client_tx,
            rx: client_rx,
        })
    }
}
