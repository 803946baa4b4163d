//! Websocket responder.
//!
//! Every text frame a client sends is sanitized, answered, and the answer is
//! sent back as a text frame. One task per connection; the responder is
//! shared read-only through an `Arc`.

use crate::brain::classifier::IntentModel;
use crate::brain::responder::Responder;
use crate::config::AppConfig;
use crate::error::AppError;
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Incoming messages are cut to this many characters
pub const MAX_MESSAGE_LENGTH: usize = 256;

/// Ports below this need privileges and are refused
const FIRST_UNPRIVILEGED_PORT: u16 = 1024;

/// Where and how the server listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub bind_address: String,
    pub port: u16,
    pub max_message_length: usize,
}

impl ServerSettings {
    pub fn new(bind_address: impl Into<String>, port: u16) -> Self {
        Self {
            bind_address: bind_address.into(),
            port,
            max_message_length: MAX_MESSAGE_LENGTH,
        }
    }

    pub fn from_config(config: &AppConfig, port: u16) -> Self {
        Self {
            bind_address: config.bind_address.clone(),
            port,
            max_message_length: config.max_message_length,
        }
    }

    fn check(&self) -> Result<(), AppError> {
        if self.port < FIRST_UNPRIVILEGED_PORT {
            return Err(AppError::Config(format!(
                "port {} is reserved, use a port >= {}",
                self.port, FIRST_UNPRIVILEGED_PORT
            )));
        }
        Ok(())
    }
}

/// Make a client message safe to echo into an HTML page
pub fn sanitize(message: &str) -> String {
    sanitize_with_limit(message, MAX_MESSAGE_LENGTH)
}

/// [`sanitize`] with a custom length limit (in characters, before escaping)
pub fn sanitize_with_limit(message: &str, max_length: usize) -> String {
    let mut escaped = String::with_capacity(message.len());
    for c in message.trim().chars().take(max_length) {
        match c {
            '\\' => {}
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve<M, F>(
    responder: Arc<Responder<M>>,
    settings: &ServerSettings,
    shutdown: F,
) -> Result<(), AppError>
where
    M: IntentModel + 'static,
    F: Future<Output = ()>,
{
    settings.check()?;

    let addr = format!("{}:{}", settings.bind_address, settings.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on ws://{}", addr);

    serve_listener(listener, responder, settings.max_message_length, shutdown).await
}

/// Accept loop on an already bound listener.
pub async fn serve_listener<M, F>(
    listener: TcpListener,
    responder: Arc<Responder<M>>,
    max_message_length: usize,
    shutdown: F,
) -> Result<(), AppError>
where
    M: IntentModel + 'static,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down websocket server");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let responder = Arc::clone(&responder);
                    tokio::spawn(async move {
                        let id = Uuid::new_v4();
                        if let Err(e) = handle_connection(stream, peer, id, responder, max_message_length).await {
                            warn!("Connection {} from {} failed: {}", id, peer, e);
                        }
                    });
                }
                Err(e) => warn!("Accept error: {}", e),
            }
        }
    }

    Ok(())
}

async fn handle_connection<M: IntentModel>(
    stream: TcpStream,
    peer: SocketAddr,
    id: Uuid,
    responder: Arc<Responder<M>>,
    max_message_length: usize,
) -> Result<(), AppError> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    debug!("Connection {} opened from {}", id, peer);

    while let Some(msg) = ws_receiver.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                debug!("Connection {} dropped: {}", id, e);
                break;
            }
        };

        match msg {
            WsMessage::Text(text) => {
                let sentence = sanitize_with_limit(&text, max_message_length);
                let answer = match responder.answer(&sentence) {
                    Ok(answer) => answer,
                    Err(e) => {
                        warn!("Connection {}: no answer for {:?}: {}", id, sentence, e);
                        continue;
                    }
                };
                if ws_sender.send(WsMessage::Text(answer)).await.is_err() {
                    break;
                }
            }
            WsMessage::Close(_) => break,
            // pings are answered by tungstenite itself
            _ => {}
        }
    }

    debug!("Connection {} closed", id);
    Ok(())
}
