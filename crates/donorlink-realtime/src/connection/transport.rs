//! Text-message transport under the STOMP channel.
//!
//! The channel only needs "send text, receive text, close", so it talks to
//! a [`PushTransport`] and obtains one from a [`Connector`]. Production uses
//! WebSockets; tests script the traffic in memory.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use donorlink_core::error::{AppError, ErrorKind};
use donorlink_entity::session::Session;

/// A connected, bidirectional text transport.
#[async_trait]
pub trait PushTransport: Send {
    /// Send one text message.
    async fn send(&mut self, text: String) -> Result<(), AppError>;

    /// Receive the next text message. `None` means the peer closed cleanly.
    async fn recv(&mut self) -> Option<Result<String, AppError>>;

    /// Close the transport.
    async fn close(&mut self) -> Result<(), AppError>;

    /// Host name to announce in the STOMP CONNECT frame.
    fn host(&self) -> String {
        "localhost".to_string()
    }
}

/// Opens transports for a session.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a new transport carrying the session's credential.
    async fn connect(&self, session: &Session) -> Result<Box<dyn PushTransport>, AppError>;
}

/// Connects to the server's raw WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    /// Creates a connector for the given `ws://` or `wss://` URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, session: &Session) -> Result<Box<dyn PushTransport>, AppError> {
        debug!(url = %self.url, user_id = %session.user_id, "Opening push socket");
        let (stream, response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(ws_error)?;
        trace!(status = %response.status(), "WebSocket handshake complete");

        let host = host_of(&self.url).unwrap_or_else(|| "localhost".to_string());

        Ok(Box::new(WsTransport { stream, host }))
    }
}

/// A WebSocket carrying STOMP text frames.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    host: String,
}

#[async_trait]
impl PushTransport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), AppError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(ws_error)
    }

    async fn recv(&mut self) -> Option<Result<String, AppError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Binary(bytes)) => {
                    return Some(String::from_utf8(bytes.to_vec()).map_err(|e| {
                        AppError::validation(format!("Binary frame is not UTF-8: {e}"))
                    }));
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Push socket closed by server");
                    return None;
                }
                Ok(_) => continue,
                Err(e) => return Some(Err(ws_error(e))),
            }
        }
    }

    async fn close(&mut self) -> Result<(), AppError> {
        self.stream.close(None).await.map_err(ws_error)
    }

    fn host(&self) -> String {
        self.host.clone()
    }
}

/// Map a WebSocket error onto the application's error classes.
pub fn ws_error(err: tungstenite::Error) -> AppError {
    let kind = match &err {
        tungstenite::Error::Http(response)
            if response.status().as_u16() == 401 || response.status().as_u16() == 403 =>
        {
            ErrorKind::Authentication
        }
        tungstenite::Error::Url(_) => ErrorKind::Configuration,
        _ => ErrorKind::Network,
    };
    AppError::with_source(kind, format!("WebSocket error: {err}"), err)
}

fn host_of(url: &str) -> Option<String> {
    let rest = url.split_once("://")?.1;
    let authority = rest.split('/').next()?;
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    Some(host.split(':').next()?.to_string()).filter(|h| !h.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_of_url() {
        assert_eq!(
            host_of("ws://donors.example.org:8080/ws/websocket").as_deref(),
            Some("donors.example.org")
        );
        assert_eq!(host_of("wss://localhost/ws").as_deref(), Some("localhost"));
        assert_eq!(host_of("not a url"), None);
    }

    #[test]
    fn test_connection_refused_is_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = ws_error(tungstenite::Error::Io(io));
        assert_eq!(err.kind, ErrorKind::Network);
        assert!(err.is_transient());
    }
}
