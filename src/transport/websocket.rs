//! WebSocket transport to the realtime endpoint.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::{ReadOutcome, TransportSink, TransportSource};
use crate::config::Config;
use crate::error::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsSink {
    write: SplitSink<WsStream, Message>,
}

pub struct WsSource {
    read: SplitStream<WsStream>,
}

/// Connect and split the socket into its two halves.
///
/// The connection must be up before the session starts.
pub async fn connect(config: &Config) -> Result<(WsSink, WsSource), TransportError> {
    let api_key = config
        .require_api_key()
        .map_err(|e| TransportError::Connect(e.to_string()))?;

    // 根据配置构建WebSocket请求
    let url = Url::parse(&config.ws_url).map_err(|e| TransportError::Connect(e.to_string()))?;
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => return Err(TransportError::Connect(format!("no host in {}", url))),
    };

    let request = tokio_tungstenite::tungstenite::http::Request::builder()
        .method("GET")
        .uri(config.ws_url.as_str())
        .header("Host", host)
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Sec-WebSocket-Version", "13")
        .header(
            "Sec-WebSocket-Key",
            tokio_tungstenite::tungstenite::handshake::client::generate_key(),
        )
        .header("Authorization", format!("Bearer {}", api_key))
        .header("OpenAI-Beta", config.realtime_beta.as_str())
        .body(())
        .map_err(|e| TransportError::Connect(e.to_string()))?;

    log::info!("Connecting to {}...", url.host_str().unwrap_or_default());
    let (ws_stream, _) = connect_async(request)
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;
    log::info!("Connected!");

    let (write, read) = ws_stream.split();
    Ok((WsSink { write }, WsSource { read }))
}

#[async_trait]
impl TransportSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.write
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.write
            .close()
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }
}

#[async_trait]
impl TransportSource for WsSource {
    async fn recv(&mut self) -> Result<ReadOutcome, TransportError> {
        match self.read.next().await {
            Some(Ok(msg)) => Ok(classify(msg)),
            Some(Err(e)) => Err(TransportError::Read(e.to_string())),
            None => Ok(ReadOutcome::Closed),
        }
    }
}

fn classify(msg: Message) -> ReadOutcome {
    match msg {
        Message::Text(text) if text.is_empty() => ReadOutcome::Empty,
        Message::Text(text) => ReadOutcome::Message(text.to_string()),
        // 有些网关用二进制帧发送 JSON
        Message::Binary(data) => match String::from_utf8(data.to_vec()) {
            Ok(text) if !text.is_empty() => ReadOutcome::Message(text),
            _ => ReadOutcome::Empty,
        },
        Message::Close(frame) => {
            log::info!("Server closed connection: {:?}", frame);
            ReadOutcome::Closed
        }
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => ReadOutcome::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_frames() {
        assert_eq!(
            classify(Message::Text("{}".into())),
            ReadOutcome::Message("{}".into())
        );
        assert_eq!(classify(Message::Text("".into())), ReadOutcome::Empty);
        assert_eq!(
            classify(Message::Binary(b"{\"type\":\"x\"}".to_vec().into())),
            ReadOutcome::Message("{\"type\":\"x\"}".into())
        );
        assert_eq!(
            classify(Message::Binary(vec![0xff, 0xfe].into())),
            ReadOutcome::Empty
        );
        assert_eq!(classify(Message::Ping(Vec::new().into())), ReadOutcome::Empty);
        assert_eq!(classify(Message::Close(None)), ReadOutcome::Closed);
    }

    #[tokio::test]
    async fn connect_requires_api_key() {
        let config = Config::new().unwrap();
        assert!(matches!(
            connect(&config).await,
            Err(TransportError::Connect(_))
        ));
    }
}
