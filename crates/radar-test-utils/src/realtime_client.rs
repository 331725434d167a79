//! A thin realtime-subscriber client for integration tests: connects to
//! the server's WebSocket endpoint and sends/receives `radar_protocol`
//! envelopes. Grounded on `rt-test-utils::MockWsClient`'s send/recv shape.

use futures_util::{SinkExt, StreamExt};
use radar_protocol::{Envelope, WsMessage};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::MaybeTlsStream;

type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct RealtimeClient {
    write: futures_util::stream::SplitSink<WsStream, Message>,
    read: futures_util::stream::SplitStream<WsStream>,
}

impl RealtimeClient {
    pub async fn connect(url: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
        let (write, read) = stream.split();
        Ok(Self { write, read })
    }

    pub async fn send(&mut self, message: WsMessage) -> Result<(), Box<dyn std::error::Error>> {
        let envelope = Envelope::new(message, 0);
        let json = serde_json::to_string(&envelope)?;
        self.write.send(Message::Text(json.into())).await?;
        Ok(())
    }

    /// Reads the next non-pong/ping frame and returns its parsed envelope.
    pub async fn recv(&mut self) -> Result<Envelope, Box<dyn std::error::Error>> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(serde_json::from_str(&text)?);
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => {
                    return Err("connection closed by server".into());
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Waits for the first message matching `pred`, discarding everything
    /// else (useful for skipping coalesced metrics frames).
    pub async fn recv_matching(
        &mut self,
        mut pred: impl FnMut(&WsMessage) -> bool,
    ) -> Result<Envelope, Box<dyn std::error::Error>> {
        loop {
            let envelope = self.recv().await?;
            if pred(&envelope.message) {
                return Ok(envelope);
            }
        }
    }

    pub async fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.write.send(Message::Close(None)).await?;
        Ok(())
    }
}

/// A subscriber stand-in that connects and then never reads again, to
/// exercise the hub's slow-consumer eviction path. Holding the `TcpStream`
/// open (without a reader loop draining the OS socket buffer, and without
/// ever polling the tungstenite stream) is enough to eventually make the
/// server's writes block/queue up.
pub struct StalledSubscriber {
    _stream: WsStream,
}

impl StalledSubscriber {
    pub async fn connect(url: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
        Ok(Self { _stream: stream })
    }
}
