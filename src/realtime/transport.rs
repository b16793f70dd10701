//! WebSocket connection to the push channel.
//!
//! Incoming text frames are decoded and published on the [`EventBus`]; room
//! commands queued by the bus are written back out. The task ends when the
//! server closes the connection or the bus is closed.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_tungstenite::tungstenite::Message;

use super::{ClientCommand, EventBus};
use crate::errors::ClientResult;

/// Map an `http(s)` push URL to its `ws(s)` form. Other schemes pass through.
pub fn websocket_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        url.to_string()
    }
}

/// Connect to `url` and pump frames between the socket and the bus.
pub async fn run(
    url: String,
    bus: EventBus,
    mut commands: UnboundedReceiver<ClientCommand>,
) -> ClientResult<()> {
    let url = websocket_url(&url);
    let (stream, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
    tracing::info!("Push channel connected: {}", url);

    let (mut sink, mut source) = stream.split();
    loop {
        tokio::select! {
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if bus.dispatch_frame(text.as_str()) == 0 {
                        tracing::debug!("Frame not delivered: {}", text.as_str());
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("Push channel closed by server");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            },
            command = commands.recv() => match command {
                Some(command) => {
                    tracing::debug!("Sending {:?}", command);
                    sink.send(Message::text(command.to_frame())).await?;
                }
                None => {
                    tracing::info!("Event bus closed, disconnecting push channel");
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_url_scheme() {
        assert_eq!(websocket_url("http://localhost:5000/ws"), "ws://localhost:5000/ws");
        assert_eq!(websocket_url("https://mua.vn/ws"), "wss://mua.vn/ws");
        assert_eq!(websocket_url("ws://127.0.0.1:9/ws"), "ws://127.0.0.1:9/ws");
    }
}
