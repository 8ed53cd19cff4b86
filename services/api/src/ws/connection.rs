//! axum WebSocket halves as relay frame ports.

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use voicelink_core::{
    RelayError,
    ports::{Frame, FrameReader, FrameWriter},
};

/// The read half of a client WebSocket.
///
/// Ping and pong frames are answered by axum and skipped here. A close frame
/// with a normal or going-away code, or the stream ending, is an expected
/// closure; any other close code or a transport error is unexpected.
pub struct WsFrameReader {
    stream: SplitStream<WebSocket>,
}

impl WsFrameReader {
    pub fn new(stream: SplitStream<WebSocket>) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl FrameReader for WsFrameReader {
    async fn read_frame(&mut self) -> Result<Frame, RelayError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Frame::Binary(data)),
                Some(Ok(Message::Text(text))) => return Ok(Frame::Text(text.to_string())),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(frame))) => return Err(close_error(frame)),
                Some(Err(e)) => {
                    return Err(RelayError::TransportRead {
                        expected: false,
                        message: e.to_string(),
                    });
                }
                None => {
                    return Err(RelayError::TransportRead {
                        expected: true,
                        message: "client stream ended".to_string(),
                    });
                }
            }
        }
    }
}

fn close_error(frame: Option<CloseFrame>) -> RelayError {
    match frame {
        None => RelayError::TransportRead {
            expected: true,
            message: "client closed the connection".to_string(),
        },
        Some(frame) => RelayError::TransportRead {
            expected: is_expected_close(frame.code),
            message: format!("client closed the connection ({}: {})", frame.code, frame.reason),
        },
    }
}

pub(crate) fn is_expected_close(code: u16) -> bool {
    code == close_code::NORMAL || code == close_code::AWAY
}

/// The write half of a client WebSocket.
pub struct WsFrameWriter {
    sink: SplitSink<WebSocket, Message>,
}

impl WsFrameWriter {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl FrameWriter for WsFrameWriter {
    async fn write_text(&mut self, text: String) -> Result<(), RelayError> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| RelayError::TransportWrite(e.to_string()))
    }

    async fn write_close(&mut self) -> Result<(), RelayError> {
        let frame = CloseFrame {
            code: close_code::NORMAL,
            reason: Utf8Bytes::from_static(""),
        };
        self.sink
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| RelayError::TransportWrite(e.to_string()))
    }

    async fn shutdown(&mut self) -> Result<(), RelayError> {
        self.sink
            .close()
            .await
            .map_err(|e| RelayError::TransportWrite(e.to_string()))
    }
}
