//! Remote sessions over the OpenAI / Azure OpenAI realtime WebSocket API.

use crate::config::{Config, Provider};
use anyhow::{Context, Result};
use async_openai::types::realtime::{self as oai_realtime, ClientEvent as OAIClientEvent};
use async_trait::async_trait;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, protocol::Message as WsMessage},
};
use tracing::{debug, info, warn};
use voicelink_core::{
    RelayError,
    ports::{RemoteEvent, RemoteEventStream, RemoteSession, RemoteSessionFactory},
};

type RealtimeSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens one realtime session per relayed client.
pub struct RealtimeSessionFactory {
    provider: Provider,
    url: String,
    api_key: String,
    instructions: Option<String>,
}

impl RealtimeSessionFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            provider: config.provider.clone(),
            url: config.realtime_url.clone(),
            api_key: config.realtime_api_key.clone(),
            instructions: config.realtime_instructions.clone(),
        }
    }

    async fn connect(&self) -> Result<RealtimeSession> {
        let mut request = self.url.as_str().into_client_request()?;
        let headers = request.headers_mut();
        match self.provider {
            Provider::Azure => {
                headers.insert("api-key", HeaderValue::from_str(&self.api_key)?);
            }
            Provider::OpenAI => {
                headers.insert(
                    "Authorization",
                    HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
                );
                headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));
            }
        }

        let (ws_stream, _) = connect_async(request)
            .await
            .context("Failed to connect to realtime WebSocket")?;
        let (mut sink, stream) = ws_stream.split();
        info!(provider = ?self.provider, "Connected to realtime API.");

        let event = OAIClientEvent::SessionUpdate(oai_realtime::SessionUpdateEvent {
            session: self.session_config(),
            event_id: None,
        });
        sink.send(WsMessage::Text(serde_json::to_string(&event)?.into()))
            .await
            .context("Failed to send session.update")?;

        Ok(RealtimeSession {
            sink: Mutex::new(sink),
            stream: std::sync::Mutex::new(Some(stream)),
            closed: AtomicBool::new(false),
        })
    }

    /// Audio in and out as PCM16, server-side voice activity detection.
    fn session_config(&self) -> oai_realtime::SessionResource {
        oai_realtime::SessionResource {
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            instructions: self.instructions.clone(),
            voice: Some(oai_realtime::RealtimeVoice::Alloy),
            input_audio_format: Some(oai_realtime::AudioFormat::PCM16),
            output_audio_format: Some(oai_realtime::AudioFormat::PCM16),
            turn_detection: Some(oai_realtime::TurnDetection::ServerVAD {
                threshold: 0.5,
                prefix_padding_ms: 300,
                silence_duration_ms: 500,
                interrupt_response: Some(true),
                create_response: Some(true),
            }),
            ..Default::default()
        }
    }
}

#[async_trait]
impl RemoteSessionFactory for RealtimeSessionFactory {
    async fn create_session(&self) -> Result<Arc<dyn RemoteSession>, RelayError> {
        let session = self
            .connect()
            .await
            .map_err(|e| RelayError::remote(format!("{e:#}")))?;
        Ok(Arc::new(session))
    }
}

/// One live realtime connection.
///
/// The write half sits behind an async mutex shared by `append_audio` and
/// `close`; the read half is handed out once to `watch_events`, so appends
/// never wait on the event reader.
pub struct RealtimeSession {
    sink: Mutex<SplitSink<RealtimeSocket, WsMessage>>,
    stream: std::sync::Mutex<Option<SplitStream<RealtimeSocket>>>,
    closed: AtomicBool,
}

#[async_trait]
impl RemoteSession for RealtimeSession {
    async fn append_audio(&self, encoded: String) -> Result<(), RelayError> {
        let event = OAIClientEvent::InputAudioBufferAppend(
            oai_realtime::InputAudioBufferAppendEvent {
                audio: encoded,
                event_id: None,
            },
        );
        let payload = serde_json::to_string(&event).map_err(RelayError::remote)?;
        self.sink
            .lock()
            .await
            .send(WsMessage::Text(payload.into()))
            .await
            .map_err(RelayError::remote)
    }

    async fn watch_events(&self) -> Result<RemoteEventStream, RelayError> {
        let stream = self
            .stream
            .lock()
            .map_err(|_| RelayError::remote("event stream lock poisoned"))?
            .take()
            .ok_or_else(|| RelayError::remote("event stream already taken"))?;

        let events = stream.filter_map(|msg| async move {
            match msg {
                Ok(WsMessage::Text(text)) => {
                    let event = RemoteEvent::from_text(text.as_str());
                    if event.kind == "error" {
                        warn!(event = %event.raw, "Realtime API reported an error");
                    }
                    Some(Ok(event))
                }
                Ok(WsMessage::Close(frame)) => Some(Err(RelayError::remote(format!(
                    "realtime connection closed by server: {:?}",
                    frame
                )))),
                Ok(_) => None,
                Err(e) => Some(Err(RelayError::remote(e))),
            }
        });
        Ok(Box::pin(events))
    }

    async fn close(&self) -> Result<(), RelayError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!("Closing realtime connection");
        self.sink.lock().await.close().await.map_err(RelayError::remote)
    }
}
