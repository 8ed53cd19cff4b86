//! In-memory transports for exercising the relay without sockets.

use crate::{
    error::RelayError,
    ports::{Frame, FrameReader, FrameWriter, RemoteEvent, RemoteEventStream, RemoteSession},
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use tokio::sync::mpsc;

/// Yields whatever the test pushes into the paired sender. Dropping the
/// sender looks like the client going away normally.
pub(crate) struct ChannelReader {
    rx: mpsc::UnboundedReceiver<Result<Frame, RelayError>>,
    pub(crate) reads: Arc<AtomicUsize>,
}

impl ChannelReader {
    pub(crate) fn new() -> (Self, mpsc::UnboundedSender<Result<Frame, RelayError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx,
                reads: Arc::new(AtomicUsize::new(0)),
            },
            tx,
        )
    }
}

#[async_trait]
impl FrameReader for ChannelReader {
    async fn read_frame(&mut self) -> Result<Frame, RelayError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.rx.recv().await {
            Some(result) => result,
            None => Err(RelayError::TransportRead {
                expected: true,
                message: "client went away".into(),
            }),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct WriterLog {
    pub(crate) texts: Vec<String>,
    pub(crate) close_frames: usize,
    pub(crate) shutdowns: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum WriterMode {
    Healthy,
    Failing,
    StalledText,
}

/// Records everything written to it. The failing variant errors on every call
/// but still records the attempt. The stalled variant records text writes and
/// then never completes them, like a client that stopped reading.
pub(crate) struct RecordingWriter {
    log: Arc<Mutex<WriterLog>>,
    mode: WriterMode,
}

impl RecordingWriter {
    pub(crate) fn new() -> (Self, Arc<Mutex<WriterLog>>) {
        let log = Arc::new(Mutex::new(WriterLog::default()));
        (
            Self {
                log: log.clone(),
                mode: WriterMode::Healthy,
            },
            log,
        )
    }

    pub(crate) fn failing() -> (Self, Arc<Mutex<WriterLog>>) {
        let (mut writer, log) = Self::new();
        writer.mode = WriterMode::Failing;
        (writer, log)
    }

    pub(crate) fn stalled() -> (Self, Arc<Mutex<WriterLog>>) {
        let (mut writer, log) = Self::new();
        writer.mode = WriterMode::StalledText;
        (writer, log)
    }

    fn outcome(&self) -> Result<(), RelayError> {
        if self.mode == WriterMode::Failing {
            Err(RelayError::TransportWrite("broken pipe".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl FrameWriter for RecordingWriter {
    async fn write_text(&mut self, text: String) -> Result<(), RelayError> {
        self.log.lock().unwrap().texts.push(text);
        if self.mode == WriterMode::StalledText {
            std::future::pending::<()>().await;
        }
        self.outcome()
    }

    async fn write_close(&mut self) -> Result<(), RelayError> {
        self.log.lock().unwrap().close_frames += 1;
        self.outcome()
    }

    async fn shutdown(&mut self) -> Result<(), RelayError> {
        self.log.lock().unwrap().shutdowns += 1;
        self.outcome()
    }
}

/// A remote session that replays a fixed list of events and records appends.
pub(crate) struct ScriptedRemote {
    events: Mutex<Option<Vec<Result<RemoteEvent, RelayError>>>>,
    hold_open: bool,
    appended_tx: mpsc::UnboundedSender<String>,
    pub(crate) appends: AtomicUsize,
    pub(crate) closes: AtomicUsize,
}

impl ScriptedRemote {
    /// With `hold_open` the event stream stays pending after the script runs
    /// out instead of ending.
    pub(crate) fn new(
        events: Vec<Result<RemoteEvent, RelayError>>,
        hold_open: bool,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (appended_tx, appended_rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                events: Mutex::new(Some(events)),
                hold_open,
                appended_tx,
                appends: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
            }),
            appended_rx,
        )
    }

    pub(crate) fn silent() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        Self::new(Vec::new(), true)
    }
}

#[async_trait]
impl RemoteSession for ScriptedRemote {
    async fn append_audio(&self, encoded: String) -> Result<(), RelayError> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        let _ = self.appended_tx.send(encoded);
        Ok(())
    }

    async fn watch_events(&self) -> Result<RemoteEventStream, RelayError> {
        let events = self
            .events
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| RelayError::remote("events already watched"))?;
        let scripted = stream::iter(events);
        if self.hold_open {
            Ok(scripted.chain(stream::pending()).boxed())
        } else {
            Ok(scripted.boxed())
        }
    }

    async fn close(&self) -> Result<(), RelayError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub(crate) fn pcm_frame(samples: &[i16]) -> Frame {
    Frame::Binary(samples.iter().flat_map(|s| s.to_le_bytes()).collect())
}
