//! Transcode-and-append workers for inbound audio frames.
//!
//! Frames enter a bounded queue in arrival order and are drained by a fixed
//! pool of workers, so processing order across workers is not guaranteed.
//! Submitting never waits: when the queue is full the frame is dropped.

use super::RelaySettings;
use crate::{audio, ports::RemoteSession};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, warn};

pub struct AudioForwarder {
    tx: mpsc::Sender<Bytes>,
}

impl AudioForwarder {
    /// Spawns the worker pool. Workers exit when `cancel` fires or once the
    /// forwarder is dropped and the queue has drained.
    pub fn spawn(
        remote: Arc<dyn RemoteSession>,
        settings: &RelaySettings,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<Bytes>(settings.audio_queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));

        for worker in 0..settings.audio_workers.max(1) {
            let rx = rx.clone();
            let remote = remote.clone();
            let cancel = cancel.clone();
            let (source_rate, target_rate) = (settings.source_rate, settings.target_rate);
            tokio::spawn(
                async move {
                    loop {
                        let next = {
                            let mut rx = rx.lock().await;
                            tokio::select! {
                                biased;
                                _ = cancel.cancelled() => None,
                                frame = rx.recv() => frame,
                            }
                        };
                        let Some(payload) = next else { break };
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            _ = forward(remote.as_ref(), &payload, source_rate, target_rate) => {}
                        }
                    }
                    debug!(worker, "Audio worker stopped");
                }
                .in_current_span(),
            );
        }

        Self { tx }
    }

    /// Queues one PCM16 payload. Returns `false` if it was dropped.
    pub fn submit(&self, payload: Bytes) -> bool {
        match self.tx.try_send(payload) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(payload)) => {
                warn!(frame_len = payload.len(), "Audio queue full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Audio workers have stopped, dropping frame");
                false
            }
        }
    }
}

async fn forward(remote: &dyn RemoteSession, payload: &[u8], source_rate: u32, target_rate: u32) {
    let encoded = match audio::transcode(payload, source_rate, target_rate) {
        Ok(encoded) => encoded,
        Err(e) => {
            error!(error = %e, frame_len = payload.len(), "Failed to process audio data");
            return;
        }
    };
    debug!(frame_len = payload.len(), "Processed audio data");

    if let Err(e) = remote.append_audio(encoded).await {
        error!(error = %e, "Failed to append audio to input buffer");
        return;
    }
    debug!("Appended audio data to input buffer");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::decode_base64_pcm16,
        error::RelayError,
        ports::MockRemoteSession,
        relay::testing::ScriptedRemote,
    };
    use std::{sync::atomic::Ordering, time::Duration};
    use tokio::time::timeout;
    use tracing_test::traced_test;

    #[tokio::test]
    async fn test_forwards_transcoded_audio() {
        let (remote, mut appended) = ScriptedRemote::silent();
        let forwarder = AudioForwarder::spawn(
            remote.clone(),
            &RelaySettings::default(),
            CancellationToken::new(),
        );

        let payload: Bytes = [100i16; 160].iter().flat_map(|s| s.to_le_bytes()).collect();
        assert!(forwarder.submit(payload));

        let encoded = timeout(Duration::from_secs(2), appended.recv())
            .await
            .expect("append should happen")
            .unwrap();
        let samples = decode_base64_pcm16(&encoded).unwrap();
        assert_eq!(samples.len(), 240);
        assert!(samples.iter().all(|&s| s == 100));
    }

    #[tokio::test]
    async fn test_malformed_frame_is_skipped() {
        let (remote, mut appended) = ScriptedRemote::silent();
        let settings = RelaySettings {
            audio_workers: 1,
            ..RelaySettings::default()
        };
        let forwarder = AudioForwarder::spawn(remote.clone(), &settings, CancellationToken::new());

        assert!(forwarder.submit(Bytes::from_static(&[1, 2, 3])));
        assert!(forwarder.submit(Bytes::from_static(&[1, 0])));

        // The single worker handles frames in order, so the first append is
        // the well-formed frame.
        let encoded = timeout(Duration::from_secs(2), appended.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decode_base64_pcm16(&encoded).unwrap(), vec![1]);
        assert_eq!(remote.appends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_append_failure_does_not_stop_worker() {
        let mut remote = MockRemoteSession::new();
        let mut calls = 0;
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        remote.expect_append_audio().times(2).returning(move |_| {
            calls += 1;
            let _ = done_tx.send(calls);
            if calls == 1 {
                Err(RelayError::remote("buffer rejected"))
            } else {
                Ok(())
            }
        });
        let settings = RelaySettings {
            audio_workers: 1,
            ..RelaySettings::default()
        };
        let forwarder = AudioForwarder::spawn(Arc::new(remote), &settings, CancellationToken::new());

        forwarder.submit(Bytes::from_static(&[0, 0]));
        forwarder.submit(Bytes::from_static(&[0, 0]));

        for expected in 1..=2 {
            let n = timeout(Duration::from_secs(2), done_rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(n, expected);
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_full_queue_drops_without_blocking() {
        let (remote, mut appended) = ScriptedRemote::silent();
        let settings = RelaySettings {
            audio_workers: 1,
            audio_queue_depth: 1,
            ..RelaySettings::default()
        };
        let forwarder = AudioForwarder::spawn(remote.clone(), &settings, CancellationToken::new());

        // The test runtime is single threaded and nothing here yields, so the
        // worker cannot drain the queue between submissions.
        let accepted: Vec<bool> = (0..5)
            .map(|_| forwarder.submit(Bytes::from_static(&[0, 0])))
            .collect();
        assert_eq!(accepted, vec![true, false, false, false, false]);

        // The workers are still alive and process the queued frame.
        timeout(Duration::from_secs(2), appended.recv())
            .await
            .expect("queued frame should be appended")
            .unwrap();
        assert_eq!(remote.appends.load(Ordering::SeqCst), 1);

        logs_assert(|lines: &[&str]| {
            let full = lines
                .iter()
                .filter(|l| l.contains("Audio queue full, dropping frame"))
                .count();
            if full != 4 {
                return Err(format!("expected 4 full-queue drops, saw {full}"));
            }
            if lines.iter().any(|l| l.contains("Audio workers have stopped")) {
                return Err("frames were dropped on a closed queue".to_string());
            }
            Ok(())
        });
    }
}
