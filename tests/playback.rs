//! Jitter-buffered playback over a scripted audio source.

mod common;

use std::time::Duration;

use common::{pcm, RecordingSink, ScriptedConnection, SinkEvent};
use narrator_chat::error::SpeechError;
use narrator_chat::playback::StreamPlayer;
use narrator_chat::speech::{SpeechConnection, SpeechRequest};
use tokio_util::sync::CancellationToken;

// 4 Hz with a 1 s window: playback starts once 4 samples are queued.
fn player() -> StreamPlayer {
    StreamPlayer::new(4, Duration::from_millis(1000))
}

#[tokio::test]
async fn waits_for_buffer_window_before_starting() {
    let mut source = ScriptedConnection::new(vec![
        Ok(pcm(&[0.1])),
        Ok(pcm(&[0.2, 0.3])),
        Ok(pcm(&[0.4])),
        Ok(pcm(&[0.5])),
    ]);
    let mut sink = RecordingSink::default();

    let report = player()
        .play(&mut source, &mut sink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.chunks, 4);
    assert_eq!(report.samples, 5);
    assert_eq!(
        sink.events.lock().unwrap().as_slice(),
        &[
            SinkEvent::Queued(vec![0.1]),
            SinkEvent::Queued(vec![0.2, 0.3]),
            SinkEvent::Queued(vec![0.4]),
            SinkEvent::Started,
            SinkEvent::Queued(vec![0.5]),
            SinkEvent::Drained,
        ]
    );
}

#[tokio::test]
async fn short_source_still_plays() {
    let mut source = ScriptedConnection::new(vec![Ok(pcm(&[0.1]))]);
    let mut sink = RecordingSink::default();

    player()
        .play(&mut source, &mut sink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        sink.events.lock().unwrap().as_slice(),
        &[SinkEvent::Queued(vec![0.1]), SinkEvent::Started, SinkEvent::Drained]
    );
}

#[tokio::test]
async fn corrupt_chunks_are_skipped_in_order() {
    let mut source = ScriptedConnection::new(vec![
        Ok(pcm(&[0.1])),
        Err("invalid base64".into()),
        Ok(pcm(&[f32::INFINITY])),
        Ok(pcm(&[0.2])),
    ]);
    let mut sink = RecordingSink::default();

    let report = player()
        .play(&mut source, &mut sink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.skipped, 2);
    let queued: Vec<_> = sink
        .events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            SinkEvent::Queued(s) => Some(s.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(queued, vec![vec![0.1], vec![0.2]]);
}

struct BrokenSource;

#[async_trait::async_trait]
impl SpeechConnection for BrokenSource {
    async fn send(&mut self, _request: &SpeechRequest) -> Result<(), SpeechError> {
        Ok(())
    }

    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, SpeechError>> {
        Some(Err(SpeechError::Remote("quota exceeded".into())))
    }

    async fn disconnect(&mut self) {}
}

#[tokio::test]
async fn session_errors_end_playback() {
    let mut sink = RecordingSink::default();
    let err = player()
        .play(&mut BrokenSource, &mut sink, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SpeechError::Remote(_)));
    assert!(sink.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cancellation_stops_before_reading() {
    let mut source = ScriptedConnection::new(vec![Ok(pcm(&[0.1, 0.2, 0.3, 0.4]))]);
    let mut sink = RecordingSink::default();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = player().play(&mut source, &mut sink, &cancel).await.unwrap();

    assert!(report.cancelled);
    assert!(sink.events.lock().unwrap().is_empty());
}

/// Yields its chunks, then never produces another one.
struct StallingSource {
    chunks: Vec<Vec<u8>>,
}

#[async_trait::async_trait]
impl SpeechConnection for StallingSource {
    async fn send(&mut self, _request: &SpeechRequest) -> Result<(), SpeechError> {
        Ok(())
    }

    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, SpeechError>> {
        if self.chunks.is_empty() {
            futures::future::pending::<()>().await;
        }
        Some(Ok(self.chunks.remove(0)))
    }

    async fn disconnect(&mut self) {}
}

#[tokio::test(start_paused = true)]
async fn cancellation_while_waiting_for_audio_stops_playback() {
    let mut source = StallingSource {
        chunks: vec![pcm(&[0.1])],
    };
    let mut sink = RecordingSink::default();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let report = player().play(&mut source, &mut sink, &cancel).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.chunks, 1);
    assert_eq!(
        sink.events.lock().unwrap().as_slice(),
        &[SinkEvent::Queued(vec![0.1])]
    );
}
