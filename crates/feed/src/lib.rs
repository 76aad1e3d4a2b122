//! Runs a [`TranscriptEngine`] against a live chunk stream.
//!
//! [`spawn`] consumes the stream on its own task and pushes one snapshot into
//! the sink per accepted mutation. The returned [`FeedHandle`] stops the task
//! and surfaces the engine's counters; a fresh [`spawn`] always starts from
//! empty state.

mod sink;

use std::time::{Duration, Instant};

use futures_util::{Stream, StreamExt};
use palaver_transcript::{EngineConfig, EngineStats, TranscriptEngine};
use relay_interface::RawChunk;
use tokio::sync::oneshot;
use tracing::Instrument;

pub use sink::{ChannelSink, SnapshotSink};

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub engine: EngineConfig,
    /// Spans are tagged with this id; a random one is generated when unset.
    pub session_id: Option<String>,
    /// How often stale reassembly buffers are evicted while no chunks arrive.
    pub sweep_interval: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            session_id: None,
            sweep_interval: Duration::from_secs(1),
        }
    }
}

pub struct FeedHandle {
    shutdown_tx: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<EngineStats>,
}

impl FeedHandle {
    /// Signals the feed to stop and waits for it to wind down. No snapshot is
    /// delivered after this returns.
    pub async fn stop(self) -> EngineStats {
        let _ = self.shutdown_tx.send(());
        Self::finish(self.task).await
    }

    /// Waits for the feed to end on its own, which happens when the chunk
    /// stream is exhausted.
    pub async fn join(self) -> EngineStats {
        Self::finish(self.task).await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    async fn finish(task: tokio::task::JoinHandle<EngineStats>) -> EngineStats {
        match task.await {
            Ok(stats) => stats,
            Err(error) => {
                tracing::error!(%error, "feed_task_panicked");
                EngineStats::default()
            }
        }
    }
}

pub fn spawn<S, K>(chunks: S, sink: K, config: FeedConfig) -> FeedHandle
where
    S: Stream<Item = RawChunk> + Send + 'static,
    K: SnapshotSink,
{
    let session_id = config
        .session_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let span = tracing::info_span!("transcript_feed", session_id = %session_id);

    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(
        async move {
            let mut engine = TranscriptEngine::new(config.engine);
            let mut sink = sink;
            let mut sweep = tokio::time::interval(config.sweep_interval);
            futures_util::pin_mut!(chunks);

            tracing::info!("feed_started");
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => {
                        tracing::info!("feed_stopped");
                        break;
                    }
                    chunk = chunks.next() => {
                        let Some(chunk) = chunk else {
                            tracing::info!("feed_source_ended");
                            break;
                        };
                        if let Some(snapshot) = engine.apply_chunk(&chunk, Instant::now()) {
                            sink.deliver(snapshot);
                        }
                    }
                    _ = sweep.tick() => {
                        engine.sweep(Instant::now());
                    }
                }
            }

            engine.stats()
        }
        .instrument(span),
    );

    FeedHandle { shutdown_tx, task }
}
