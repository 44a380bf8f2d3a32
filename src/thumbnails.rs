//! Thumbnail batch generation.
//!
//! The source video is written to disk once and shared read-only by one extraction task per
//! valid timestamp. Tasks run on tokio's blocking pool; slot `i` of the result belongs to
//! request entry `i` alone, so completion order never affects output order. A failed
//! extraction leaves its slot empty and never fails the batch.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;

use crate::engine::{FrameRequest, MediaEngine};
use crate::error::AppError;
use crate::ffmpeg::format_seek_seconds;
use crate::request::{ThumbnailBatch, ThumbnailSpec, TimestampRequest, VideoSource};
use crate::temp::{TempFileManager, TransientFile};

/// Where a single extraction gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Engine call: seek, decode, scale, encode or write.
    Extract,
    /// The engine reported success but left no usable artifact, or it could not be read back.
    Collect,
    /// The task panicked or was torn down before finishing.
    Aborted,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureStage::Extract => "extract",
            FailureStage::Collect => "collect",
            FailureStage::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Terminal state of one per-timestamp task.
#[derive(Debug)]
pub enum ExtractionOutcome {
    Done(Vec<u8>),
    Failed { stage: FailureStage, reason: String },
}

impl ExtractionOutcome {
    fn failed(stage: FailureStage, reason: impl Into<String>) -> Self {
        Self::Failed {
            stage,
            reason: reason.into(),
        }
    }

    pub fn into_slot(self) -> Option<Vec<u8>> {
        match self {
            ExtractionOutcome::Done(bytes) => Some(bytes),
            ExtractionOutcome::Failed { .. } => None,
        }
    }
}

/// Everything one task needs; owned so it can move onto a worker thread.
struct ExtractionJob {
    index: usize,
    offset_ms: u64,
    width: u32,
    image_extension: String,
    video: Arc<TransientFile>,
    temp: TempFileManager,
    engine: Arc<dyn MediaEngine>,
}

impl ExtractionJob {
    fn run(self) -> ExtractionOutcome {
        let started = Instant::now();
        let offset = Duration::from_millis(self.offset_ms);
        let seek = format_seek_seconds(offset);

        // Output artifact is removed when `output` drops, on every path out of this fn.
        let output = self
            .temp
            .allocate(&format!("thumb-{}", self.index), self.offset_ms, &self.image_extension);

        let request = FrameRequest {
            input: self.video.path(),
            offset,
            width: self.width,
            output: output.path(),
        };
        let outcome = match self.engine.extract_frame(&request) {
            Err(e) => {
                let (summary, _) = e.summary_and_detail();
                ExtractionOutcome::failed(FailureStage::Extract, summary)
            }
            Ok(()) if !output.exists() => {
                ExtractionOutcome::failed(FailureStage::Collect, "no frame produced at offset")
            }
            Ok(()) => match output.read() {
                Ok(bytes) if bytes.is_empty() => {
                    ExtractionOutcome::failed(FailureStage::Collect, "engine wrote an empty image")
                }
                Ok(bytes) => ExtractionOutcome::Done(bytes),
                Err(e) => ExtractionOutcome::failed(FailureStage::Collect, e.to_string()),
            },
        };

        let elapsed_ms = started.elapsed().as_millis();
        match &outcome {
            ExtractionOutcome::Done(bytes) => log::debug!(
                target: "vidthumb::thumbnails",
                "[{}] {}s in {} ms ({} bytes)",
                self.index,
                seek,
                elapsed_ms,
                bytes.len()
            ),
            ExtractionOutcome::Failed { stage, reason } => log::warn!(
                target: "vidthumb::thumbnails",
                "[{}] failed at {}s in {} ms ({}): {}",
                self.index,
                seek,
                elapsed_ms,
                stage,
                reason
            ),
        }
        outcome
    }
}

fn block_on_async<T>(future: impl Future<Output = Result<T, AppError>>) -> Result<T, AppError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::from(format!("Failed to initialize async runtime: {}", e)))?;
    runtime.block_on(future)
}

/// Generates one thumbnail per timestamp and returns them in request order.
///
/// `max_parallel` bounds how many extractions run at once; `None` launches every valid
/// timestamp immediately. Fatal errors are limited to writing the shared video file.
pub async fn generate_thumbnails_async(
    engine: Arc<dyn MediaEngine>,
    temp: &TempFileManager,
    source: &VideoSource,
    timestamps: &TimestampRequest,
    spec: &ThumbnailSpec,
    max_parallel: Option<usize>,
) -> Result<ThumbnailBatch, AppError> {
    let mut slots: Vec<Option<Vec<u8>>> = vec![None; timestamps.len()];
    if timestamps.is_empty() {
        return Ok(ThumbnailBatch::from_slots(slots));
    }

    let video = Arc::new(temp.create("video", "batch", source.extension(), source.bytes())?);
    let started = Instant::now();
    let limiter = max_parallel
        .filter(|n| *n > 0)
        .map(|n| Arc::new(Semaphore::new(n.min(Semaphore::MAX_PERMITS))));

    for (index, entry) in timestamps.entries().iter().enumerate() {
        if !matches!(entry, Some(ms) if *ms >= 0) {
            log::debug!(
                target: "vidthumb::thumbnails",
                "[{}] skipping invalid timestamp {:?}",
                index,
                entry
            );
        }
    }

    let mut handles = Vec::new();
    for (index, offset_ms) in timestamps.valid_entries() {
        let job = ExtractionJob {
            index,
            offset_ms,
            width: spec.width(),
            image_extension: spec.image_extension().to_string(),
            video: Arc::clone(&video),
            temp: temp.clone(),
            engine: Arc::clone(&engine),
        };
        let permit = match &limiter {
            Some(semaphore) => Some(
                Arc::clone(semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|e| AppError::from(format!("Extraction limiter closed: {}", e)))?,
            ),
            None => None,
        };
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job.run()
        });
        handles.push((index, handle));
    }

    let launched = handles.len();
    for (index, handle) in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                log::warn!(
                    target: "vidthumb::thumbnails",
                    "[{}] extraction task aborted: {}",
                    index,
                    join_err
                );
                ExtractionOutcome::failed(FailureStage::Aborted, join_err.to_string())
            }
        };
        slots[index] = outcome.into_slot();
    }

    // Every task has finished, so this is the last handle to the shared video.
    drop(video);

    let batch = ThumbnailBatch::from_slots(slots);
    log::info!(
        target: "vidthumb::thumbnails",
        "Generated {}/{} thumbnails ({} launched) in {} ms",
        batch.filled_count(),
        batch.len(),
        launched,
        started.elapsed().as_millis()
    );
    Ok(batch)
}

/// Blocking wrapper around [`generate_thumbnails_async`] for synchronous callers.
pub fn generate_thumbnails(
    engine: Arc<dyn MediaEngine>,
    temp: &TempFileManager,
    source: &VideoSource,
    timestamps: &TimestampRequest,
    spec: &ThumbnailSpec,
    max_parallel: Option<usize>,
) -> Result<ThumbnailBatch, AppError> {
    block_on_async(generate_thumbnails_async(
        engine,
        temp,
        source,
        timestamps,
        spec,
        max_parallel,
    ))
}

/// Paths of every artifact under `dir`; used by tests to assert nothing was left behind.
#[cfg(test)]
pub(crate) fn artifacts_in(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| entries.flatten().map(|e| e.path()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeEngine;
    use std::path::Path;
    use std::sync::atomic::Ordering;

    fn source() -> VideoSource {
        VideoSource::new(b"fake-video".to_vec(), "mp4").unwrap()
    }

    fn spec() -> ThumbnailSpec {
        ThumbnailSpec::new(100, "jpg").unwrap()
    }

    fn run(
        engine: Arc<FakeEngine>,
        dir: &Path,
        timestamps: TimestampRequest,
        max_parallel: Option<usize>,
    ) -> Result<ThumbnailBatch, AppError> {
        generate_thumbnails(
            engine,
            &TempFileManager::new(dir),
            &source(),
            &timestamps,
            &spec(),
            max_parallel,
        )
    }

    #[test]
    fn slots_follow_input_order_and_skip_out_of_range() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Arc::new(FakeEngine::with_duration_ms(5000));
        let batch = run(
            Arc::clone(&engine),
            dir.path(),
            TimestampRequest::from_millis([0, 2500, 9999]),
            None,
        )
        .expect("batch");

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.slots()[0].as_deref(), Some(&b"frame@0:w100"[..]));
        assert_eq!(batch.slots()[1].as_deref(), Some(&b"frame@2500:w100"[..]));
        assert_eq!(batch.slots()[2], None);
        assert!(artifacts_in(dir.path()).is_empty(), "no artifacts may remain");
    }

    #[test]
    fn out_of_order_completion_keeps_positions() {
        let dir = tempfile::tempdir().expect("tempdir");
        // Earlier entries sleep longer so they finish last.
        let engine = Arc::new(
            FakeEngine::with_duration_ms(10_000).with_delay(|ms| Duration::from_millis(80 - ms / 100)),
        );
        let stamps = [0, 1000, 2000, 3000, 4000, 5000, 6000, 7000];
        let batch = run(engine, dir.path(), TimestampRequest::from_millis(stamps), None).unwrap();
        for (slot, ms) in batch.slots().iter().zip(stamps) {
            let expected = format!("frame@{}:w100", ms);
            assert_eq!(slot.as_deref(), Some(expected.as_bytes()));
        }
    }

    #[test]
    fn duplicates_and_invalid_entries_keep_slot_count() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Arc::new(FakeEngine::with_duration_ms(5000));
        let request = TimestampRequest::from_entries(vec![Some(100), None, Some(-1), Some(100)]);
        let batch = run(Arc::clone(&engine), dir.path(), request, None).unwrap();

        assert_eq!(batch.len(), 4);
        assert!(batch.slots()[0].is_some());
        assert!(batch.slots()[1].is_none());
        assert!(batch.slots()[2].is_none());
        assert_eq!(batch.slots()[0], batch.slots()[3]);
        assert_eq!(engine.extract_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn engine_errors_become_empty_slots() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Arc::new(FakeEngine::with_duration_ms(5000).failing_at(1000));
        let batch = run(
            engine,
            dir.path(),
            TimestampRequest::from_millis([500, 1000, 1500]),
            None,
        )
        .unwrap();
        assert_eq!(batch.filled_count(), 2);
        assert!(batch.slots()[1].is_none());
        assert!(artifacts_in(dir.path()).is_empty());
    }

    #[test]
    fn panicking_task_becomes_empty_slot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Arc::new(FakeEngine::with_duration_ms(5000).panicking_at(2000));
        let batch = run(
            engine,
            dir.path(),
            TimestampRequest::from_millis([2000, 3000]),
            None,
        )
        .unwrap();
        assert_eq!(batch.slots()[0], None);
        assert!(batch.slots()[1].is_some());
        assert!(artifacts_in(dir.path()).is_empty());
    }

    #[test]
    fn empty_request_yields_empty_batch_without_touching_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Arc::new(FakeEngine::with_duration_ms(5000));
        let batch = run(
            Arc::clone(&engine),
            &dir.path().join("missing"),
            TimestampRequest::default(),
            None,
        )
        .unwrap();
        assert!(batch.is_empty());
        assert_eq!(engine.extract_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unwritable_temp_dir_is_fatal_file_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Arc::new(FakeEngine::with_duration_ms(5000));
        let err = run(
            engine,
            &dir.path().join("missing"),
            TimestampRequest::from_millis([0]),
            None,
        )
        .expect_err("write should fail");
        assert_eq!(err.code(), "FileError");
    }

    #[test]
    fn fan_out_is_unbounded_by_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Arc::new(
            FakeEngine::with_duration_ms(100_000).with_delay(|_| Duration::from_millis(150)),
        );
        run(
            Arc::clone(&engine),
            dir.path(),
            TimestampRequest::from_millis((0..6).map(|i| i * 1000)),
            None,
        )
        .unwrap();
        assert_eq!(engine.peak_concurrency.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn max_parallel_bounds_concurrency() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Arc::new(
            FakeEngine::with_duration_ms(100_000).with_delay(|_| Duration::from_millis(30)),
        );
        let batch = run(
            Arc::clone(&engine),
            dir.path(),
            TimestampRequest::from_millis((0..8).map(|i| i * 1000)),
            Some(2),
        )
        .unwrap();
        assert_eq!(batch.filled_count(), 8);
        assert!(engine.peak_concurrency.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn oversized_bound_is_clamped_to_limiter_capacity() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Arc::new(FakeEngine::with_duration_ms(5000));
        let batch = run(
            engine,
            dir.path(),
            TimestampRequest::from_millis([0, 1000]),
            Some(usize::MAX),
        )
        .expect("batch");
        assert_eq!(batch.filled_count(), 2);
        assert!(artifacts_in(dir.path()).is_empty());
    }

    #[test]
    fn empty_image_from_engine_leaves_slot_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Arc::new(FakeEngine::with_duration_ms(5000).writing_empty_at(1000));
        let batch = run(
            engine,
            dir.path(),
            TimestampRequest::from_millis([0, 1000]),
            None,
        )
        .unwrap();
        assert!(batch.slots()[0].is_some());
        assert_eq!(batch.slots()[1], None);
        assert!(artifacts_in(dir.path()).is_empty());
    }

    #[test]
    fn tasks_see_the_shared_video_and_it_is_removed_after() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Arc::new(FakeEngine::with_duration_ms(5000));
        run(
            Arc::clone(&engine),
            dir.path(),
            TimestampRequest::from_millis([0, 1, 2]),
            None,
        )
        .unwrap();
        let inputs = engine.seen_inputs.lock().clone();
        assert_eq!(inputs.len(), 3);
        assert!(inputs.windows(2).all(|w| w[0] == w[1]), "one shared video per batch");
        assert!(inputs[0].to_string_lossy().ends_with(".mp4"));
        assert!(!inputs[0].exists());
    }

    #[test]
    fn idempotent_slot_count_across_runs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Arc::new(FakeEngine::with_duration_ms(3000));
        let request = TimestampRequest::from_millis([0, 1500, 2999, 3000, 10_000]);
        let a = run(Arc::clone(&engine), dir.path(), request.clone(), None).unwrap();
        let b = run(engine, dir.path(), request, None).unwrap();
        assert_eq!(a.filled_count(), b.filled_count());
        assert_eq!(a.filled_count(), 3);
    }
}
