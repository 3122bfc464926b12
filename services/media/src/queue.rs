//! In-process FIFO queue for post-upload processing
//!
//! One job runs at a time across the whole process. Jobs are not persisted:
//! videos left in `processing` by a restart stay there.

use async_trait::async_trait;
use std::{collections::VecDeque, sync::Arc};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{models::ProcessingJob, processor::MediaProcessor};

/// Reason recorded on videos whose processing failed
pub const PROCESSING_FAILED_REASON: &str = "Processing failed (Invalid file)";

/// Receives the outcome of each job
#[async_trait]
pub trait VideoStatusSink: Send + Sync {
    /// Store thumbnail and duration and move the video to moderation
    async fn mark_processed(
        &self,
        video_id: Uuid,
        thumbnail_url: &str,
        duration_seconds: i32,
    ) -> anyhow::Result<()>;

    /// Reject the video with `reason`
    async fn mark_failed(&self, video_id: Uuid, reason: &str) -> anyhow::Result<()>;
}

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<ProcessingJob>,
    busy: bool,
}

struct Inner {
    state: Mutex<QueueState>,
    processor: Arc<dyn MediaProcessor>,
    sink: Arc<dyn VideoStatusSink>,
}

/// Single-worker processing queue
#[derive(Clone)]
pub struct ProcessingQueue {
    inner: Arc<Inner>,
}

impl ProcessingQueue {
    pub fn new(processor: Arc<dyn MediaProcessor>, sink: Arc<dyn VideoStatusSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                processor,
                sink,
            }),
        }
    }

    /// Append a job and start draining if the worker is idle
    pub async fn enqueue(&self, job: ProcessingJob) {
        info!("Job added for video {}", job.video_id);

        let idle = {
            let mut state = self.inner.state.lock().await;
            state.jobs.push_back(job);
            !state.busy
        };

        if idle {
            let queue = self.clone();
            tokio::spawn(async move { queue.drain().await });
        }
    }

    /// Jobs waiting behind the one in flight
    pub async fn pending(&self) -> usize {
        self.inner.state.lock().await.jobs.len()
    }

    /// Whether a job is currently running
    pub async fn is_busy(&self) -> bool {
        self.inner.state.lock().await.busy
    }

    async fn drain(&self) {
        loop {
            let job = {
                let mut state = self.inner.state.lock().await;
                if state.busy {
                    return;
                }
                match state.jobs.pop_front() {
                    Some(job) => {
                        state.busy = true;
                        job
                    }
                    None => return,
                }
            };

            self.run(job).await;

            self.inner.state.lock().await.busy = false;
        }
    }

    async fn run(&self, job: ProcessingJob) {
        let video_id = job.video_id;
        info!("Processing video {}", video_id);

        // a panicking processor surfaces as a JoinError instead of killing the worker
        let processor = Arc::clone(&self.inner.processor);
        let outcome = tokio::spawn(async move { processor.process(&job).await }).await;

        let recorded = match outcome {
            Ok(Ok(processed)) => {
                info!("Video {} processed successfully", video_id);
                self.inner
                    .sink
                    .mark_processed(video_id, &processed.thumbnail_url, processed.duration_seconds)
                    .await
            }
            Ok(Err(e)) => {
                error!("Processing failed for video {}: {}", video_id, e);
                self.inner
                    .sink
                    .mark_failed(video_id, PROCESSING_FAILED_REASON)
                    .await
            }
            Err(e) => {
                error!("Processing task for video {} aborted: {}", video_id, e);
                self.inner
                    .sink
                    .mark_failed(video_id, PROCESSING_FAILED_REASON)
                    .await
            }
        };

        if let Err(e) = recorded {
            warn!("Could not record processing outcome for video {}: {:#}", video_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{MediaError, MediaResult},
        models::ProcessedMedia,
    };
    use std::{
        path::PathBuf,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };
    use tokio::sync::mpsc;

    #[derive(Debug, PartialEq)]
    enum Outcome {
        Processed(Uuid, String, i32),
        Failed(Uuid, String),
    }

    struct ChannelSink(mpsc::UnboundedSender<Outcome>);

    #[async_trait]
    impl VideoStatusSink for ChannelSink {
        async fn mark_processed(
            &self,
            video_id: Uuid,
            thumbnail_url: &str,
            duration_seconds: i32,
        ) -> anyhow::Result<()> {
            self.0.send(Outcome::Processed(
                video_id,
                thumbnail_url.to_string(),
                duration_seconds,
            ))?;
            Ok(())
        }

        async fn mark_failed(&self, video_id: Uuid, reason: &str) -> anyhow::Result<()> {
            self.0.send(Outcome::Failed(video_id, reason.to_string()))?;
            Ok(())
        }
    }

    /// Fails jobs whose filename starts with "bad", panics on "panic"
    #[derive(Default)]
    struct FakeProcessor {
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    #[async_trait]
    impl MediaProcessor for FakeProcessor {
        async fn process(&self, job: &ProcessingJob) -> MediaResult<ProcessedMedia> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            if job.filename.starts_with("panic") {
                panic!("decoder exploded");
            }
            if job.filename.starts_with("bad") {
                return Err(MediaError::InvalidVideo);
            }
            Ok(ProcessedMedia {
                thumbnail_url: format!("/uploads/thumb-{}.png", job.filename),
                duration_seconds: 42,
            })
        }
    }

    fn job(filename: &str) -> ProcessingJob {
        ProcessingJob {
            video_id: Uuid::new_v4(),
            filename: filename.to_string(),
            file_path: PathBuf::from("/tmp").join(filename),
        }
    }

    fn queue() -> (
        ProcessingQueue,
        Arc<FakeProcessor>,
        mpsc::UnboundedReceiver<Outcome>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let processor = Arc::new(FakeProcessor::default());
        let queue = ProcessingQueue::new(processor.clone(), Arc::new(ChannelSink(tx)));
        (queue, processor, rx)
    }

    #[tokio::test]
    async fn test_success_marks_processed() {
        let (queue, _, mut rx) = queue();
        let job = job("a");
        let id = job.video_id;

        queue.enqueue(job).await;

        assert_eq!(
            rx.recv().await,
            Some(Outcome::Processed(id, "/uploads/thumb-a.png".to_string(), 42))
        );
    }

    #[tokio::test]
    async fn test_failure_and_panic_mark_failed() {
        let (queue, _, mut rx) = queue();
        let bad = job("bad");
        let boom = job("panic");
        let (bad_id, boom_id) = (bad.video_id, boom.video_id);

        queue.enqueue(bad).await;
        queue.enqueue(boom).await;

        assert_eq!(
            rx.recv().await,
            Some(Outcome::Failed(bad_id, PROCESSING_FAILED_REASON.to_string()))
        );
        assert_eq!(
            rx.recv().await,
            Some(Outcome::Failed(boom_id, PROCESSING_FAILED_REASON.to_string()))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_jobs_run_one_at_a_time_in_order() {
        let (queue, processor, mut rx) = queue();
        let jobs: Vec<_> = (0..5).map(|i| job(&format!("clip{}", i))).collect();
        let ids: Vec<_> = jobs.iter().map(|j| j.video_id).collect();

        for job in jobs {
            queue.enqueue(job).await;
        }

        let mut seen = Vec::new();
        for _ in 0..5 {
            match rx.recv().await {
                Some(Outcome::Processed(id, _, _)) => seen.push(id),
                other => panic!("unexpected outcome: {:?}", other),
            }
        }

        assert_eq!(seen, ids);
        assert_eq!(processor.max_running.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_queue_keeps_working_after_failure() {
        let (queue, _, mut rx) = queue();
        queue.enqueue(job("panic")).await;
        assert!(matches!(rx.recv().await, Some(Outcome::Failed(..))));

        let next = job("after");
        let id = next.video_id;
        queue.enqueue(next).await;
        assert!(matches!(rx.recv().await, Some(Outcome::Processed(got, _, _)) if got == id));

        // the worker clears its busy flag right after recording
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!queue.is_busy().await);
        assert_eq!(queue.pending().await, 0);
    }
}
