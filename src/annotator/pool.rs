use crate::annotator::{LabelError, RetryPolicy, VisionLabeler};
use crate::models::AnnotationRecord;
use crate::utils;
use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use std::time::Duration;

/// Bounded-concurrency batch annotator.
///
/// Fans one labeling task out per image, gated by a semaphore so at most
/// `concurrency` external calls are in flight at any instant. Failed
/// attempts are retried per the injected `RetryPolicy`; the permit is
/// released before each backoff sleep and reacquired for the next attempt,
/// so a slow-retrying image never idles a pool slot.
///
/// Every input yields exactly one record: terminal failures degrade to a
/// null-filled row instead of aborting the batch.
pub struct AnnotationPool {
    labeler: Arc<dyn VisionLabeler>,
    concurrency: usize,
    retry: RetryPolicy,
    deadline: Option<Duration>,
}

impl AnnotationPool {
    /// Create a pool. Fails only on invalid configuration.
    pub fn new(
        labeler: Arc<dyn VisionLabeler>,
        concurrency: usize,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if concurrency == 0 {
            anyhow::bail!("concurrency limit must be at least 1");
        }
        if retry.max_attempts == 0 {
            anyhow::bail!("max_attempts must be at least 1");
        }

        Ok(Self {
            labeler,
            concurrency,
            retry,
            deadline: None,
        })
    }

    /// Set an overall batch deadline. Once it passes, tasks that have not
    /// yet issued their first attempt (or would retry) resolve immediately
    /// to null-filled records; attempts already in flight finish normally.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Annotate every image, returning one record per input in completion
    /// order. Callers that need input order can sort afterwards.
    pub async fn run_batch(&self, image_refs: &[PathBuf]) -> Vec<AnnotationRecord> {
        self.run_batch_with_progress(image_refs, |_| {}).await
    }

    /// Like `run_batch`, invoking `on_complete` as each image finishes
    pub async fn run_batch_with_progress<F>(
        &self,
        image_refs: &[PathBuf],
        on_complete: F,
    ) -> Vec<AnnotationRecord>
    where
        F: Fn(&AnnotationRecord),
    {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let deadline = self.deadline.map(|d| Instant::now() + d);

        let mut tasks = FuturesUnordered::new();
        for path in image_refs {
            tasks.push(self.annotate_gated(path, &semaphore, deadline));
        }

        let mut records = Vec::with_capacity(image_refs.len());
        while let Some(record) = tasks.next().await {
            on_complete(&record);
            records.push(record);
        }
        records
    }

    /// Annotate a single image with the pool's retry policy, outside any
    /// semaphore gating
    pub async fn annotate_one(&self, image_ref: &Path) -> AnnotationRecord {
        self.annotate_inner(image_ref, None, None).await
    }

    async fn annotate_gated(
        &self,
        image_ref: &Path,
        semaphore: &Semaphore,
        deadline: Option<Instant>,
    ) -> AnnotationRecord {
        self.annotate_inner(image_ref, Some(semaphore), deadline).await
    }

    async fn annotate_inner(
        &self,
        image_ref: &Path,
        semaphore: Option<&Semaphore>,
        deadline: Option<Instant>,
    ) -> AnnotationRecord {
        let file_name = file_name_of(image_ref);

        // Unreadable input fails fast: no attempt can fix a bad local file
        let image_base64 = match std::fs::read(image_ref) {
            Ok(bytes) => utils::encode_image_base64(&bytes),
            Err(e) => {
                let err = LabelError::Input(e);
                eprintln!("Skipping {}: {}", file_name, err);
                return AnnotationRecord::failed(file_name);
            }
        };

        let mut attempt = 1u32;
        loop {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    eprintln!(
                        "Batch deadline reached before attempt {} for {}",
                        attempt, file_name
                    );
                    return AnnotationRecord::failed(file_name);
                }
            }

            // Permit scope covers exactly one request+parse attempt
            let outcome = {
                let _permit = match semaphore {
                    Some(s) => Some(s.acquire().await.expect("annotation semaphore closed")),
                    None => None,
                };
                self.labeler.label_image(&image_base64).await
            };

            match outcome {
                Ok(annotation) => {
                    return AnnotationRecord::from_annotation(file_name, annotation);
                }
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_before_retry(attempt);
                    eprintln!(
                        "Error annotating {} (attempt {}/{}): {}. Retrying in {:.1}s...",
                        file_name,
                        attempt,
                        self.retry.max_attempts,
                        err,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    eprintln!(
                        "Failed to annotate {} after {} attempt(s): {}",
                        file_name, attempt, err
                    );
                    return AnnotationRecord::failed(file_name);
                }
            }
        }
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Annotation, Category, Color, Gender, Occasion};
    use base64::{engine::general_purpose::STANDARD, Engine};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Instrumented fake service. The behavior of each call is scripted by
    /// the decoded image payload:
    /// - "ok"          always succeeds
    /// - "malformed"   always returns a parse failure
    /// - "fail:N"      fails the first N calls, then succeeds
    /// It also tracks the concurrent-call high-water mark.
    struct FakeLabeler {
        calls: Mutex<HashMap<String, u32>>,
        in_flight: AtomicUsize,
        high_water: AtomicUsize,
        hold: Duration,
    }

    impl FakeLabeler {
        fn new() -> Self {
            Self::with_hold(Duration::from_millis(5))
        }

        fn with_hold(hold: Duration) -> Self {
            Self {
                calls: Mutex::new(HashMap::new()),
                in_flight: AtomicUsize::new(0),
                high_water: AtomicUsize::new(0),
                hold,
            }
        }

        fn calls_for(&self, script: &str) -> u32 {
            self.calls
                .lock()
                .unwrap()
                .get(script)
                .copied()
                .unwrap_or(0)
        }

        fn total_calls(&self) -> u32 {
            self.calls.lock().unwrap().values().sum()
        }

        fn high_water_mark(&self) -> usize {
            self.high_water.load(Ordering::SeqCst)
        }

        fn sample_annotation() -> Annotation {
            Annotation {
                description: "a classic blue cotton shirt with white buttons".to_string(),
                category: Category::Top,
                gender: Gender::Unisex,
                occasion: Occasion::Work,
                color: Color::Blue,
            }
        }
    }

    #[async_trait::async_trait]
    impl VisionLabeler for FakeLabeler {
        async fn label_image(&self, image_base64: &str) -> Result<Annotation, LabelError> {
            let script = String::from_utf8(STANDARD.decode(image_base64).unwrap()).unwrap();

            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.high_water.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(self.hold).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let count = {
                let mut calls = self.calls.lock().unwrap();
                let entry = calls.entry(script.clone()).or_insert(0);
                *entry += 1;
                *entry
            };

            if script == "ok" {
                return Ok(Self::sample_annotation());
            }
            if script == "malformed" {
                return Err(LabelError::Malformed {
                    reason: "expected value at line 1".to_string(),
                    raw: "I cannot label this image.".to_string(),
                });
            }
            if let Some(n) = script.strip_prefix("fail:") {
                let n: u32 = n.parse().unwrap();
                if count <= n {
                    return Err(LabelError::Service {
                        status: Some(429),
                        message: "rate limited".to_string(),
                    });
                }
                return Ok(Self::sample_annotation());
            }
            panic!("unknown script: {}", script);
        }
    }

    fn write_images(dir: &Path, specs: &[(&str, &str)]) -> Vec<PathBuf> {
        specs
            .iter()
            .map(|(name, script)| {
                let path = dir.join(name);
                std::fs::write(&path, script).unwrap();
                path
            })
            .collect()
    }

    fn pool_with(
        labeler: Arc<FakeLabeler>,
        concurrency: usize,
        max_attempts: u32,
    ) -> AnnotationPool {
        AnnotationPool::new(labeler, concurrency, RetryPolicy::immediate(max_attempts)).unwrap()
    }

    #[test]
    fn test_pool_rejects_zero_concurrency() {
        let labeler = Arc::new(FakeLabeler::new());
        assert!(AnnotationPool::new(labeler, 0, RetryPolicy::immediate(1)).is_err());
    }

    #[test]
    fn test_pool_rejects_zero_attempts() {
        let labeler = Arc::new(FakeLabeler::new());
        assert!(AnnotationPool::new(labeler, 2, RetryPolicy::immediate(0)).is_err());
    }

    #[tokio::test]
    async fn test_empty_batch_returns_empty_result_set() {
        let labeler = Arc::new(FakeLabeler::new());
        let pool = pool_with(labeler.clone(), 4, 1);
        let records = pool.run_batch(&[]).await;
        assert!(records.is_empty());
        assert_eq!(labeler.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_one_record_per_input_no_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let specs: Vec<(String, &str)> =
            (0..12).map(|i| (format!("img_{:02}.jpg", i), "ok")).collect();
        let spec_refs: Vec<(&str, &str)> =
            specs.iter().map(|(n, s)| (n.as_str(), *s)).collect();
        let paths = write_images(dir.path(), &spec_refs);

        let labeler = Arc::new(FakeLabeler::new());
        let pool = pool_with(labeler, 3, 1);
        let records = pool.run_batch(&paths).await;

        assert_eq!(records.len(), 12);
        let mut names: Vec<_> = records.iter().map(|r| r.file_name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 12);
        assert!(records.iter().all(|r| r.is_annotated()));
    }

    #[tokio::test]
    async fn test_concurrency_limit_is_never_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let specs: Vec<(String, &str)> =
            (0..10).map(|i| (format!("img_{:02}.jpg", i), "ok")).collect();
        let spec_refs: Vec<(&str, &str)> =
            specs.iter().map(|(n, s)| (n.as_str(), *s)).collect();
        let paths = write_images(dir.path(), &spec_refs);

        let labeler = Arc::new(FakeLabeler::with_hold(Duration::from_millis(20)));
        let pool = pool_with(labeler.clone(), 3, 1);
        let records = pool.run_batch(&paths).await;

        assert_eq!(records.len(), 10);
        assert!(labeler.high_water_mark() <= 3);
        // with 10 images and a 20ms hold, the pool should actually saturate
        assert!(labeler.high_water_mark() >= 2);
    }

    #[tokio::test]
    async fn test_success_on_attempt_k_records_k_calls() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_images(dir.path(), &[("flaky.jpg", "fail:2")]);

        let labeler = Arc::new(FakeLabeler::new());
        let pool = pool_with(labeler.clone(), 2, 4);
        let records = pool.run_batch(&paths).await;

        assert_eq!(records.len(), 1);
        assert!(records[0].is_annotated());
        assert_eq!(labeler.calls_for("fail:2"), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_yield_null_record() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_images(dir.path(), &[("bad.jpg", "malformed")]);

        let labeler = Arc::new(FakeLabeler::new());
        let pool = pool_with(labeler.clone(), 2, 3);
        let records = pool.run_batch(&paths).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_name, "bad.jpg");
        assert!(!records[0].is_annotated());
        assert!(records[0].description.is_none());
        assert_eq!(labeler.calls_for("malformed"), 3);
    }

    #[tokio::test]
    async fn test_mixed_batch_scenario() {
        // a.jpg and c.jpg succeed, b.jpg returns malformed JSON;
        // concurrency 2, single attempt
        let dir = tempfile::tempdir().unwrap();
        let paths = write_images(
            dir.path(),
            &[("a.jpg", "ok"), ("b.jpg", "malformed"), ("c.jpg", "ok")],
        );

        let labeler = Arc::new(FakeLabeler::new());
        let pool = pool_with(labeler.clone(), 2, 1);
        let records = pool.run_batch(&paths).await;

        assert_eq!(records.len(), 3);
        for record in &records {
            match record.file_name.as_str() {
                "a.jpg" | "c.jpg" => {
                    assert!(record.is_annotated());
                    assert!(record.description.is_some());
                }
                "b.jpg" => {
                    assert!(!record.is_annotated());
                    assert!(record.description.is_none());
                }
                other => panic!("unexpected record: {}", other),
            }
        }
        assert!(labeler.high_water_mark() <= 2);
    }

    #[tokio::test]
    async fn test_unreadable_input_fails_fast_without_service_calls() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = write_images(dir.path(), &[("good.jpg", "ok")]);
        paths.push(dir.path().join("missing.jpg"));

        let labeler = Arc::new(FakeLabeler::new());
        let pool = pool_with(labeler.clone(), 2, 4);
        let records = pool.run_batch(&paths).await;

        assert_eq!(records.len(), 2);
        let missing = records
            .iter()
            .find(|r| r.file_name == "missing.jpg")
            .unwrap();
        assert!(!missing.is_annotated());
        // only the readable file ever reached the service, with no retries
        assert_eq!(labeler.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_deadline_yields_null_records_without_calls() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_images(dir.path(), &[("a.jpg", "ok"), ("b.jpg", "ok")]);

        let labeler = Arc::new(FakeLabeler::new());
        let pool = pool_with(labeler.clone(), 2, 4).with_deadline(Duration::ZERO);
        let records = pool.run_batch(&paths).await;

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| !r.is_annotated()));
        assert_eq!(labeler.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_progress_callback_fires_once_per_image() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_images(
            dir.path(),
            &[("a.jpg", "ok"), ("b.jpg", "malformed"), ("c.jpg", "ok")],
        );

        let labeler = Arc::new(FakeLabeler::new());
        let pool = pool_with(labeler, 2, 1);
        let seen = AtomicUsize::new(0);
        let records = pool
            .run_batch_with_progress(&paths, |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        assert_eq!(records.len(), 3);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_annotate_one_retries_then_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_images(dir.path(), &[("single.jpg", "fail:1")]);

        let labeler = Arc::new(FakeLabeler::new());
        let pool = pool_with(labeler.clone(), 1, 2);
        let record = pool.annotate_one(&paths[0]).await;

        assert!(record.is_annotated());
        assert_eq!(labeler.calls_for("fail:1"), 2);
    }
}
