//! Dispatch scheduler.
//!
//! Validates a campaign against its dataset once, then turns every row into a
//! deferred [`SendJob`]. Row `i` is due `i * base_delay` after scheduling.
//! A row that cannot be scheduled is recorded in the batch result and the
//! remaining rows still go out.

use campaign_core::config::DispatchConfig;
use campaign_core::error::ValidationError;
use campaign_core::types::{BatchResult, SkipReason, SkippedRow};
use campaign_core::{Dataset, JobQueue, SendJob, Template};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct DispatchScheduler {
    queue: Arc<dyn JobQueue>,
    config: DispatchConfig,
}

impl DispatchScheduler {
    pub fn new(queue: Arc<dyn JobQueue>, config: DispatchConfig) -> Self {
        info!(
            queue = queue.name(),
            recipient_column = %config.recipient_column,
            base_delay_secs = config.base_delay_secs,
            "Dispatch scheduler initialized"
        );
        Self { queue, config }
    }

    /// Schedule one job per row using the configured default subject.
    pub async fn schedule(
        &self,
        dataset: &Dataset,
        template: &str,
    ) -> Result<BatchResult, ValidationError> {
        self.schedule_with_subject(dataset, template, None).await
    }

    /// Schedule one job per row.
    ///
    /// Validation runs before anything is enqueued; on error no job exists.
    /// The delay uses the row's position in the dataset, so a skipped row
    /// still occupies its slot.
    pub async fn schedule_with_subject(
        &self,
        dataset: &Dataset,
        template: &str,
        subject: Option<&str>,
    ) -> Result<BatchResult, ValidationError> {
        let parsed = self.validate(dataset, template)?;
        let subject = subject
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(self.config.default_subject.as_str());
        let base_delay = self.config.base_delay();
        let campaign_id = Uuid::new_v4();

        let mut result = BatchResult {
            campaign_id,
            scheduled_count: 0,
            skipped: Vec::new(),
        };

        for (row_index, row) in dataset.rows().iter().enumerate() {
            let recipient = row
                .get(&self.config.recipient_column)
                .map(|v| v.trim())
                .unwrap_or_default();

            if recipient.is_empty() {
                warn!(%campaign_id, row_index, "Row has no recipient, skipping");
                metrics::counter!("dispatch.rows_skipped", "reason" => "missing_recipient")
                    .increment(1);
                result.skipped.push(SkippedRow {
                    row_index,
                    reason: SkipReason::MissingRecipient,
                });
                continue;
            }

            let delay = delay_for(row_index, base_delay);
            let job = SendJob {
                job_id: Uuid::new_v4(),
                campaign_id,
                row_index,
                recipient: recipient.to_string(),
                subject: subject.to_string(),
                template: parsed.as_str().to_string(),
                fields: row.clone(),
                delay_offset: delay,
            };
            let job_id = job.job_id;

            match self.queue.enqueue(job, delay).await {
                Ok(()) => {
                    debug!(
                        %campaign_id,
                        %job_id,
                        row_index,
                        delay_secs = delay.as_secs(),
                        "Job scheduled"
                    );
                    metrics::counter!("dispatch.jobs_scheduled").increment(1);
                    result.scheduled_count += 1;
                }
                Err(e) => {
                    warn!(%campaign_id, row_index, error = %e, "Failed to enqueue row");
                    metrics::counter!("dispatch.rows_skipped", "reason" => "enqueue_failed")
                        .increment(1);
                    result.skipped.push(SkippedRow {
                        row_index,
                        reason: SkipReason::EnqueueFailed(e.to_string()),
                    });
                }
            }
        }

        info!(
            %campaign_id,
            rows = dataset.len(),
            scheduled = result.scheduled_count,
            skipped = result.skipped.len(),
            "Campaign scheduled"
        );
        Ok(result)
    }

    fn validate(&self, dataset: &Dataset, template: &str) -> Result<Template, ValidationError> {
        if template.trim().is_empty() {
            return Err(ValidationError::EmptyTemplate);
        }
        if !dataset.has_column(&self.config.recipient_column) {
            return Err(ValidationError::MissingRecipientColumn(
                self.config.recipient_column.clone(),
            ));
        }
        let parsed = Template::parse(template);
        parsed.validate(&dataset.column_set())?;
        Ok(parsed)
    }
}

fn delay_for(row_index: usize, base_delay: Duration) -> Duration {
    base_delay.saturating_mul(u32::try_from(row_index).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InProcessQueue;
    use async_trait::async_trait;
    use campaign_core::error::QueueError;
    use parking_lot::Mutex;

    /// Records every enqueue and fails the ones whose recipient is listed.
    #[derive(Default)]
    struct RecordingQueue {
        jobs: Mutex<Vec<(SendJob, Duration)>>,
        reject: Vec<String>,
    }

    #[async_trait]
    impl JobQueue for RecordingQueue {
        async fn enqueue(&self, job: SendJob, run_after: Duration) -> Result<(), QueueError> {
            if self.reject.contains(&job.recipient) {
                return Err(QueueError::Backend("broker unreachable".into()));
            }
            self.jobs.lock().push((job, run_after));
            Ok(())
        }

        async fn dequeue(&self) -> Result<Option<SendJob>, QueueError> {
            Ok(None)
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn dataset(columns: &[&str], rows: &[&[&str]]) -> Dataset {
        Dataset::from_rows(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| v.to_string()).collect())
                .collect(),
        )
        .unwrap()
    }

    fn scheduler(queue: Arc<dyn JobQueue>) -> DispatchScheduler {
        DispatchScheduler::new(queue, DispatchConfig::default())
    }

    #[tokio::test]
    async fn test_rows_get_staggered_delays() {
        let queue = Arc::new(RecordingQueue::default());
        let data = dataset(
            &["Email", "name"],
            &[&["a@x", "Ann"], &["b@x", "Bo"], &["c@x", "Cy"]],
        );

        let result = scheduler(queue.clone())
            .schedule(&data, "Hello {name}")
            .await
            .unwrap();

        assert_eq!(result.scheduled_count, 3);
        assert!(result.skipped.is_empty());

        let jobs = queue.jobs.lock();
        let delays: Vec<u64> = jobs.iter().map(|(_, d)| d.as_secs()).collect();
        assert_eq!(delays, vec![0, 5, 10]);
        let recipients: Vec<&str> = jobs.iter().map(|(j, _)| j.recipient.as_str()).collect();
        assert_eq!(recipients, vec!["a@x", "b@x", "c@x"]);
        assert!(jobs.iter().all(|(j, _)| j.subject == "Custom Email"));
        assert!(jobs.iter().all(|(j, _)| j.campaign_id == result.campaign_id));
        assert_eq!(jobs[1].0.delay_offset, Duration::from_secs(5));
        assert_eq!(jobs[2].0.fields.get("name").map(String::as_str), Some("Cy"));
    }

    #[tokio::test]
    async fn test_missing_placeholder_schedules_nothing() {
        let queue = Arc::new(RecordingQueue::default());
        let data = dataset(&["Email", "name"], &[&["a@x", "Ann"]]);

        let err = scheduler(queue.clone())
            .schedule(&data, "Hi {first_name}")
            .await
            .unwrap_err();

        assert_eq!(err, ValidationError::MissingKey("first_name".into()));
        assert!(queue.jobs.lock().is_empty());
    }

    #[tokio::test]
    async fn test_missing_email_column_rejected() {
        let queue = Arc::new(RecordingQueue::default());
        let data = dataset(&["name"], &[&["Ann"]]);

        let err = scheduler(queue.clone())
            .schedule(&data, "Hi {name}")
            .await
            .unwrap_err();

        assert_eq!(err, ValidationError::MissingRecipientColumn("Email".into()));
        assert!(queue.jobs.lock().is_empty());
    }

    #[tokio::test]
    async fn test_blank_template_rejected() {
        let queue = Arc::new(RecordingQueue::default());
        let data = dataset(&["Email"], &[&["a@x"]]);

        let err = scheduler(queue).schedule(&data, "   ").await.unwrap_err();
        assert_eq!(err, ValidationError::EmptyTemplate);
    }

    #[tokio::test]
    async fn test_blank_recipient_skipped_keeps_slot() {
        let queue = Arc::new(RecordingQueue::default());
        let data = dataset(&["Email"], &[&["a@x"], &["  "], &["c@x"]]);

        let result = scheduler(queue.clone())
            .schedule(&data, "Hello")
            .await
            .unwrap();

        assert_eq!(result.scheduled_count, 2);
        assert_eq!(
            result.skipped,
            vec![SkippedRow {
                row_index: 1,
                reason: SkipReason::MissingRecipient,
            }]
        );
        let delays: Vec<u64> = queue.jobs.lock().iter().map(|(_, d)| d.as_secs()).collect();
        assert_eq!(delays, vec![0, 10]);
    }

    #[tokio::test]
    async fn test_enqueue_failure_isolated_to_its_row() {
        let queue = Arc::new(RecordingQueue {
            reject: vec!["b@x".into()],
            ..Default::default()
        });
        let data = dataset(&["Email"], &[&["a@x"], &["b@x"], &["c@x"]]);

        let result = scheduler(queue.clone())
            .schedule(&data, "Hello")
            .await
            .unwrap();

        assert_eq!(result.scheduled_count, 2);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].row_index, 1);
        assert!(matches!(
            result.skipped[0].reason,
            SkipReason::EnqueueFailed(_)
        ));
        assert_eq!(queue.jobs.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_custom_subject_and_empty_dataset() {
        let queue = Arc::new(RecordingQueue::default());
        let sched = scheduler(queue.clone());

        let empty = dataset(&["Email"], &[]);
        let result = sched.schedule(&empty, "Hello").await.unwrap();
        assert_eq!(result.scheduled_count, 0);

        let data = dataset(&["Email"], &[&["a@x"]]);
        sched
            .schedule_with_subject(&data, "Hello", Some("Spring sale"))
            .await
            .unwrap();
        assert_eq!(queue.jobs.lock()[0].0.subject, "Spring sale");
    }

    #[tokio::test]
    async fn test_closed_queue_skips_every_row() {
        let queue = Arc::new(InProcessQueue::new());
        queue.close();
        let data = dataset(&["Email"], &[&["a@x"], &["b@x"]]);

        let result = scheduler(queue).schedule(&data, "Hello").await.unwrap();

        assert_eq!(result.scheduled_count, 0);
        assert_eq!(result.skipped.len(), 2);
    }

    #[test]
    fn test_delay_for() {
        let base = Duration::from_secs(5);
        assert_eq!(delay_for(0, base), Duration::ZERO);
        assert_eq!(delay_for(7, base), Duration::from_secs(35));
    }
}
