//! Delivery worker: executes one send job end to end.

use campaign_core::types::DeliveryOutcome;
use campaign_core::{DeliveryTransport, SendJob, TextGenerator};
use campaign_personalization::personalize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub struct DeliveryWorker {
    generator: Arc<dyn TextGenerator>,
    transport: Arc<dyn DeliveryTransport>,
}

impl DeliveryWorker {
    pub fn new(generator: Arc<dyn TextGenerator>, transport: Arc<dyn DeliveryTransport>) -> Self {
        Self {
            generator,
            transport,
        }
    }

    /// Personalize the job's template for its row and send the result.
    ///
    /// Never returns an error: personalization and transport failures become
    /// a `Failure` outcome and are logged. Nothing is retried.
    pub async fn execute(&self, job: &SendJob) -> DeliveryOutcome {
        let start = Instant::now();

        let body = match personalize(&job.template, &job.fields, self.generator.as_ref()).await {
            Ok(body) => body,
            Err(e) => {
                return self.fail(job, "personalization", e.to_string());
            }
        };

        let outcome = match self
            .transport
            .deliver(&job.recipient, &job.subject, &body)
            .await
        {
            Ok(status_code) => {
                debug!(
                    job_id = %job.job_id,
                    recipient = %job.recipient,
                    status_code,
                    "Message delivered"
                );
                metrics::counter!("delivery.sent", "transport" => self.transport.name().to_string())
                    .increment(1);
                DeliveryOutcome::Success { status_code }
            }
            Err(e) => self.fail(job, "transport", e.to_string()),
        };

        metrics::histogram!("delivery.latency_us").record(start.elapsed().as_micros() as f64);
        outcome
    }

    fn fail(&self, job: &SendJob, stage: &'static str, cause: String) -> DeliveryOutcome {
        warn!(
            job_id = %job.job_id,
            campaign_id = %job.campaign_id,
            row_index = job.row_index,
            recipient = %job.recipient,
            stage,
            cause = %cause,
            "Delivery failed"
        );
        metrics::counter!("delivery.failed", "stage" => stage).increment(1);
        DeliveryOutcome::Failure { cause }
    }
}
