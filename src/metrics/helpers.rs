//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use super::{
    MAILS_TOTAL, NOTIFICATIONS_SENT_TOTAL, NOTIFICATIONS_SKIPPED_TOTAL, QUEUE_DEPTH,
    TASKS_DEAD_LETTERED_TOTAL, TASKS_ENQUEUED_TOTAL, TASK_ATTEMPTS_TOTAL, TASK_DURATION,
    TASK_RETRIES_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording task metrics
pub struct TaskMetrics;

impl TaskMetrics {
    pub fn record_enqueued(task: &str) {
        TASKS_ENQUEUED_TOTAL.with_label_values(&[task]).inc();
    }

    pub fn record_attempt(task: &str) {
        TASK_ATTEMPTS_TOTAL.with_label_values(&[task]).inc();
    }

    pub fn record_retry(task: &str) {
        TASK_RETRIES_TOTAL.with_label_values(&[task]).inc();
    }

    pub fn record_dead_letter(task: &str, error_class: &str) {
        TASKS_DEAD_LETTERED_TOTAL
            .with_label_values(&[task, error_class])
            .inc();
    }

    /// Record how long one attempt ran. `outcome` is "ok" or "error".
    pub fn record_duration(task: &str, outcome: &str, elapsed: Duration) {
        TASK_DURATION
            .with_label_values(&[task, outcome])
            .observe(elapsed.as_secs_f64());
    }
}

/// Helper struct for recording mail gateway results
pub struct MailMetrics;

impl MailMetrics {
    pub fn record_accepted(transport: &str) {
        MAILS_TOTAL.with_label_values(&[transport, "accepted"]).inc();
    }

    pub fn record_rejected(transport: &str) {
        MAILS_TOTAL.with_label_values(&[transport, "rejected"]).inc();
    }

    pub fn record_failed(transport: &str) {
        MAILS_TOTAL.with_label_values(&[transport, "failed"]).inc();
    }
}

/// Helper struct for notification outcomes
pub struct NotificationMetrics;

impl NotificationMetrics {
    pub fn record_sent() {
        NOTIFICATIONS_SENT_TOTAL.inc();
    }

    /// Reasons: "update", "already_notified", "missing_email", "document_missing"
    pub fn record_skipped(reason: &str) {
        NOTIFICATIONS_SKIPPED_TOTAL.with_label_values(&[reason]).inc();
    }
}

/// Helper struct for queue gauges
pub struct QueueMetrics;

impl QueueMetrics {
    pub fn update_depth(pending: usize, running: usize, dead: usize) {
        QUEUE_DEPTH.with_label_values(&["pending"]).set(pending as i64);
        QUEUE_DEPTH.with_label_values(&["running"]).set(running as i64);
        QUEUE_DEPTH.with_label_values(&["dead"]).set(dead as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_recorded_metrics() {
        TaskMetrics::record_enqueued("metrics_test_task");
        MailMetrics::record_accepted("metrics_test_transport");
        QueueMetrics::update_depth(3, 1, 0);

        let output = encode_metrics().unwrap();
        assert!(output.contains("docnotify_tasks_enqueued_total"));
        assert!(output.contains("metrics_test_task"));
        assert!(output.contains("docnotify_mails_total"));
        assert!(output.contains("docnotify_queue_depth"));
    }
}
