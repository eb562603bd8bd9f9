//! Prometheus metrics for the notification pipeline.
//!
//! This module provides metrics for monitoring the pipeline:
//! - Task metrics (enqueued, attempts, retries, dead letters, duration)
//! - Mail metrics (accepted, rejected, failed by transport)
//! - Notification metrics (sent, skipped by reason)
//! - Queue depth gauges

mod helpers;

pub use helpers::{encode_metrics, MailMetrics, NotificationMetrics, QueueMetrics, TaskMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge_vec, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "docnotify";

lazy_static! {
    // ============================================================================
    // Task Metrics
    // ============================================================================

    /// Total tasks enqueued by task name
    pub static ref TASKS_ENQUEUED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_tasks_enqueued_total", METRIC_PREFIX),
        "Total tasks enqueued",
        &["task"]
    ).unwrap();

    /// Total task executions (one per attempt)
    pub static ref TASK_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_task_attempts_total", METRIC_PREFIX),
        "Total task attempts started",
        &["task"]
    ).unwrap();

    /// Total retries scheduled after a failed attempt
    pub static ref TASK_RETRIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_task_retries_total", METRIC_PREFIX),
        "Total task retries scheduled",
        &["task"]
    ).unwrap();

    /// Total tasks dead-lettered, by failure class of the last attempt
    pub static ref TASKS_DEAD_LETTERED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_tasks_dead_lettered_total", METRIC_PREFIX),
        "Total tasks dead-lettered after exhausting attempts",
        &["task", "error_class"]
    ).unwrap();

    /// Task attempt duration
    pub static ref TASK_DURATION: HistogramVec = register_histogram_vec!(
        format!("{}_task_duration_seconds", METRIC_PREFIX),
        "Task attempt duration in seconds",
        &["task", "outcome"],
        vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    // ============================================================================
    // Mail Metrics
    // ============================================================================

    /// Mail gateway results by transport and result (accepted/rejected/failed)
    pub static ref MAILS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_mails_total", METRIC_PREFIX),
        "Total mail gateway calls by result",
        &["transport", "result"]
    ).unwrap();

    // ============================================================================
    // Notification Metrics
    // ============================================================================

    /// Documents stamped as notified
    pub static ref NOTIFICATIONS_SENT_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_sent_total", METRIC_PREFIX),
        "Total documents stamped as notified"
    ).unwrap();

    /// Notifications skipped, by reason
    pub static ref NOTIFICATIONS_SKIPPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_skipped_total", METRIC_PREFIX),
        "Total notifications skipped",
        &["reason"]
    ).unwrap();

    // ============================================================================
    // Queue Metrics
    // ============================================================================

    /// Tasks currently in the queue by state (pending/running/dead)
    pub static ref QUEUE_DEPTH: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_queue_depth", METRIC_PREFIX),
        "Tasks currently held by the queue",
        &["state"]
    ).unwrap();
}
