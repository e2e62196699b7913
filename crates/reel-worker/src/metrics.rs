//! Worker metrics.
//!
//! Recorded through the `metrics` facade; the hosting binary installs the
//! exporter.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const TASKS_SUBMITTED_TOTAL: &str = "reel_tasks_submitted_total";
    pub const TASKS_COMPLETED_TOTAL: &str = "reel_tasks_completed_total";
    pub const TASKS_FAILED_TOTAL: &str = "reel_tasks_failed_total";
    pub const TASKS_RUNNING: &str = "reel_tasks_running";
    pub const TASKS_RECOVERED_TOTAL: &str = "reel_tasks_recovered_total";

    pub const SEGMENTS_RENDERED_TOTAL: &str = "reel_segments_rendered_total";
    pub const ACQUISITIONS_DEGRADED_TOTAL: &str = "reel_acquisitions_degraded_total";
    pub const SUMMARIES_DEGRADED_TOTAL: &str = "reel_summaries_degraded_total";

    pub const STAGE_DURATION_SECONDS: &str = "reel_stage_duration_seconds";
    pub const TASK_DURATION_SECONDS: &str = "reel_task_duration_seconds";
}

pub fn record_task_submitted(format: &str) {
    let labels = [("format", format.to_string())];
    counter!(names::TASKS_SUBMITTED_TOTAL, &labels).increment(1);
}

pub fn record_task_completed(duration_secs: f64) {
    counter!(names::TASKS_COMPLETED_TOTAL).increment(1);
    histogram!(names::TASK_DURATION_SECONDS).record(duration_secs);
}

pub fn record_task_failed(stage: &str) {
    let labels = [("stage", stage.to_string())];
    counter!(names::TASKS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_tasks_recovered(count: usize) {
    counter!(names::TASKS_RECOVERED_TOTAL).increment(count as u64);
}

pub fn task_started() {
    gauge!(names::TASKS_RUNNING).increment(1.0);
}

pub fn task_finished() {
    gauge!(names::TASKS_RUNNING).decrement(1.0);
}

pub fn record_segment_rendered() {
    counter!(names::SEGMENTS_RENDERED_TOTAL).increment(1);
}

pub fn record_degraded_acquisition() {
    counter!(names::ACQUISITIONS_DEGRADED_TOTAL).increment(1);
}

pub fn record_degraded_summary(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::SUMMARIES_DEGRADED_TOTAL, &labels).increment(1);
}

/// Wall-clock duration of one pipeline stage (`fetch`, `render`, `title_card`, `compile`).
pub fn record_stage_duration(stage: &str, duration_secs: f64) {
    let labels = [("stage", stage.to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}
