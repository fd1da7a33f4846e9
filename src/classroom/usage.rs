//! Per-call usage tracking via the CallSink trait.
//!
//! The client reports every remote call through a CallSink. This keeps the
//! client free of any particular logging or metrics backend:
//! - the CLI uses TracingCallSink
//! - tests use NoopCallSink or a recording sink

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::types::CourseId;

/// Status of a remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Success,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::Error => "error",
        }
    }
}

/// Record of one remote call (one page fetch or one patch).
#[derive(Debug, Clone)]
pub struct CallRecord {
    /// Endpoint: "courseWork.list", "studentSubmissions.patch", etc.
    pub endpoint: &'static str,
    /// Course the call targeted, if any.
    pub course_id: Option<CourseId>,
    /// Items returned (0 for patches).
    pub items: usize,
    /// Latency in milliseconds.
    pub latency_ms: u64,
    pub status: CallStatus,
    /// Error code if status is Error.
    pub error_code: Option<&'static str>,
    /// Remote request ID (for debugging).
    pub request_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CallRecord {
    pub fn new(endpoint: &'static str, course_id: Option<&CourseId>) -> Self {
        Self {
            endpoint,
            course_id: course_id.cloned(),
            items: 0,
            latency_ms: 0,
            status: CallStatus::Success,
            error_code: None,
            request_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn items(mut self, items: usize) -> Self {
        self.items = items;
        self
    }

    pub fn latency(mut self, ms: u64) -> Self {
        self.latency_ms = ms;
        self
    }

    pub fn error(mut self, code: &'static str) -> Self {
        self.status = CallStatus::Error;
        self.error_code = Some(code);
        self
    }

    pub fn request_id(mut self, id: Option<&str>) -> Self {
        self.request_id = id.map(str::to_string);
        self
    }
}

/// Trait for recording remote calls.
#[async_trait]
pub trait CallSink: Send + Sync {
    /// Record a call. Fire-and-forget: failures are never propagated.
    async fn record(&self, record: CallRecord);
}

/// Discards all records.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCallSink;

#[async_trait]
impl CallSink for NoopCallSink {
    async fn record(&self, _record: CallRecord) {}
}

/// Emits each record as a `tracing` event under the `classroom::calls` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingCallSink;

#[async_trait]
impl CallSink for TracingCallSink {
    async fn record(&self, record: CallRecord) {
        let course = record.course_id.as_ref().map(CourseId::as_str).unwrap_or("-");
        match record.status {
            CallStatus::Success => tracing::debug!(
                target: "classroom::calls",
                endpoint = record.endpoint,
                course_id = course,
                items = record.items,
                latency_ms = record.latency_ms,
                "remote call ok"
            ),
            CallStatus::Error => tracing::warn!(
                target: "classroom::calls",
                endpoint = record.endpoint,
                course_id = course,
                latency_ms = record.latency_ms,
                error_code = record.error_code.unwrap_or("unknown"),
                request_id = record.request_id.as_deref().unwrap_or("-"),
                "remote call failed"
            ),
        }
    }
}
