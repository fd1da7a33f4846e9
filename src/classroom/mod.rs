//! Client for the remote classroom service.
//!
//! [`ClassroomApi`] is the page-level contract of the remote service.
//! [`ClassroomClient`] wraps any implementation and turns cursor-paginated
//! listings into complete, server-ordered sequences. One attempt per call:
//! failures reach the caller unmodified.

pub mod error;
pub mod http;
pub mod types;
pub mod usage;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cancel::CancelFlag;

pub use error::{ClassroomError, ErrorContext};
pub use http::HttpClassroom;
pub use types::*;
pub use usage::{CallRecord, CallSink, CallStatus, NoopCallSink, TracingCallSink};

/// Page-level operations exposed by the remote classroom service.
#[async_trait::async_trait]
pub trait ClassroomApi: Send + Sync {
    async fn list_assignments(
        &self,
        course_id: &CourseId,
        page_token: Option<&str>,
    ) -> Result<Page<Assignment>, ClassroomError>;

    async fn list_students(
        &self,
        course_id: &CourseId,
        page_token: Option<&str>,
    ) -> Result<Page<Student>, ClassroomError>;

    async fn list_submissions(
        &self,
        course_id: &CourseId,
        assignment_id: &AssignmentId,
        page_token: Option<&str>,
    ) -> Result<Page<Submission>, ClassroomError>;

    /// Write exactly the fields named by `patch`, leaving the rest of the
    /// remote submission untouched.
    async fn patch_submission(
        &self,
        course_id: &CourseId,
        assignment_id: &AssignmentId,
        submission_id: &SubmissionId,
        patch: GradePatch,
    ) -> Result<(), ClassroomError>;

    async fn get_course(&self, course_id: &CourseId) -> Result<Course, ClassroomError>;

    /// Active courses the signed-in user teaches.
    async fn list_courses(&self, page_token: Option<&str>) -> Result<Page<Course>, ClassroomError>;

    /// Profile of the signed-in user.
    async fn get_profile(&self) -> Result<UserProfile, ClassroomError>;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upper bound on pages followed by one listing.
    pub max_pages: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { max_pages: 10_000 }
    }
}

/// Draining, cancellable wrapper over a [`ClassroomApi`].
pub struct ClassroomClient {
    api: Arc<dyn ClassroomApi>,
    sink: Arc<dyn CallSink>,
    config: ClientConfig,
    cancel: CancelFlag,
}

impl ClassroomClient {
    pub fn new(api: Arc<dyn ClassroomApi>) -> Self {
        Self::with_config(api, Arc::new(NoopCallSink), ClientConfig::default())
    }

    pub fn with_config(
        api: Arc<dyn ClassroomApi>,
        sink: Arc<dyn CallSink>,
        config: ClientConfig,
    ) -> Self {
        Self {
            api,
            sink,
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// Tie every call made through this client to `cancel`.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// All course work of a course, in server order.
    pub async fn list_assignments(
        &self,
        course_id: &CourseId,
    ) -> Result<Vec<Assignment>, ClassroomError> {
        self.drain("courseWork.list", Some(course_id), |token| async move {
            self.api.list_assignments(course_id, token.as_deref()).await
        })
        .await
    }

    /// All enrolled students of a course, in server order.
    pub async fn list_students(&self, course_id: &CourseId) -> Result<Vec<Student>, ClassroomError> {
        self.drain("students.list", Some(course_id), |token| async move {
            self.api.list_students(course_id, token.as_deref()).await
        })
        .await
    }

    /// All submissions for one assignment, in server order.
    pub async fn list_submissions(
        &self,
        course_id: &CourseId,
        assignment_id: &AssignmentId,
    ) -> Result<Vec<Submission>, ClassroomError> {
        self.drain("studentSubmissions.list", Some(course_id), |token| async move {
            self.api
                .list_submissions(course_id, assignment_id, token.as_deref())
                .await
        })
        .await
    }

    /// Active courses taught by the signed-in user.
    pub async fn list_courses(&self) -> Result<Vec<Course>, ClassroomError> {
        self.drain("courses.list", None, |token| async move {
            self.api.list_courses(token.as_deref()).await
        })
        .await
    }

    pub async fn get_course(&self, course_id: &CourseId) -> Result<Course, ClassroomError> {
        self.call("courses.get", Some(course_id), 1, self.api.get_course(course_id))
            .await
    }

    pub async fn get_profile(&self) -> Result<UserProfile, ClassroomError> {
        self.call("userProfiles.get", None, 1, self.api.get_profile())
            .await
    }

    /// Set both the assigned and the draft grade of `submission` to `grade`.
    pub async fn patch_submission_grade(
        &self,
        submission: &Submission,
        grade: Option<f64>,
    ) -> Result<(), ClassroomError> {
        let fut = self.api.patch_submission(
            &submission.course_id,
            &submission.assignment_id,
            &submission.id,
            GradePatch::both(grade),
        );
        self.call("studentSubmissions.patch", Some(&submission.course_id), 0, fut)
            .await
    }

    async fn drain<'a, T, F, Fut>(
        &'a self,
        endpoint: &'static str,
        course_id: Option<&'a CourseId>,
        mut fetch: F,
    ) -> Result<Vec<T>, ClassroomError>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<T>, ClassroomError>>,
    {
        let mut items = Vec::new();
        let mut token: Option<String> = None;

        for _ in 0..self.config.max_pages {
            let start = Instant::now();
            let result = self.cancel.run(fetch(token.take())).await;
            let record = CallRecord::new(endpoint, course_id).latency(millis(start.elapsed()));
            let page = match result {
                Ok(page) => {
                    self.sink.record(record.items(page.items.len())).await;
                    page
                }
                Err(err) => {
                    self.sink
                        .record(record.error(err.code()).request_id(err.request_id()))
                        .await;
                    return Err(err);
                }
            };

            token = page.next_token().map(str::to_string);
            items.extend(page.items);
            if token.is_none() {
                return Ok(items);
            }
        }

        Err(ClassroomError::Pagination {
            pages: self.config.max_pages,
        })
    }

    async fn call<T, Fut>(
        &self,
        endpoint: &'static str,
        course_id: Option<&CourseId>,
        items: usize,
        fut: Fut,
    ) -> Result<T, ClassroomError>
    where
        Fut: Future<Output = Result<T, ClassroomError>>,
    {
        let start = Instant::now();
        let result = self.cancel.run(fut).await;
        let record = CallRecord::new(endpoint, course_id).latency(millis(start.elapsed()));
        match &result {
            Ok(_) => self.sink.record(record.items(items)).await,
            Err(err) => {
                self.sink
                    .record(record.error(err.code()).request_id(err.request_id()))
                    .await
            }
        }
        result
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis().min(u64::MAX as u128) as u64
}
