//! Request-scoped grading operations for the presentation layer.
//!
//! Every call looks up the user's credential, builds a fresh client bound to
//! the caller's cancel flag, and rebuilds whatever it needs from the remote.
//! Nothing is kept between calls.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cancel::CancelFlag;
use crate::classroom::{
    Assignment, CallSink, ClassroomClient, Course, CourseId, NoopCallSink, Student, UserId,
};
use crate::config::GraderConfig;
use crate::credentials::{Connector, CredentialProvider, HttpConnector};
use crate::error::{GradeSyncError, ResourceKind};
use crate::matrix::{build_matrix, DenseGrades, GradeMatrix};
use crate::reconcile::{reconcile_with, ReconcileReport, WriteMode};
use crate::roster::{assemble_roster, Roster};

/// Course picker contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSelection {
    pub teacher_name: String,
    pub courses: Vec<Course>,
}

/// What the bulk-grading grid shows, and what it sends back on save.
///
/// `grades[i][j]` is the grade of `students[j]` on `assignments[i]`; `null`
/// means ungraded, which is not the same as `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingView {
    pub course_id: CourseId,
    pub course_name: String,
    pub assignments: Vec<Assignment>,
    pub students: Vec<Student>,
    pub grades: DenseGrades,
}

impl GradingView {
    pub fn new(course: Course, roster: Roster, matrix: &GradeMatrix) -> Self {
        Self {
            course_id: course.id,
            course_name: course.name,
            grades: matrix.to_dense(),
            assignments: roster.assignments,
            students: roster.students,
        }
    }

    pub fn roster(&self) -> Roster {
        Roster::new(
            self.course_id.clone(),
            self.assignments.clone(),
            self.students.clone(),
        )
    }

    /// Identity-keyed matrix of the (possibly edited) grades.
    pub fn matrix(&self) -> Result<GradeMatrix, GradeSyncError> {
        GradeMatrix::from_dense(&self.roster(), &self.grades)
    }
}

pub struct Grader {
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn Connector>,
    sink: Arc<dyn CallSink>,
    config: GraderConfig,
}

impl Grader {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn Connector>,
        config: GraderConfig,
    ) -> Self {
        Self {
            credentials,
            connector,
            sink: Arc::new(NoopCallSink),
            config: config.normalized(),
        }
    }

    /// HTTP-backed grader for `config`.
    pub fn http(credentials: Arc<dyn CredentialProvider>, config: GraderConfig) -> Self {
        let connector = Arc::new(HttpConnector::new(config.clone()));
        Self::new(credentials, connector, config)
    }

    pub fn with_call_sink(mut self, sink: Arc<dyn CallSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &GraderConfig {
        &self.config
    }

    async fn client(
        &self,
        user_id: &UserId,
        cancel: &CancelFlag,
    ) -> Result<ClassroomClient, GradeSyncError> {
        if cancel.is_cancelled() {
            return Err(GradeSyncError::Cancelled);
        }
        let credential = self.credentials.get_credential(user_id).await.ok_or_else(|| {
            GradeSyncError::AuthorizationRequired {
                user_id: user_id.clone(),
            }
        })?;
        let api = self
            .connector
            .connect(&credential)
            .map_err(GradeSyncError::Connect)?;
        Ok(
            ClassroomClient::with_config(api, self.sink.clone(), self.config.client_config())
                .with_cancel(cancel.clone()),
        )
    }

    /// The teacher's name and active courses.
    pub async fn select_course(
        &self,
        user_id: &UserId,
        cancel: &CancelFlag,
    ) -> Result<CourseSelection, GradeSyncError> {
        let client = self.client(user_id, cancel).await?;
        let unscoped = CourseId::new("");

        let profile = async {
            client
                .get_profile()
                .await
                .map_err(|e| GradeSyncError::fetch(ResourceKind::Profile, &unscoped, e))
        };
        let courses = async {
            client
                .list_courses()
                .await
                .map_err(|e| GradeSyncError::fetch(ResourceKind::Courses, &unscoped, e))
        };
        let (profile, courses) = futures::try_join!(profile, courses)?;

        Ok(CourseSelection {
            teacher_name: profile.full_name,
            courses,
        })
    }

    /// Roster and current grades of one course.
    pub async fn open_course(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        cancel: &CancelFlag,
    ) -> Result<GradingView, GradeSyncError> {
        let client = self.client(user_id, cancel).await?;

        let course = async {
            client
                .get_course(course_id)
                .await
                .map_err(|e| GradeSyncError::fetch(ResourceKind::Course, course_id, e))
        };
        let (course, roster) = futures::try_join!(course, assemble_roster(&client, course_id))?;

        let matrix = build_matrix(&client, &roster, self.config.fetch_concurrency).await?;
        Ok(GradingView::new(course, roster, &matrix))
    }

    /// Write the grades of an edited view back to the remote.
    pub async fn save(
        &self,
        user_id: &UserId,
        edited: &GradingView,
        mode: WriteMode,
        cancel: &CancelFlag,
    ) -> Result<ReconcileReport, GradeSyncError> {
        let matrix = edited.matrix()?;
        let client = self.client(user_id, cancel).await?;
        reconcile_with(
            &client,
            &edited.course_id,
            &matrix,
            self.config.patch_concurrency,
            mode,
        )
        .await
    }
}
