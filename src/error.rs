//! Error taxonomy of the grade synchronization engine.

use std::fmt;

use thiserror::Error;

use crate::classroom::{AssignmentId, ClassroomError, CourseId, UserId};

/// Remote resource a failed listing was for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    Assignments,
    Students,
    Submissions { assignment_id: AssignmentId },
    Course,
    Courses,
    Profile,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Assignments => f.write_str("assignments"),
            ResourceKind::Students => f.write_str("students"),
            ResourceKind::Submissions { assignment_id } => {
                write!(f, "submissions of assignment {assignment_id}")
            }
            ResourceKind::Course => f.write_str("course"),
            ResourceKind::Courses => f.write_str("courses"),
            ResourceKind::Profile => f.write_str("user profile"),
        }
    }
}

/// Failures that abort a roster build, matrix build, or reconciliation pass.
///
/// Per-cell write failures are not here: they are collected in
/// [`crate::reconcile::ReconcileReport`].
#[derive(Debug, Error)]
pub enum GradeSyncError {
    /// No stored credential for the user; start a fresh authorization flow.
    #[error("authorization required for user {user_id}")]
    AuthorizationRequired { user_id: UserId },

    /// The remote rejected the credential; re-authorize instead of retrying.
    #[error("authorization expired: {source}")]
    AuthorizationExpired {
        #[source]
        source: ClassroomError,
    },

    #[error("failed to fetch {kind} for course {course_id}: {source}")]
    ResourceFetch {
        kind: ResourceKind,
        course_id: CourseId,
        #[source]
        source: ClassroomError,
    },

    /// Edited matrix does not line up with the roster it claims to belong to.
    #[error("grade matrix shape mismatch: expected {rows}x{cols}, {detail}")]
    MatrixShape {
        rows: usize,
        cols: usize,
        detail: String,
    },

    /// Remote client could not be constructed.
    #[error("client setup failed: {0}")]
    Connect(#[source] ClassroomError),

    #[error("cancelled")]
    Cancelled,
}

impl GradeSyncError {
    /// Classify a failed listing. Credential rejection and cancellation keep
    /// their own variants so callers can react to them directly.
    pub fn fetch(kind: ResourceKind, course_id: &CourseId, source: ClassroomError) -> Self {
        match source {
            ClassroomError::Unauthorized { .. } => Self::AuthorizationExpired { source },
            ClassroomError::Cancelled => Self::Cancelled,
            source => Self::ResourceFetch {
                kind,
                course_id: course_id.clone(),
                source,
            },
        }
    }

    /// Whether the caller should send the user back through authorization.
    pub fn requires_reauthorization(&self) -> bool {
        matches!(
            self,
            Self::AuthorizationRequired { .. } | Self::AuthorizationExpired { .. }
        )
    }

    /// Short code for logs and API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthorizationRequired { .. } => "authorization_required",
            Self::AuthorizationExpired { .. } => "authorization_expired",
            Self::ResourceFetch { .. } => "resource_fetch_failure",
            Self::MatrixShape { .. } => "matrix_shape",
            Self::Connect(_) => "connect",
            Self::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_classification() {
        let course = CourseId::new("c1");
        let err = GradeSyncError::fetch(
            ResourceKind::Students,
            &course,
            ClassroomError::unauthorized("expired"),
        );
        assert!(err.requires_reauthorization());

        let err = GradeSyncError::fetch(ResourceKind::Students, &course, ClassroomError::Cancelled);
        assert!(matches!(err, GradeSyncError::Cancelled));

        let err = GradeSyncError::fetch(
            ResourceKind::Assignments,
            &course,
            ClassroomError::remote(500, "boom"),
        );
        assert_eq!(err.code(), "resource_fetch_failure");
        assert_eq!(
            err.to_string(),
            "failed to fetch assignments for course c1: remote error (HTTP 500): boom"
        );
    }
}
