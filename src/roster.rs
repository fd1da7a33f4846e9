//! Roster assembly: the gradable assignments and enrolled students of a course.

use serde::{Deserialize, Serialize};

use crate::classroom::{Assignment, ClassroomClient, CourseId, Student};
use crate::error::{GradeSyncError, ResourceKind};

/// Ordered (assignments, students) pair the grade matrix is aligned to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    pub course_id: CourseId,
    pub assignments: Vec<Assignment>,
    pub students: Vec<Student>,
}

impl Roster {
    pub fn new(course_id: CourseId, assignments: Vec<Assignment>, students: Vec<Student>) -> Self {
        Self {
            course_id,
            assignments,
            students,
        }
    }

    /// (assignments, students)
    pub fn dimensions(&self) -> (usize, usize) {
        (self.assignments.len(), self.students.len())
    }
}

/// Fetch the roster of `course_id`.
///
/// Assignments are kept only if they belong to this application and carry
/// positive max points; students are kept as listed. Server order is
/// preserved for both. Either listing failing aborts the whole assembly.
pub async fn assemble_roster(
    client: &ClassroomClient,
    course_id: &CourseId,
) -> Result<Roster, GradeSyncError> {
    let assignments = async {
        client
            .list_assignments(course_id)
            .await
            .map_err(|e| GradeSyncError::fetch(ResourceKind::Assignments, course_id, e))
    };
    let students = async {
        client
            .list_students(course_id)
            .await
            .map_err(|e| GradeSyncError::fetch(ResourceKind::Students, course_id, e))
    };

    let (assignments, students) = futures::try_join!(assignments, students)?;

    let listed = assignments.len();
    let assignments: Vec<Assignment> = assignments
        .into_iter()
        .filter(Assignment::is_gradable)
        .collect();

    tracing::debug!(
        course_id = %course_id,
        listed,
        gradable = assignments.len(),
        students = students.len(),
        "roster assembled"
    );

    Ok(Roster::new(course_id.clone(), assignments, students))
}
