//! Grade matrix: grades keyed by (assignment, student) identity, laid out
//! densely only when handed to the presentation layer.

use std::collections::HashMap;

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::classroom::{Assignment, AssignmentId, ClassroomClient, StudentId, Submission};
use crate::error::{GradeSyncError, ResourceKind};
use crate::roster::Roster;

/// Dense grade rows: `rows[assignment][student]`, `None` = ungraded.
pub type DenseGrades = Vec<Vec<Option<f64>>>;

/// One cell of the matrix with both its position and its identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell<'a> {
    pub row: usize,
    pub col: usize,
    pub assignment_id: &'a AssignmentId,
    pub student_id: &'a StudentId,
    pub grade: Option<f64>,
}

/// Grades of one roster.
///
/// Cells are stored by identity; the roster order only decides how
/// [`GradeMatrix::to_dense`] lays them out. A grade can never drift to
/// another student because a position moved.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeMatrix {
    assignments: Vec<AssignmentId>,
    students: Vec<StudentId>,
    student_index: HashMap<StudentId, usize>,
    grades: HashMap<(AssignmentId, StudentId), f64>,
}

impl GradeMatrix {
    /// All-null matrix shaped like `roster`.
    pub fn empty(roster: &Roster) -> Self {
        let assignments: Vec<AssignmentId> =
            roster.assignments.iter().map(|a| a.id.clone()).collect();
        let students: Vec<StudentId> = roster.students.iter().map(|s| s.id.clone()).collect();

        let mut student_index = HashMap::with_capacity(students.len());
        for (pos, id) in students.iter().enumerate() {
            student_index.entry(id.clone()).or_insert(pos);
        }

        Self {
            assignments,
            students,
            student_index,
            grades: HashMap::new(),
        }
    }

    /// Rebuild from dense rows received from the presentation layer.
    ///
    /// `rows` must have one row per roster assignment and one cell per roster
    /// student in every row.
    pub fn from_dense(roster: &Roster, rows: &[Vec<Option<f64>>]) -> Result<Self, GradeSyncError> {
        let (n_rows, n_cols) = roster.dimensions();
        if rows.len() != n_rows {
            return Err(GradeSyncError::MatrixShape {
                rows: n_rows,
                cols: n_cols,
                detail: format!("got {} rows", rows.len()),
            });
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
            return Err(GradeSyncError::MatrixShape {
                rows: n_rows,
                cols: n_cols,
                detail: format!("row {i} has {} cells", row.len()),
            });
        }

        let mut matrix = Self::empty(roster);
        for (assignment, row) in roster.assignments.iter().zip(rows) {
            for (student, grade) in roster.students.iter().zip(row) {
                matrix.set(&assignment.id, &student.id, *grade);
            }
        }
        Ok(matrix)
    }

    /// (assignments, students)
    pub fn dimensions(&self) -> (usize, usize) {
        (self.assignments.len(), self.students.len())
    }

    pub fn assignment_ids(&self) -> &[AssignmentId] {
        &self.assignments
    }

    pub fn student_ids(&self) -> &[StudentId] {
        &self.students
    }

    /// Roster position of a student, if enrolled.
    pub fn student_position(&self, student_id: &StudentId) -> Option<usize> {
        self.student_index.get(student_id).copied()
    }

    pub fn get(&self, assignment_id: &AssignmentId, student_id: &StudentId) -> Option<f64> {
        self.grades
            .get(&(assignment_id.clone(), student_id.clone()))
            .copied()
    }

    /// Set a cell. Returns false (and stores nothing) when the student is not
    /// on the roster.
    pub fn set(
        &mut self,
        assignment_id: &AssignmentId,
        student_id: &StudentId,
        grade: Option<f64>,
    ) -> bool {
        if !self.student_index.contains_key(student_id) {
            return false;
        }
        let key = (assignment_id.clone(), student_id.clone());
        match grade {
            Some(g) => {
                self.grades.insert(key, g);
            }
            None => {
                self.grades.remove(&key);
            }
        }
        true
    }

    /// Cells of one assignment row, in roster student order.
    pub fn row<'a>(&'a self, row: usize) -> impl Iterator<Item = Cell<'a>> + 'a {
        let assignment_id = self.assignments.get(row);
        self.students
            .iter()
            .enumerate()
            .filter_map(move |(col, student_id)| {
                let assignment_id = assignment_id?;
                Some(Cell {
                    row,
                    col,
                    assignment_id,
                    student_id,
                    grade: self.get(assignment_id, student_id),
                })
            })
    }

    /// Every cell, assignment-major.
    pub fn cells(&self) -> impl Iterator<Item = Cell<'_>> + '_ {
        (0..self.assignments.len()).flat_map(move |row| self.row(row))
    }

    /// Dense `rows[assignment][student]` view in roster order.
    pub fn to_dense(&self) -> DenseGrades {
        (0..self.assignments.len())
            .map(|row| self.row(row).map(|cell| cell.grade).collect())
            .collect()
    }

    /// Write the assigned grades of `submissions` into the row of
    /// `assignment_id`. Submissions for students not on the roster, or for
    /// another assignment, are skipped. Returns how many were skipped.
    fn apply_submissions(&mut self, assignment_id: &AssignmentId, submissions: &[Submission]) -> usize {
        let mut skipped = 0;
        for submission in submissions {
            if &submission.assignment_id != assignment_id {
                skipped += 1;
                continue;
            }
            if !self.set(assignment_id, &submission.student_id, submission.assigned_grade) {
                tracing::debug!(
                    assignment_id = %assignment_id,
                    student_id = %submission.student_id,
                    submission_id = %submission.id,
                    "submission has no roster entry, skipping"
                );
                skipped += 1;
            }
        }
        skipped
    }
}

/// Fetch every assignment's submissions and align their grades to `roster`.
///
/// Submission listings run `concurrency` at a time but are applied in roster
/// order. The first failed listing aborts the build.
pub async fn build_matrix(
    client: &ClassroomClient,
    roster: &Roster,
    concurrency: usize,
) -> Result<GradeMatrix, GradeSyncError> {
    let course_id = &roster.course_id;

    let fetched: Vec<(&Assignment, Vec<Submission>)> =
        stream::iter(roster.assignments.iter().map(|assignment| async move {
            client
                .list_submissions(course_id, &assignment.id)
                .await
                .map(|submissions| (assignment, submissions))
                .map_err(|e| {
                    GradeSyncError::fetch(
                        ResourceKind::Submissions {
                            assignment_id: assignment.id.clone(),
                        },
                        course_id,
                        e,
                    )
                })
        }))
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    let mut matrix = GradeMatrix::empty(roster);
    let mut skipped = 0;
    for (assignment, submissions) in &fetched {
        skipped += matrix.apply_submissions(&assignment.id, submissions);
    }

    tracing::debug!(
        course_id = %course_id,
        assignments = matrix.assignments.len(),
        students = matrix.students.len(),
        skipped,
        "grade matrix built"
    );

    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classroom::{CourseId, Student, SubmissionId};

    fn roster() -> Roster {
        let course: CourseId = "c1".into();
        let assignment = |id: &str| Assignment {
            id: id.into(),
            course_id: course.clone(),
            title: id.to_uppercase(),
            max_points: Some(10.0),
            associated_with_developer: true,
        };
        let student = |id: &str, name: &str| Student {
            id: id.into(),
            course_id: course.clone(),
            display_name: name.into(),
        };
        Roster::new(
            course.clone(),
            vec![assignment("a1"), assignment("a2")],
            vec![student("s1", "Sam Lee"), student("s2", "Sam Lee"), student("s3", "Ada")],
        )
    }

    fn submission(assignment: &str, student: &str, grade: Option<f64>) -> Submission {
        Submission {
            id: SubmissionId::new(format!("{assignment}-{student}")),
            course_id: "c1".into(),
            assignment_id: assignment.into(),
            student_id: student.into(),
            assigned_grade: grade,
        }
    }

    #[test]
    fn empty_matrix_has_roster_shape() {
        let matrix = GradeMatrix::empty(&roster());
        assert_eq!(matrix.dimensions(), (2, 3));
        assert_eq!(matrix.to_dense(), vec![vec![None; 3]; 2]);
    }

    #[test]
    fn dense_round_trip_keeps_positions() {
        let roster = roster();
        let rows = vec![vec![Some(1.0), None, Some(0.0)], vec![None, Some(7.5), None]];
        let matrix = GradeMatrix::from_dense(&roster, &rows).unwrap();
        assert_eq!(matrix.get(&"a1".into(), &"s3".into()), Some(0.0));
        assert_eq!(matrix.get(&"a2".into(), &"s2".into()), Some(7.5));
        assert_eq!(matrix.to_dense(), rows);
    }

    #[test]
    fn from_dense_rejects_wrong_shape() {
        let roster = roster();
        let err = GradeMatrix::from_dense(&roster, &[vec![None; 3]]).unwrap_err();
        assert!(matches!(err, GradeSyncError::MatrixShape { rows: 2, cols: 3, .. }));

        let err =
            GradeMatrix::from_dense(&roster, &[vec![None; 3], vec![None; 2]]).unwrap_err();
        assert!(err.to_string().contains("row 1 has 2 cells"));
    }

    #[test]
    fn same_name_students_keep_their_own_grades() {
        let mut matrix = GradeMatrix::empty(&roster());
        let skipped = matrix.apply_submissions(
            &"a1".into(),
            &[submission("a1", "s2", Some(9.0)), submission("a1", "s1", Some(4.0))],
        );
        assert_eq!(skipped, 0);
        assert_eq!(matrix.to_dense()[0], vec![Some(4.0), Some(9.0), None]);
    }

    #[test]
    fn unmatched_and_foreign_submissions_are_skipped() {
        let mut matrix = GradeMatrix::empty(&roster());
        let skipped = matrix.apply_submissions(
            &"a1".into(),
            &[
                submission("a1", "ghost", Some(3.0)),
                submission("a2", "s1", Some(5.0)),
                submission("a1", "s3", Some(6.0)),
            ],
        );
        assert_eq!(skipped, 2);
        assert_eq!(matrix.to_dense(), vec![vec![None, None, Some(6.0)], vec![None; 3]]);
    }

    #[test]
    fn cells_iterate_assignment_major() {
        let matrix = GradeMatrix::empty(&roster());
        let order: Vec<(usize, usize)> = matrix.cells().map(|c| (c.row, c.col)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
    }
}
