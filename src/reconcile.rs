//! Write-back of an edited grade matrix.
//!
//! Each assignment's submissions are listed fresh (editing may have taken any
//! amount of time), matched to the edited cells by student identity, and
//! patched one cell at a time. A failed patch is recorded against its cell
//! and the pass moves on. A failed listing, a rejected credential or
//! cancellation stops the pass; patches that already landed stay.

use std::collections::HashMap;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use uuid::Uuid;

use crate::classroom::{
    AssignmentId, ClassroomClient, ClassroomError, CourseId, StudentId, Submission, SubmissionId,
};
use crate::error::{GradeSyncError, ResourceKind};
use crate::matrix::GradeMatrix;

/// Which matched cells get a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Every cell with a live submission.
    #[default]
    All,
    /// Only cells whose edited grade differs from the live assigned grade.
    ChangedOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The remote has no submission for this student on this assignment.
    NoSubmission,
    /// Live grade already equals the edited grade.
    Unchanged,
}

/// A patch that failed for one cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialWriteFailure {
    pub code: &'static str,
    pub message: String,
}

impl PartialWriteFailure {
    fn from_error(err: &ClassroomError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CellOutcome {
    Updated,
    Skipped { reason: SkipReason },
    Failed { failure: PartialWriteFailure },
}

/// Outcome of one (assignment, student) cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellResult {
    pub row: usize,
    pub col: usize,
    pub assignment_id: AssignmentId,
    pub student_id: StudentId,
    pub submission_id: Option<SubmissionId>,
    pub grade: Option<f64>,
    #[serde(flatten)]
    pub outcome: CellOutcome,
}

/// Per-cell results of one reconciliation pass, in matrix order.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub pass_id: Uuid,
    pub course_id: CourseId,
    pub cells: Vec<CellResult>,
}

impl ReconcileReport {
    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, CellOutcome::Updated))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, CellOutcome::Skipped { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &CellResult> {
        self.cells
            .iter()
            .filter(|c| matches!(c.outcome, CellOutcome::Failed { .. }))
    }

    /// (row, col) of every failed cell, for a targeted re-attempt.
    pub fn failed_cells(&self) -> Vec<(usize, usize)> {
        self.failures().map(|c| (c.row, c.col)).collect()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&CellResult> {
        self.cells.iter().find(|c| c.row == row && c.col == col)
    }

    fn count(&self, pred: impl Fn(&CellOutcome) -> bool) -> usize {
        self.cells.iter().filter(|c| pred(&c.outcome)).count()
    }
}

/// Patch every edited cell that has a live submission, setting assigned and
/// draft grade to the edited value.
pub async fn reconcile(
    client: &ClassroomClient,
    course_id: &CourseId,
    edited: &GradeMatrix,
    concurrency: usize,
) -> Result<ReconcileReport, GradeSyncError> {
    reconcile_with(client, course_id, edited, concurrency, WriteMode::All).await
}

/// Like [`reconcile`], but leaves cells whose live grade already matches.
pub async fn reconcile_changes(
    client: &ClassroomClient,
    course_id: &CourseId,
    edited: &GradeMatrix,
    concurrency: usize,
) -> Result<ReconcileReport, GradeSyncError> {
    reconcile_with(client, course_id, edited, concurrency, WriteMode::ChangedOnly).await
}

pub async fn reconcile_with(
    client: &ClassroomClient,
    course_id: &CourseId,
    edited: &GradeMatrix,
    concurrency: usize,
    mode: WriteMode,
) -> Result<ReconcileReport, GradeSyncError> {
    let pass_id = Uuid::new_v4();
    let (rows, cols) = edited.dimensions();

    let per_assignment: Vec<Vec<CellResult>> = stream::iter(
        (0..rows).map(|row| reconcile_assignment(client, course_id, edited, row, mode)),
    )
    .buffered(concurrency.max(1))
    .try_collect()
    .await?;

    let report = ReconcileReport {
        pass_id,
        course_id: course_id.clone(),
        cells: per_assignment.into_iter().flatten().collect(),
    };

    tracing::info!(
        pass_id = %pass_id,
        course_id = %course_id,
        cells = rows * cols,
        updated = report.updated(),
        skipped = report.skipped(),
        failed = report.failed_cells().len(),
        "reconciliation pass finished"
    );

    Ok(report)
}

async fn reconcile_assignment(
    client: &ClassroomClient,
    course_id: &CourseId,
    edited: &GradeMatrix,
    row: usize,
    mode: WriteMode,
) -> Result<Vec<CellResult>, GradeSyncError> {
    let Some(assignment_id) = edited.assignment_ids().get(row) else {
        return Ok(Vec::new());
    };

    let submissions = client
        .list_submissions(course_id, assignment_id)
        .await
        .map_err(|err| {
            let kind = ResourceKind::Submissions {
                assignment_id: assignment_id.clone(),
            };
            GradeSyncError::fetch(kind, course_id, err)
        })?;

    let mut by_student: HashMap<&StudentId, &Submission> = HashMap::with_capacity(submissions.len());
    for submission in submissions.iter().filter(|s| &s.assignment_id == assignment_id) {
        by_student.entry(&submission.student_id).or_insert(submission);
    }

    let mut results = Vec::with_capacity(edited.dimensions().1);
    for cell in edited.row(row) {
        let mut result = CellResult {
            row,
            col: cell.col,
            assignment_id: assignment_id.clone(),
            student_id: cell.student_id.clone(),
            submission_id: None,
            grade: cell.grade,
            outcome: CellOutcome::Skipped {
                reason: SkipReason::NoSubmission,
            },
        };

        let Some(submission) = by_student.get(cell.student_id) else {
            results.push(result);
            continue;
        };
        result.submission_id = Some(submission.id.clone());

        if mode == WriteMode::ChangedOnly && submission.assigned_grade == cell.grade {
            result.outcome = CellOutcome::Skipped {
                reason: SkipReason::Unchanged,
            };
            results.push(result);
            continue;
        }

        result.outcome = match client.patch_submission_grade(submission, cell.grade).await {
            Ok(()) => CellOutcome::Updated,
            Err(err) if err.is_unauthorized() => {
                return Err(GradeSyncError::AuthorizationExpired { source: err });
            }
            Err(ClassroomError::Cancelled) => return Err(GradeSyncError::Cancelled),
            Err(err) => {
                tracing::warn!(
                    course_id = %course_id,
                    assignment_id = %assignment_id,
                    student_id = %cell.student_id,
                    submission_id = %submission.id,
                    error = %err,
                    "grade patch failed"
                );
                CellOutcome::Failed {
                    failure: PartialWriteFailure::from_error(&err),
                }
            }
        };
        results.push(result);
    }

    Ok(results)
}
