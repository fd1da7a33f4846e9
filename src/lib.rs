#![forbid(unsafe_code)]

//! # classroom-grader
//!
//! Bulk grade editing for one course of a remote classroom service.
//!
//! The roster (gradable assignments, enrolled students) and every
//! assignment's submissions are pulled from the paginated remote API and laid
//! out as a dense grade matrix for a spreadsheet-style editor. On save, each
//! assignment's submissions are listed again and every matched cell is
//! patched (assigned and draft grade only). Write failures are reported per
//! cell instead of aborting the batch.

pub mod cancel;
pub mod classroom;
pub mod config;
pub mod credentials;
pub mod error;
pub mod matrix;
pub mod reconcile;
pub mod roster;
pub mod session;

pub use cancel::CancelFlag;
pub use classroom::{ClassroomApi, ClassroomClient, ClassroomError, HttpClassroom};
pub use config::GraderConfig;
pub use credentials::{Credential, CredentialProvider, EnvCredentials, StaticCredentials};
pub use error::{GradeSyncError, ResourceKind};
pub use matrix::{build_matrix, GradeMatrix};
pub use reconcile::{
    reconcile, reconcile_changes, CellOutcome, CellResult, ReconcileReport, SkipReason, WriteMode,
};
pub use roster::{assemble_roster, Roster};
pub use session::{CourseSelection, Grader, GradingView};
