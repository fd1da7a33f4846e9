//! Core types for the classroom client.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Remote course identifier.
    CourseId
);
string_id!(
    /// Remote course work (assignment) identifier.
    AssignmentId
);
string_id!(
    /// Remote user identifier of an enrolled student.
    StudentId
);
string_id!(
    /// Remote student submission identifier.
    SubmissionId
);
string_id!(
    /// Stable identifier of the signed-in teacher, used to look up credentials.
    UserId
);

// =============================================================================
// RECORDS
// =============================================================================

/// A course the signed-in teacher can grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
}

/// Profile of the signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub full_name: String,
}

/// A piece of course work as listed by the remote service.
///
/// `associated_with_developer` is true only for course work created through
/// this application's credentials; the remote refuses grade patches on
/// anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub course_id: CourseId,
    pub title: String,
    /// Missing on ungraded course work.
    pub max_points: Option<f64>,
    pub associated_with_developer: bool,
}

impl Assignment {
    /// Whether this course work can appear in the grade matrix.
    pub fn is_gradable(&self) -> bool {
        self.associated_with_developer && self.max_points.is_some_and(|p| p > 0.0)
    }
}

/// A student enrolled in a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub course_id: CourseId,
    pub display_name: String,
}

/// A student's submission for one assignment, as known at fetch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub course_id: CourseId,
    pub assignment_id: AssignmentId,
    pub student_id: StudentId,
    pub assigned_grade: Option<f64>,
}

// =============================================================================
// PAGING / PATCH
// =============================================================================

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_page_token: Option<String>) -> Self {
        Self {
            items,
            next_page_token,
        }
    }

    /// A page with no continuation.
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }

    /// Continuation token, treating an empty token as the end of the listing.
    pub fn next_token(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Field-masked grade update. Only these two fields are ever written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradePatch {
    pub assigned_grade: Option<f64>,
    pub draft_grade: Option<f64>,
}

impl GradePatch {
    /// Assigned and draft grade both set to `grade`.
    pub fn both(grade: Option<f64>) -> Self {
        Self {
            assigned_grade: grade,
            draft_grade: grade,
        }
    }

    /// Remote field names touched by this patch, in update-mask form.
    pub fn update_mask(&self) -> &'static str {
        "assignedGrade,draftGrade"
    }
}
