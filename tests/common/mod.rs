#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use classroom_grader::classroom::{
    Assignment, AssignmentId, ClassroomApi, ClassroomClient, ClassroomError, Course, CourseId,
    GradePatch, Page, Student, StudentId, Submission, SubmissionId, UserId, UserProfile,
};
use classroom_grader::credentials::{Connector, Credential};
use classroom_grader::CancelFlag;

pub const COURSE: &str = "c1";

pub fn course() -> CourseId {
    CourseId::new(COURSE)
}

pub fn assignment(id: &str, max_points: Option<f64>, associated: bool) -> Assignment {
    Assignment {
        id: id.into(),
        course_id: course(),
        title: format!("Assignment {id}"),
        max_points,
        associated_with_developer: associated,
    }
}

pub fn gradable(id: &str) -> Assignment {
    assignment(id, Some(10.0), true)
}

pub fn student(id: &str, name: &str) -> Student {
    Student {
        id: id.into(),
        course_id: course(),
        display_name: name.into(),
    }
}

pub fn submission(assignment: &str, student: &str, grade: Option<f64>) -> Submission {
    Submission {
        id: SubmissionId::new(format!("sub-{assignment}-{student}")),
        course_id: course(),
        assignment_id: assignment.into(),
        student_id: student.into(),
        assigned_grade: grade,
    }
}

/// Failure injected into the fake.
#[derive(Debug, Clone, Copy)]
pub enum Fail {
    Remote(u16),
    Unauthorized,
}

impl Fail {
    fn error(self) -> ClassroomError {
        match self {
            Fail::Remote(status) => ClassroomError::remote(status, "injected"),
            Fail::Unauthorized => ClassroomError::unauthorized("injected"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchCall {
    pub assignment_id: AssignmentId,
    pub submission_id: SubmissionId,
    pub patch: GradePatch,
}

#[derive(Default)]
struct State {
    courses: Vec<Course>,
    assignments: Vec<Assignment>,
    students: Vec<Student>,
    submissions: Vec<Submission>,
    patches: Vec<PatchCall>,
    draft_grades: HashMap<SubmissionId, Option<f64>>,
    fail_assignments: Option<Fail>,
    fail_students: Option<Fail>,
    fail_list_submissions: HashMap<AssignmentId, Fail>,
    fail_patch: HashMap<SubmissionId, Fail>,
}

/// In-memory classroom service with deterministic paging.
pub struct FakeClassroom {
    state: Mutex<State>,
    page_size: usize,
    calls: AtomicUsize,
    list_submission_calls: AtomicUsize,
}

impl Default for FakeClassroom {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeClassroom {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                courses: vec![Course {
                    id: course(),
                    name: "Biology 101".into(),
                }],
                ..State::default()
            }),
            page_size: 2,
            calls: AtomicUsize::new(0),
            list_submission_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_assignments(self, assignments: Vec<Assignment>) -> Self {
        self.state.lock().unwrap().assignments = assignments;
        self
    }

    pub fn with_students(self, students: Vec<Student>) -> Self {
        self.state.lock().unwrap().students = students;
        self
    }

    pub fn with_submissions(self, submissions: Vec<Submission>) -> Self {
        self.state.lock().unwrap().submissions = submissions;
        self
    }

    pub fn fail_assignments(&self, fail: Fail) {
        self.state.lock().unwrap().fail_assignments = Some(fail);
    }

    pub fn fail_students(&self, fail: Fail) {
        self.state.lock().unwrap().fail_students = Some(fail);
    }

    pub fn fail_list_submissions(&self, assignment: &str, fail: Fail) {
        self.state
            .lock()
            .unwrap()
            .fail_list_submissions
            .insert(assignment.into(), fail);
    }

    pub fn fail_patch(&self, submission_id: &str, fail: Fail) {
        self.state
            .lock()
            .unwrap()
            .fail_patch
            .insert(submission_id.into(), fail);
    }

    /// Replace the live submissions, as if the remote changed mid-edit.
    pub fn set_submissions(&self, submissions: Vec<Submission>) {
        self.state.lock().unwrap().submissions = submissions;
    }

    pub fn patches(&self) -> Vec<PatchCall> {
        self.state.lock().unwrap().patches.clone()
    }

    pub fn clear_patches(&self) {
        self.state.lock().unwrap().patches.clear();
    }

    pub fn grade_of(&self, submission_id: &str) -> Option<f64> {
        self.state
            .lock()
            .unwrap()
            .submissions
            .iter()
            .find(|s| s.id.as_str() == submission_id)
            .and_then(|s| s.assigned_grade)
    }

    pub fn draft_grade_of(&self, submission_id: &str) -> Option<f64> {
        self.state
            .lock()
            .unwrap()
            .draft_grades
            .get(&SubmissionId::new(submission_id))
            .copied()
            .flatten()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn list_submission_calls(&self) -> usize {
        self.list_submission_calls.load(Ordering::SeqCst)
    }

    fn page<T: Clone>(&self, items: &[T], token: Option<&str>) -> Page<T> {
        let start: usize = token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (start + self.page_size).min(items.len());
        let next = (end < items.len()).then(|| end.to_string());
        Page::new(items[start.min(end)..end].to_vec(), next)
    }
}

#[async_trait]
impl ClassroomApi for FakeClassroom {
    async fn list_assignments(
        &self,
        _course_id: &CourseId,
        page_token: Option<&str>,
    ) -> Result<Page<Assignment>, ClassroomError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if let Some(fail) = state.fail_assignments {
            return Err(fail.error());
        }
        Ok(self.page(&state.assignments, page_token))
    }

    async fn list_students(
        &self,
        _course_id: &CourseId,
        page_token: Option<&str>,
    ) -> Result<Page<Student>, ClassroomError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if let Some(fail) = state.fail_students {
            return Err(fail.error());
        }
        Ok(self.page(&state.students, page_token))
    }

    async fn list_submissions(
        &self,
        _course_id: &CourseId,
        assignment_id: &AssignmentId,
        page_token: Option<&str>,
    ) -> Result<Page<Submission>, ClassroomError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if page_token.is_none() {
            self.list_submission_calls.fetch_add(1, Ordering::SeqCst);
        }
        let state = self.state.lock().unwrap();
        if let Some(fail) = state.fail_list_submissions.get(assignment_id) {
            return Err(fail.error());
        }
        let matching: Vec<Submission> = state
            .submissions
            .iter()
            .filter(|s| &s.assignment_id == assignment_id)
            .cloned()
            .collect();
        Ok(self.page(&matching, page_token))
    }

    async fn patch_submission(
        &self,
        _course_id: &CourseId,
        assignment_id: &AssignmentId,
        submission_id: &SubmissionId,
        patch: GradePatch,
    ) -> Result<(), ClassroomError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if let Some(fail) = state.fail_patch.get(submission_id) {
            return Err(fail.error());
        }
        let Some(live) = state
            .submissions
            .iter_mut()
            .find(|s| &s.id == submission_id && &s.assignment_id == assignment_id)
        else {
            return Err(ClassroomError::not_found("no such submission"));
        };
        live.assigned_grade = patch.assigned_grade;
        state
            .draft_grades
            .insert(submission_id.clone(), patch.draft_grade);
        state.patches.push(PatchCall {
            assignment_id: assignment_id.clone(),
            submission_id: submission_id.clone(),
            patch,
        });
        Ok(())
    }

    async fn get_course(&self, course_id: &CourseId) -> Result<Course, ClassroomError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        state
            .courses
            .iter()
            .find(|c| &c.id == course_id)
            .cloned()
            .ok_or_else(|| ClassroomError::not_found("no such course"))
    }

    async fn list_courses(&self, page_token: Option<&str>) -> Result<Page<Course>, ClassroomError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        Ok(self.page(&state.courses, page_token))
    }

    async fn get_profile(&self) -> Result<UserProfile, ClassroomError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(UserProfile {
            id: UserId::new("teacher-1"),
            full_name: "Pat Teacher".into(),
        })
    }
}

/// Wraps a [`FakeClassroom`]: submission listings sleep for a per-assignment
/// delay, overlapping listings are counted, and a cancel flag can be raised
/// once a number of patches have landed.
pub struct Instrumented {
    inner: Arc<FakeClassroom>,
    listing_delays: HashMap<AssignmentId, Duration>,
    cancel_after: Option<(usize, CancelFlag)>,
    listings_in_flight: AtomicUsize,
    peak_listings: AtomicUsize,
    patches_done: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Instrumented {
    pub fn new(inner: Arc<FakeClassroom>) -> Self {
        Self {
            inner,
            listing_delays: HashMap::new(),
            cancel_after: None,
            listings_in_flight: AtomicUsize::new(0),
            peak_listings: AtomicUsize::new(0),
            patches_done: AtomicUsize::new(0),
        }
    }

    pub fn with_listing_delay(mut self, assignment: &str, delay: Duration) -> Self {
        self.listing_delays.insert(AssignmentId::new(assignment), delay);
        self
    }

    pub fn cancel_after_patches(mut self, patches: usize, flag: CancelFlag) -> Self {
        self.cancel_after = Some((patches, flag));
        self
    }

    /// Most submission listings that were pending at the same time.
    pub fn peak_listings(&self) -> usize {
        self.peak_listings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClassroomApi for Instrumented {
    async fn list_assignments(
        &self,
        course_id: &CourseId,
        page_token: Option<&str>,
    ) -> Result<Page<Assignment>, ClassroomError> {
        self.inner.list_assignments(course_id, page_token).await
    }

    async fn list_students(
        &self,
        course_id: &CourseId,
        page_token: Option<&str>,
    ) -> Result<Page<Student>, ClassroomError> {
        self.inner.list_students(course_id, page_token).await
    }

    async fn list_submissions(
        &self,
        course_id: &CourseId,
        assignment_id: &AssignmentId,
        page_token: Option<&str>,
    ) -> Result<Page<Submission>, ClassroomError> {
        let now = self.listings_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight(&self.listings_in_flight);
        self.peak_listings.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.listing_delays.get(assignment_id) {
            tokio::time::sleep(*delay).await;
        }
        self.inner
            .list_submissions(course_id, assignment_id, page_token)
            .await
    }

    async fn patch_submission(
        &self,
        course_id: &CourseId,
        assignment_id: &AssignmentId,
        submission_id: &SubmissionId,
        patch: GradePatch,
    ) -> Result<(), ClassroomError> {
        self.inner
            .patch_submission(course_id, assignment_id, submission_id, patch)
            .await?;
        let done = self.patches_done.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, flag)) = &self.cancel_after {
            if done >= *after {
                flag.cancel();
            }
        }
        Ok(())
    }

    async fn get_course(&self, course_id: &CourseId) -> Result<Course, ClassroomError> {
        self.inner.get_course(course_id).await
    }

    async fn list_courses(&self, page_token: Option<&str>) -> Result<Page<Course>, ClassroomError> {
        self.inner.list_courses(page_token).await
    }

    async fn get_profile(&self) -> Result<UserProfile, ClassroomError> {
        self.inner.get_profile().await
    }
}

pub fn client(fake: &Arc<FakeClassroom>) -> ClassroomClient {
    ClassroomClient::new(fake.clone())
}

/// Hands out the same fake for any credential and remembers which tokens it saw.
pub struct FakeConnector {
    pub fake: Arc<FakeClassroom>,
    pub seen: Mutex<HashSet<String>>,
}

impl FakeConnector {
    pub fn new(fake: Arc<FakeClassroom>) -> Self {
        Self {
            fake,
            seen: Mutex::new(HashSet::new()),
        }
    }
}

impl Connector for FakeConnector {
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn ClassroomApi>, ClassroomError> {
        self.seen
            .lock()
            .unwrap()
            .insert(credential.access_token().to_string());
        Ok(self.fake.clone())
    }
}

pub fn student_ids(ids: &[&str]) -> Vec<StudentId> {
    ids.iter().map(|id| StudentId::new(*id)).collect()
}
