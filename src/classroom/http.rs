//! HTTP adapter for the Classroom REST API (v1 resource layout).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::{ClassroomError, ErrorContext};
use super::types::*;
use super::ClassroomApi;
use crate::credentials::Credential;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://classroom.googleapis.com";

/// Maximum allowed response body (8MB). Listings are paged well below this.
const MAX_RESPONSE_LEN: usize = 8 * 1_024 * 1_024;

/// Classroom API adapter bound to one user's credential.
#[derive(Debug, Clone)]
pub struct HttpClassroom {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpClassroom {
    /// Create with the default API root and a 60s timeout.
    pub fn new(credential: &Credential) -> Result<Self, ClassroomError> {
        Self::with_config(credential, DEFAULT_BASE_URL, Duration::from_secs(60))
    }

    /// Create with custom configuration.
    pub fn with_config(
        credential: &Credential,
        base_url: impl AsRef<str>,
        timeout: Duration,
    ) -> Result<Self, ClassroomError> {
        let base_url = Url::parse(base_url.as_ref())
            .map_err(|e| ClassroomError::config(format!("invalid base url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClassroomError::config("base url cannot carry a path"));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut auth_value =
            HeaderValue::from_str(&format!("Bearer {}", credential.access_token()))
                .map_err(|_| ClassroomError::config("Invalid access token format"))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| ClassroomError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ClassroomError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClassroomError::config("base url cannot carry a path"))?
            .pop_if_empty()
            .push("v1")
            .extend(segments);
        Ok(url)
    }

    /// Extract request ID from response headers.
    fn extract_request_id(headers: &HeaderMap) -> Option<String> {
        headers
            .get("x-request-id")
            .or_else(|| headers.get("x-goog-request-id"))
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClassroomError> {
        let mut response = request.send().await?;

        let status = response.status();
        let request_id = Self::extract_request_id(response.headers());

        // Stream response to enforce size limit
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let new_len = bytes.len() + chunk.len();
            if new_len > MAX_RESPONSE_LEN {
                return Err(ClassroomError::InvalidResponse(format!(
                    "Response too large: {new_len} bytes"
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        if !status.is_success() {
            let ctx = ErrorContext::new().with_status(status.as_u16());
            let ctx = match &request_id {
                Some(id) => ctx.with_request_id(id),
                None => ctx,
            };
            let (message, code) = parse_error_body(&bytes);
            let ctx = match code {
                Some(code) => ctx.with_code(code),
                None => ctx,
            };
            let message = message.unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(ClassroomError::from_status(status.as_u16(), message, ctx));
        }

        if bytes.is_empty() {
            return serde_json::from_str("{}")
                .map_err(|e| ClassroomError::InvalidResponse(format!("Empty body: {e}")));
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| ClassroomError::InvalidResponse(format!("Invalid JSON: {e}")))
    }

    fn get(&self, url: Url, page_token: Option<&str>) -> reqwest::RequestBuilder {
        let req = self.client.request(Method::GET, url);
        match page_token {
            Some(token) => req.query(&[("pageToken", token)]),
            None => req,
        }
    }
}

/// Pull a human message and a machine code out of either error shape the
/// remote produces: `{"error": {"message", "status"}}` for API errors and
/// `{"error": "invalid_grant", "error_description"}` for token errors.
fn parse_error_body(bytes: &[u8]) -> (Option<String>, Option<String>) {
    let Ok(parsed) = serde_json::from_slice::<ApiErrorEnvelope>(bytes) else {
        return (None, None);
    };
    match parsed.error {
        Some(ApiErrorField::Detailed(detail)) => (detail.message, detail.status),
        Some(ApiErrorField::Code(code)) => (parsed.error_description, Some(code)),
        None => (parsed.error_description, None),
    }
}

// =============================================================================
// API TYPES
// =============================================================================

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: Option<ApiErrorField>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ApiErrorField {
    Detailed(ApiErrorDetail),
    Code(String),
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
    status: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseWorkList {
    #[serde(default)]
    course_work: Vec<ApiCourseWork>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCourseWork {
    id: String,
    course_id: String,
    #[serde(default)]
    title: String,
    max_points: Option<f64>,
    #[serde(default)]
    associated_with_developer: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudentList {
    #[serde(default)]
    students: Vec<ApiStudent>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiStudent {
    course_id: String,
    user_id: String,
    profile: Option<ApiProfile>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiProfile {
    id: Option<String>,
    name: Option<ApiName>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiName {
    full_name: Option<String>,
}

impl ApiProfile {
    fn full_name(&self) -> String {
        self.name
            .as_ref()
            .and_then(|n| n.full_name.clone())
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionList {
    #[serde(default)]
    student_submissions: Vec<ApiSubmission>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSubmission {
    id: String,
    course_id: String,
    course_work_id: String,
    user_id: String,
    assigned_grade: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseList {
    #[serde(default)]
    courses: Vec<ApiCourse>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ApiCourse {
    id: String,
    #[serde(default)]
    name: String,
}

/// Patch body. Both fields are always present so a cleared grade is sent as
/// an explicit `null` under the update mask.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGradePatch {
    assigned_grade: Option<f64>,
    draft_grade: Option<f64>,
}

#[derive(Deserialize)]
struct Ignored {}

// =============================================================================
// CLASSROOM API IMPL
// =============================================================================

#[async_trait]
impl ClassroomApi for HttpClassroom {
    async fn list_assignments(
        &self,
        course_id: &CourseId,
        page_token: Option<&str>,
    ) -> Result<Page<Assignment>, ClassroomError> {
        let url = self.url(&["courses", course_id.as_str(), "courseWork"])?;
        let list: CourseWorkList = self.send(self.get(url, page_token)).await?;
        let items = list
            .course_work
            .into_iter()
            .map(|cw| Assignment {
                id: cw.id.into(),
                course_id: cw.course_id.into(),
                title: cw.title,
                max_points: cw.max_points,
                associated_with_developer: cw.associated_with_developer,
            })
            .collect();
        Ok(Page::new(items, list.next_page_token))
    }

    async fn list_students(
        &self,
        course_id: &CourseId,
        page_token: Option<&str>,
    ) -> Result<Page<Student>, ClassroomError> {
        let url = self.url(&["courses", course_id.as_str(), "students"])?;
        let list: StudentList = self.send(self.get(url, page_token)).await?;
        let items = list
            .students
            .into_iter()
            .map(|s| Student {
                display_name: s.profile.as_ref().map(ApiProfile::full_name).unwrap_or_default(),
                id: s.user_id.into(),
                course_id: s.course_id.into(),
            })
            .collect();
        Ok(Page::new(items, list.next_page_token))
    }

    async fn list_submissions(
        &self,
        course_id: &CourseId,
        assignment_id: &AssignmentId,
        page_token: Option<&str>,
    ) -> Result<Page<Submission>, ClassroomError> {
        let url = self.url(&[
            "courses",
            course_id.as_str(),
            "courseWork",
            assignment_id.as_str(),
            "studentSubmissions",
        ])?;
        let list: SubmissionList = self.send(self.get(url, page_token)).await?;
        let items = list
            .student_submissions
            .into_iter()
            .map(|s| Submission {
                id: s.id.into(),
                course_id: s.course_id.into(),
                assignment_id: s.course_work_id.into(),
                student_id: s.user_id.into(),
                assigned_grade: s.assigned_grade,
            })
            .collect();
        Ok(Page::new(items, list.next_page_token))
    }

    async fn patch_submission(
        &self,
        course_id: &CourseId,
        assignment_id: &AssignmentId,
        submission_id: &SubmissionId,
        patch: GradePatch,
    ) -> Result<(), ClassroomError> {
        let url = self.url(&[
            "courses",
            course_id.as_str(),
            "courseWork",
            assignment_id.as_str(),
            "studentSubmissions",
            submission_id.as_str(),
        ])?;
        let body = ApiGradePatch {
            assigned_grade: patch.assigned_grade,
            draft_grade: patch.draft_grade,
        };
        let request = self
            .client
            .request(Method::PATCH, url)
            .query(&[("updateMask", patch.update_mask())])
            .json(&body);
        let _: Ignored = self.send(request).await?;
        Ok(())
    }

    async fn get_course(&self, course_id: &CourseId) -> Result<Course, ClassroomError> {
        let url = self.url(&["courses", course_id.as_str()])?;
        let course: ApiCourse = self.send(self.get(url, None)).await?;
        Ok(Course {
            id: course.id.into(),
            name: course.name,
        })
    }

    async fn list_courses(&self, page_token: Option<&str>) -> Result<Page<Course>, ClassroomError> {
        let url = self.url(&["courses"])?;
        let request = self
            .get(url, page_token)
            .query(&[("teacherId", "me"), ("courseStates", "ACTIVE")]);
        let list: CourseList = self.send(request).await?;
        let items = list
            .courses
            .into_iter()
            .map(|c| Course {
                id: c.id.into(),
                name: c.name,
            })
            .collect();
        Ok(Page::new(items, list.next_page_token))
    }

    async fn get_profile(&self) -> Result<UserProfile, ClassroomError> {
        let url = self.url(&["userProfiles", "me"])?;
        let profile: ApiProfile = self.send(self.get(url, None)).await?;
        let full_name = profile.full_name();
        let id = profile
            .id
            .ok_or_else(|| ClassroomError::InvalidResponse("profile without id".into()))?;
        Ok(UserProfile {
            id: id.into(),
            full_name,
        })
    }
}
