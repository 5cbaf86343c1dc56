use chrono::{DateTime, Utc};
use db::{
    models::{Course, CourseId, Role, User, UserId},
    Database, DbError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use warp::{
    http::StatusCode,
    reply::{Json, WithStatus},
};

use crate::error::CourseError;
use crate::uploads::UploadError;

#[derive(Serialize)]
pub struct FailureResponse {
    status: &'static str,
    code: ErrorCode,
}

impl FailureResponse {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            status: "error",
            code,
        }
    }

    /// Non-fatal outcome that is reported but changed nothing
    pub fn info(code: ErrorCode) -> Self {
        Self {
            status: "info",
            code,
        }
    }

    pub fn new_reply(code: ErrorCode, status: StatusCode) -> WithStatus<Json> {
        warp::reply::with_status(warp::reply::json(&Self::new(code)), status)
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidCredentials,
    NotAuthenticated,
    MalformedData,
    InvalidEmail,
    PasswordTooSimple,
    MissingName,
    UserAlreadyExists,
    MissingTitle,
    CourseNotFound,
    Forbidden,
    NotAuthorized,
    AlreadyEnrolled,
    SelfEnrollmentDenied,
    NotEnrolled,
    UnexpectedField,
    TooManyFiles,
    FileTooLarge,
    NotFound,
    MethodNotAllowed,
    InternalServerError,
}

#[derive(Serialize)]
pub struct SimpleSuccessResponse {
    status: &'static str,
}

impl SimpleSuccessResponse {
    pub fn new() -> Self {
        Self { status: "success" }
    }
}

pub fn success<T: Serialize>(body: &T) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(body), StatusCode::OK)
}

pub fn course_failure(err: &CourseError) -> WithStatus<Json> {
    use CourseError::*;

    let (code, status) = match err {
        NotFound => (ErrorCode::CourseNotFound, StatusCode::NOT_FOUND),
        Forbidden => (ErrorCode::Forbidden, StatusCode::FORBIDDEN),
        NotAuthorized => (ErrorCode::NotAuthorized, StatusCode::FORBIDDEN),
        AlreadyEnrolled => {
            return warp::reply::with_status(
                warp::reply::json(&FailureResponse::info(ErrorCode::AlreadyEnrolled)),
                StatusCode::OK,
            )
        }
        SelfEnrollmentDenied => (ErrorCode::SelfEnrollmentDenied, StatusCode::FORBIDDEN),
        NotEnrolled => (ErrorCode::NotEnrolled, StatusCode::FORBIDDEN),
        Storage(err) => return storage_failure(err),
    };

    FailureResponse::new_reply(code, status)
}

pub fn storage_failure(err: &DbError) -> WithStatus<Json> {
    log::error!("database failure: {}", err);
    FailureResponse::new_reply(ErrorCode::InternalServerError, StatusCode::INTERNAL_SERVER_ERROR)
}

pub fn upload_failure(err: &UploadError) -> WithStatus<Json> {
    log::warn!("rejected upload: {}", err);

    let code = match err {
        UploadError::Multipart(_) => ErrorCode::MalformedData,
        UploadError::UnexpectedField(_) => ErrorCode::UnexpectedField,
        UploadError::TooManyFiles(_) => ErrorCode::TooManyFiles,
        UploadError::TooLarge(_) => ErrorCode::FileTooLarge,
    };

    FailureResponse::new_reply(code, StatusCode::BAD_REQUEST)
}

pub fn io_failure(err: &std::io::Error) -> WithStatus<Json> {
    log::error!("could not write upload: {}", err);
    FailureResponse::new_reply(ErrorCode::InternalServerError, StatusCode::INTERNAL_SERVER_ERROR)
}

#[derive(Deserialize, Debug)]
pub struct PaginatedQueryableListRequest {
    pub query: Option<String>,
    pub page: Option<usize>,
}

impl PaginatedQueryableListRequest {
    /// Checks that the page number is valid, and if its not it returns 1
    pub fn normalized_page_number(&self) -> usize {
        self.page.filter(|v| *v >= 1).unwrap_or(1)
    }
}

#[derive(Serialize)]
pub struct UserResponse<'a> {
    pub id: UserId,
    pub name: &'a str,
    pub email: &'a str,
    pub role: Role,
}

impl<'a> From<&'a User> for UserResponse<'a> {
    fn from(user: &'a User) -> Self {
        Self {
            id: user.id,
            name: &user.name,
            email: &user.email,
            role: user.role,
        }
    }
}

#[derive(Serialize)]
pub struct CourseTeacher<'a> {
    pub id: UserId,
    /// `None` if the account no longer exists or is not a teacher
    pub name: Option<&'a str>,
}

#[derive(Serialize)]
pub struct CourseResponse<'a> {
    pub id: CourseId,
    pub name: &'a str,
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub teacher: CourseTeacher<'a>,
    pub students: &'a BTreeSet<UserId>,
    #[serde(rename = "studentsCount")]
    pub students_count: usize,
    pub thumbnail: Option<&'a str>,
    pub videos: &'a [String],
    pub materials: &'a [String],
    pub notes: &'a [String],
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> CourseResponse<'a> {
    pub fn new<D: Database>(db: &'a D, course: &'a Course) -> Self {
        Self {
            id: course.id,
            name: &course.name,
            title: course.title.as_deref(),
            description: course.description.as_deref(),
            teacher: CourseTeacher {
                id: course.teacher,
                name: db
                    .user_get_teacher_by_id(course.teacher)
                    .map(|u| u.name.as_str()),
            },
            students: &course.students,
            students_count: course.students_count(),
            thumbnail: course.thumbnail.as_deref(),
            videos: &course.videos,
            materials: &course.materials,
            notes: &course.notes,
            created_at: course.created_at,
            updated_at: course.updated_at,
        }
    }

    pub fn from_list<D: Database>(db: &'a D, courses: Vec<&'a Course>) -> Vec<Self> {
        courses
            .into_iter()
            .map(|course| Self::new(db, course))
            .collect()
    }
}
