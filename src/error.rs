use db::DbError;
use thiserror::Error;

/// Why a course operation was refused. None of these are fatal to the process.
#[derive(Debug, Error)]
pub enum CourseError {
    #[error("course not found")]
    NotFound,
    #[error("this action is not allowed for your role")]
    Forbidden,
    #[error("only the owning teacher may modify this course")]
    NotAuthorized,
    #[error("you are already enrolled in this course")]
    AlreadyEnrolled,
    #[error("you cannot enroll in your own course")]
    SelfEnrollmentDenied,
    #[error("you are not enrolled in this course")]
    NotEnrolled,
    #[error(transparent)]
    Storage(#[from] DbError),
}
