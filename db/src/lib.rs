use chrono::Duration;
use std::{path::PathBuf, sync::Arc};
use thiserror::Error;
use tokio::sync::Mutex;

mod json;
pub mod models;
pub mod password;

pub use json::JSONDatabase;
use models::{Course, CourseId, Role, User, UserId};

pub const PAGE_SIZE: usize = 10;

/// Login tokens older than this are refused
pub const DEFAULT_SESSION_TTL_DAYS: i64 = 14;

pub type Db = Arc<Mutex<JSONDatabase>>;

/// Opens the database stored in `filename`, starting empty if the file does not exist yet.
pub fn new_db(filename: impl Into<PathBuf>, session_ttl: Duration) -> Result<Db, DbError> {
    let db = JSONDatabase::open(filename)?.with_session_ttl(session_ttl);
    Ok(Arc::new(Mutex::new(db)))
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("could not access the database file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not (de)serialize the database: {0}")]
    Json(#[from] serde_json::Error),
    #[error("a user with this email already exists")]
    EmailTaken,
    #[error("could not hash the password: {0}")]
    Hash(argon2::password_hash::Error),
}

/// Store operations the routes and the authorities are written against.
pub trait Database {
    fn dump_as_json(&self) -> Result<String, serde_json::Error>;

    fn auth_login(&mut self, email: &str, password: &str)
        -> Result<Option<(&User, String)>, DbError>;
    fn auth_logout(&mut self, token: &str) -> Result<bool, DbError>;
    fn auth_get_user(&self, token: &str) -> Option<&User>;

    fn user_add(&mut self, user: NewUser) -> Result<UserId, DbError>;
    fn user_get(&self, email: &str) -> Option<&User>;
    fn user_get_by_id(&self, id: UserId) -> Option<&User>;
    fn user_count(&self, filter: impl Fn(&User) -> bool) -> usize;

    fn course_add(&mut self, course: NewCourse) -> Result<CourseId, DbError>;
    fn course_get(&self, id: CourseId) -> Option<&Course>;
    fn course_all(&self) -> Vec<&Course>;
    fn course_find(&self, filter: impl Fn(&Course) -> bool) -> Vec<&Course>;
    fn course_list(&self, page: usize, query: Option<&str>) -> (usize, Vec<&Course>);
    fn course_save(&mut self, course: Course) -> Result<(), DbError>;
    fn course_remove(&mut self, id: CourseId) -> Result<bool, DbError>;

    fn user_get_teacher_by_id(&self, id: UserId) -> Option<&User> {
        let user = self.user_get_by_id(id)?;

        match user.role {
            Role::Teacher => Some(user),
            Role::Student => None,
        }
    }

    /// Courses the user is enrolled in.
    fn course_enrolled_by(&self, student: UserId) -> Vec<&Course> {
        self.course_find(|c| c.has_student(student))
    }

    /// Courses the user teaches.
    fn course_taught_by(&self, teacher: UserId) -> Vec<&Course> {
        self.course_find(|c| c.is_owned_by(teacher))
    }
}

pub struct NewUser {
    pub name: String,
    pub email: String,
    /// Plain text, hashed by the store
    pub password: String,
    pub role: Role,
}

pub struct NewCourse {
    pub title: String,
    pub description: Option<String>,
    pub teacher: UserId,
    pub thumbnail: Option<String>,
    pub materials: Vec<String>,
}
