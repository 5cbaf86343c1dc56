use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(pub u32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    /// Salted hash, see [`crate::password`]
    pub password: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Owning teacher, never changes after creation
    pub teacher: UserId,
    pub students: BTreeSet<UserId>,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub notes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    pub fn students_count(&self) -> usize {
        self.students.len()
    }

    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.teacher == user
    }

    pub fn has_student(&self, user: UserId) -> bool {
        self.students.contains(&user)
    }

    /// Sets both the title and the name, which always mirror each other.
    pub fn set_title(&mut self, title: String) {
        self.name = title.clone();
        self.title = Some(title);
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
