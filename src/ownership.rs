use db::models::{Course, Role, User};
use std::fmt;

use crate::error::CourseError;

/// Structural changes to an existing course.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CourseAction {
    /// Fetching a course to fill the edit form
    EditForm,
    Edit,
    Upload,
    Delete,
}

impl fmt::Display for CourseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EditForm => "open the edit form of",
            Self::Edit => "edit",
            Self::Upload => "upload material to",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Only the owning teacher may change a course; students never may.
pub fn authorize_mutation(
    course: &Course,
    acting_user: &User,
    action: CourseAction,
) -> Result<(), CourseError> {
    match acting_user.role {
        Role::Teacher if course.is_owned_by(acting_user.id) => Ok(()),
        Role::Teacher => {
            log::warn!(
                "teacher {} tried to {} course {} owned by {}",
                acting_user.id,
                action,
                course.id,
                course.teacher
            );
            Err(CourseError::NotAuthorized)
        }
        Role::Student => {
            log::warn!(
                "student {} tried to {} course {}",
                acting_user.id,
                action,
                course.id
            );
            Err(CourseError::Forbidden)
        }
    }
}

/// Any teacher may create a course, which they then own.
pub fn authorize_create(acting_user: &User) -> Result<(), CourseError> {
    match acting_user.role {
        Role::Teacher => Ok(()),
        Role::Student => Err(CourseError::Forbidden),
    }
}
