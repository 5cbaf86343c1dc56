//! Students joining and leaving course rosters.
//!
//! Each call reads the course, computes the new roster and writes it back. There is no locking
//! beyond the store's own: two concurrent writers on the same course are last-write-wins.

use db::{
    models::{Course, CourseId, Role, User},
    Database,
};

use crate::error::CourseError;

/// Adds the acting student to the course roster.
pub fn enroll<D: Database>(
    db: &mut D,
    course_id: CourseId,
    acting_user: &User,
) -> Result<(), CourseError> {
    let mut course = db.course_get(course_id).ok_or(CourseError::NotFound)?.clone();

    // Ownership and role are independent attributes, check both
    if course.is_owned_by(acting_user.id) {
        log::warn!(
            "user {} tried to enroll in their own course {}",
            acting_user.id,
            course.id
        );
        return Err(CourseError::SelfEnrollmentDenied);
    }

    match acting_user.role {
        Role::Student => {}
        Role::Teacher => return Err(CourseError::Forbidden),
    }

    if !course.students.insert(acting_user.id) {
        return Err(CourseError::AlreadyEnrolled);
    }

    course.touch();
    db.course_save(course)?;

    log::info!("user {} enrolled in course {}", acting_user.id, course_id);
    Ok(())
}

/// Removes the acting user from the course roster. Leaving a course one is not part of succeeds
/// without writing anything.
pub fn unenroll<D: Database>(
    db: &mut D,
    course_id: CourseId,
    acting_user: &User,
) -> Result<(), CourseError> {
    let mut course = db.course_get(course_id).ok_or(CourseError::NotFound)?.clone();

    if course.students.remove(&acting_user.id) {
        course.touch();
        db.course_save(course)?;
        log::info!("user {} left course {}", acting_user.id, course_id);
    }

    Ok(())
}

/// How the viewer relates to a course they are looking at.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CourseAccess {
    pub is_teacher: bool,
    pub is_enrolled: bool,
}

/// Decides whether `viewer` may open the detail page of `course`. Anonymous visitors and teachers
/// may look at any course; a student only at the ones they are enrolled in.
pub fn course_access(course: &Course, viewer: Option<&User>) -> Result<CourseAccess, CourseError> {
    let viewer = match viewer {
        Some(viewer) => viewer,
        None => return Ok(CourseAccess::default()),
    };

    let access = CourseAccess {
        is_teacher: course.is_owned_by(viewer.id),
        is_enrolled: course.has_student(viewer.id),
    };

    match viewer.role {
        Role::Student if !access.is_teacher && !access.is_enrolled => Err(CourseError::NotEnrolled),
        Role::Student | Role::Teacher => Ok(access),
    }
}
