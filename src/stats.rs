use db::{
    models::{Course, Role},
    Database,
};
use serde::Serialize;
use std::cmp::Reverse;

/// Number of courses shown on the home page
pub const TOP_COURSES: usize = 3;

#[derive(Serialize, Debug, Default, PartialEq, Eq)]
pub struct HomeStats {
    /// Sum of every course's roster size: a student in two courses counts twice.
    pub students: usize,
    pub instructors: usize,
    pub courses: usize,
}

pub fn compute_home_stats<D: Database>(db: &D) -> HomeStats {
    let courses = db.course_all();

    HomeStats {
        students: courses.iter().map(|c| c.students_count()).sum(),
        instructors: db.user_count(|u| u.role == Role::Teacher),
        courses: courses.len(),
    }
}

/// The `n` courses with the most students, largest first. Equal rosters keep the order of the
/// input, which the store yields by id.
pub fn top_courses<'a>(courses: impl IntoIterator<Item = &'a Course>, n: usize) -> Vec<&'a Course> {
    let mut courses: Vec<&Course> = courses.into_iter().collect();
    courses.sort_by_key(|c| Reverse(c.students_count()));
    courses.truncate(n);
    courses
}
