use serde::Serialize;
use warp::{Filter, Rejection, Reply};

use super::globals::{success, CourseResponse, UserResponse};
use db::{
    models::{Course, Role, User},
    Database, Db,
};
use filters::{authed, with_db};

pub fn routes(db: &Db) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let profile_route = warp::path!("api" / "profile")
        .and(warp::get())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and_then(profile)
        .boxed();

    let my_courses_route = warp::path!("api" / "my-courses")
        .and(warp::get())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and_then(my_courses)
        .boxed();

    profile_route.or(my_courses_route)
}

#[derive(Serialize)]
struct MyCoursesResponse<'a> {
    status: &'static str,
    enrolled_courses: Vec<CourseResponse<'a>>,
    teaching_courses: Vec<CourseResponse<'a>>,
}

#[derive(Serialize)]
struct ProfileResponse<'a> {
    status: &'static str,
    user: UserResponse<'a>,
    enrolled_courses: Vec<CourseResponse<'a>>,
    teaching_courses: Vec<CourseResponse<'a>>,
}

/// Courses the user takes, then courses the user teaches; only one of them is ever filled.
fn course_lists<'a, D: Database>(db: &'a D, user: &User) -> (Vec<&'a Course>, Vec<&'a Course>) {
    match user.role {
        Role::Student => (db.course_enrolled_by(user.id), Vec::new()),
        Role::Teacher => (Vec::new(), db.course_taught_by(user.id)),
    }
}

async fn profile(user: User, db: Db) -> Result<impl warp::Reply, warp::Rejection> {
    let db = db.lock().await;
    let db = &*db;
    let (enrolled, teaching) = course_lists(db, &user);

    Ok(success(&ProfileResponse {
        status: "success",
        user: UserResponse::from(&user),
        enrolled_courses: CourseResponse::from_list(db, enrolled),
        teaching_courses: CourseResponse::from_list(db, teaching),
    }))
}

async fn my_courses(user: User, db: Db) -> Result<impl warp::Reply, warp::Rejection> {
    let db = db.lock().await;
    let db = &*db;
    let (enrolled, teaching) = course_lists(db, &user);

    Ok(success(&MyCoursesResponse {
        status: "success",
        enrolled_courses: CourseResponse::from_list(db, enrolled),
        teaching_courses: CourseResponse::from_list(db, teaching),
    }))
}
