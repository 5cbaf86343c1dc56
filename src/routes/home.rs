use serde::Serialize;
use warp::{Filter, Rejection, Reply};

use super::globals::{success, CourseResponse, UserResponse};
use crate::stats::{compute_home_stats, top_courses, HomeStats, TOP_COURSES};
use db::{models::User, Database, Db};
use filters::{maybe_authed, with_db};

pub fn routes(db: &Db) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let home_route = warp::path!("api" / "home")
        .and(warp::get())
        .and(maybe_authed(db))
        .and(with_db(db.clone()))
        .and_then(home)
        .boxed();

    let top_courses_route = warp::path!("api" / "top-courses")
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(top)
        .boxed();

    home_route.or(top_courses_route)
}

#[derive(Serialize)]
struct HomeResponse<'a> {
    status: &'static str,
    user: Option<UserResponse<'a>>,
    courses: Vec<CourseResponse<'a>>,
    stats: HomeStats,
}

#[derive(Serialize)]
struct TopCoursesResponse<'a> {
    status: &'static str,
    courses: Vec<CourseResponse<'a>>,
}

async fn home(user: Option<User>, db: Db) -> Result<impl warp::Reply, warp::Rejection> {
    let db = db.lock().await;
    let db = &*db;

    Ok(success(&HomeResponse {
        status: "success",
        user: user.as_ref().map(UserResponse::from),
        courses: CourseResponse::from_list(db, top_courses(db.course_all(), TOP_COURSES)),
        stats: compute_home_stats(db),
    }))
}

async fn top(db: Db) -> Result<impl warp::Reply, warp::Rejection> {
    let db = db.lock().await;
    let db = &*db;

    Ok(success(&TopCoursesResponse {
        status: "success",
        courses: CourseResponse::from_list(db, top_courses(db.course_all(), TOP_COURSES)),
    }))
}
