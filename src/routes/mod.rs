use std::convert::Infallible;
use warp::{http::StatusCode, Filter, Rejection, Reply};

use crate::uploads::Uploads;
use db::Db;
use filters::{Forbidden, Unauthorized};

mod auth;
mod course;
mod globals;
mod home;
mod profile;
#[cfg(test)]
mod tests;

pub use globals::{ErrorCode, FailureResponse};

pub fn routes(
    db: &Db,
    uploads: &Uploads,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let files_route = warp::path("uploads").and(warp::fs::dir(uploads.root().to_path_buf()));

    auth::routes(db)
        .or(home::routes(db))
        .or(profile::routes(db))
        .or(course::routes(db, uploads))
        .or(files_route)
}

/// Every route, with rejections turned into JSON failures.
pub fn api(
    db: &Db,
    uploads: &Uploads,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    routes(db, uploads).recover(handle_rejection)
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let error_code;
    let status_code;

    if err.is_not_found() {
        error_code = ErrorCode::NotFound;
        status_code = StatusCode::NOT_FOUND;
    } else if let Some(Forbidden) = err.find() {
        error_code = ErrorCode::InvalidCredentials;
        status_code = StatusCode::FORBIDDEN;
    } else if let Some(Unauthorized) = err.find() {
        error_code = ErrorCode::NotAuthenticated;
        status_code = StatusCode::UNAUTHORIZED;
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some()
        || err.find::<warp::reject::InvalidQuery>().is_some()
        || err.find::<warp::reject::UnsupportedMediaType>().is_some()
        || err.find::<warp::reject::MissingHeader>().is_some()
        || err.find::<warp::reject::InvalidHeader>().is_some()
    {
        error_code = ErrorCode::MalformedData;
        status_code = StatusCode::BAD_REQUEST;
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        error_code = ErrorCode::FileTooLarge;
        status_code = StatusCode::PAYLOAD_TOO_LARGE;
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        error_code = ErrorCode::MethodNotAllowed;
        status_code = StatusCode::METHOD_NOT_ALLOWED;
    } else {
        log::error!("unhandled rejection: {:?}", err);
        error_code = ErrorCode::InternalServerError;
        status_code = StatusCode::INTERNAL_SERVER_ERROR;
    }

    Ok(FailureResponse::new_reply(error_code, status_code))
}
