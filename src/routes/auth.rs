use serde::{Deserialize, Serialize};
use warp::{http::StatusCode, Filter, Rejection, Reply};

use super::globals::{
    storage_failure, success, ErrorCode, FailureResponse, SimpleSuccessResponse, UserResponse,
};
use db::{models::Role, Database, Db, DbError, NewUser};
use filters::{bearer_token, with_db, Forbidden, Unauthorized};

const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
    email: String,
    password: String,
    role: Role,
}

#[derive(Serialize)]
struct RegisterResponse {
    status: &'static str,
    id: db::models::UserId,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse<'a> {
    status: &'a str,
    token: &'a str,
    user: UserResponse<'a>,
}

pub fn routes(db: &Db) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let register_route = warp::path!("api" / "register")
        .and(warp::post())
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and(with_db(db.clone()))
        .and_then(register)
        .boxed();

    let post_session_route = warp::path!("api" / "session")
        .and(warp::post())
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and(with_db(db.clone()))
        .and_then(post_session)
        .boxed();

    let delete_session_route = warp::path!("api" / "session")
        .and(warp::delete())
        .and(warp::header::optional::<String>("authorization"))
        .and(with_db(db.clone()))
        .and_then(delete_session)
        .boxed();

    register_route
        .or(post_session_route)
        .or(delete_session_route)
}

async fn register(request: RegisterRequest, db: Db) -> Result<impl warp::Reply, warp::Rejection> {
    let name = request.name.trim();
    let email = request.email.trim();

    if name.is_empty() {
        return Ok(FailureResponse::new_reply(
            ErrorCode::MissingName,
            StatusCode::BAD_REQUEST,
        ));
    }

    if !is_plausible_email(email) {
        return Ok(FailureResponse::new_reply(
            ErrorCode::InvalidEmail,
            StatusCode::BAD_REQUEST,
        ));
    }

    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Ok(FailureResponse::new_reply(
            ErrorCode::PasswordTooSimple,
            StatusCode::BAD_REQUEST,
        ));
    }

    let mut db = db.lock().await;

    let new_user = NewUser {
        name: name.to_string(),
        email: email.to_string(),
        password: request.password,
        role: request.role,
    };

    match db.user_add(new_user) {
        Ok(id) => {
            log::info!("registered {} {} as user {}", request.role.as_str(), email, id);
            Ok(warp::reply::with_status(
                warp::reply::json(&RegisterResponse {
                    status: "success",
                    id,
                }),
                StatusCode::CREATED,
            ))
        }
        Err(DbError::EmailTaken) => Ok(FailureResponse::new_reply(
            ErrorCode::UserAlreadyExists,
            StatusCode::CONFLICT,
        )),
        Err(err) => Ok(storage_failure(&err)),
    }
}

fn is_plausible_email(email: &str) -> bool {
    let mut parts = email.splitn(2, '@');

    match (parts.next(), parts.next()) {
        (Some(local), Some(domain)) => {
            !local.is_empty() && domain.contains('.') && !email.contains(char::is_whitespace)
        }
        _ => false,
    }
}

async fn post_session(request: LoginRequest, db: Db) -> Result<impl warp::Reply, warp::Rejection> {
    let mut db = db.lock().await;

    match db.auth_login(&request.email, &request.password) {
        Ok(Some((user, token))) => Ok(success(&LoginResponse {
            status: "success",
            token: &token,
            user: UserResponse::from(user),
        })),
        Ok(None) => Err(warp::reject::custom(Forbidden)),
        Err(err) => Ok(storage_failure(&err)),
    }
}

async fn delete_session(
    authorization: Option<String>,
    db: Db,
) -> Result<impl warp::Reply, warp::Rejection> {
    let token = match authorization.as_deref().and_then(bearer_token) {
        Some(token) => token,
        None => return Err(warp::reject::custom(Unauthorized)),
    };

    let mut db = db.lock().await;

    match db.auth_logout(token) {
        Ok(true) => Ok(success(&SimpleSuccessResponse::new())),
        Ok(false) => Err(warp::reject::custom(Unauthorized)),
        Err(err) => Ok(storage_failure(&err)),
    }
}
