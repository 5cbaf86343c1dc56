use db::{models::User, Database, Db};
use warp::{Filter, Rejection};

use crate::shared::with_db;

/// Filter that checks if the user is authenticated or not, and rejects the request if they aren't.
/// Extracts the acting user.
pub fn authed(db: &Db) -> impl Filter<Extract = (User,), Error = Rejection> + Clone {
    with_db(db.clone())
        .and(warp::header::optional::<String>("authorization"))
        .and_then(guard)
}

/// Same as [`authed`] but lets anonymous requests through; an unknown token counts as anonymous.
pub fn maybe_authed(db: &Db) -> impl Filter<Extract = (Option<User>,), Error = Rejection> + Clone {
    with_db(db.clone())
        .and(warp::header::optional::<String>("authorization"))
        .and_then(guard_optional)
}

/// Wrong email or password
#[derive(Debug)]
pub struct Forbidden;

impl warp::reject::Reject for Forbidden {}

/// Missing or unknown bearer token
#[derive(Debug)]
pub struct Unauthorized;

impl warp::reject::Reject for Unauthorized {}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(authorization: &str) -> Option<&str> {
    let mut parts = authorization.splitn(2, ' ');
    let auth_type = parts.next().unwrap_or("");
    let token = parts.next().unwrap_or("").trim();

    if auth_type.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

async fn lookup(db: Db, authorization: Option<String>) -> Option<User> {
    let authorization = authorization?;
    let token = bearer_token(&authorization)?;

    let db = db.lock().await;
    db.auth_get_user(token).cloned()
}

async fn guard(db: Db, authorization: Option<String>) -> Result<User, Rejection> {
    match lookup(db, authorization).await {
        Some(user) => Ok(user),
        None => Err(warp::reject::custom(Unauthorized)),
    }
}

async fn guard_optional(db: Db, authorization: Option<String>) -> Result<Option<User>, Rejection> {
    Ok(lookup(db, authorization).await)
}
