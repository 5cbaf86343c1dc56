use db::Db;
use std::convert::Infallible;
use warp::Filter;

/// Hands a clone of a shared handle to every request
pub fn with_shared<T>(value: T) -> impl Filter<Extract = (T,), Error = Infallible> + Clone
where
    T: Clone + Send + Sync + 'static,
{
    warp::any().map(move || value.clone())
}

pub fn with_db(db: Db) -> impl Filter<Extract = (Db,), Error = Infallible> + Clone {
    with_shared(db)
}
