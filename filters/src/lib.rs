mod authed;
mod shared;

pub use authed::{authed, bearer_token, maybe_authed, Forbidden, Unauthorized};
pub use shared::{with_db, with_shared};
