//! Session-token authentication for the API.
//!
//! Tokens are issued outside the request path (by the login flow, or the
//! `issue-session` command) and checked on every request by [`RequireUser`].

pub mod cleanup;
pub mod middleware;
pub mod session;

pub use middleware::{MaybeUser, RequireUser};
pub use session::{generate_session_token, issue_session, SessionDuration};
