pub mod auth;
pub mod authz;
pub mod error;
pub mod history;
pub mod middleware;
pub mod posts;
