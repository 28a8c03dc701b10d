pub mod access;
pub mod auth;
pub mod comments;
pub mod error;
pub mod flash;
pub mod middleware;
pub mod password;
pub mod posts;
pub mod routes;
pub mod session;
