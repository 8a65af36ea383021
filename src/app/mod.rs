//! Service plumbing shared by the binaries: configuration, database pool,
//! error envelope, authentication middleware and API docs.

pub mod app_error;
pub mod app_state;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod extract;
pub mod middleware;
pub mod swagger;
