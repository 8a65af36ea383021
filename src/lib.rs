pub mod app;
pub mod auth;
pub mod filters;
pub mod models;
pub mod pagination;
pub mod representation;
pub mod routes;
pub mod schema;
pub mod seed;
pub mod store;
pub mod validation;
