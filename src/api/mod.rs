//! API module - HTTP routes, handlers, the panel socket, and models

pub mod handlers;
pub mod models;
pub mod panel;
pub mod routes;
