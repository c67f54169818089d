//! Integration tests: real HTTP clients against mock model servers, and the
//! HTTP surface driven through the router

#[path = "../support/mod.rs"]
mod support;
