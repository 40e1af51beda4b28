//! HTTP API: router, handlers, and request/response mapping over the lifecycle engine.

pub mod app;
