//! Infrastructure layer: stores, the prediction client, configuration, and the
//! lifecycle/import orchestration built on top of them.

pub mod config;
pub mod external;
pub mod import;
pub mod lifecycle;
pub mod store;
