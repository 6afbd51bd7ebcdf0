// Library for the binary and tests to access modules

pub mod actions;
pub mod api;
pub mod config;
pub mod logs;
pub mod metrics_history;
pub mod models;
pub mod monitor;
pub mod poller;
pub mod version;
