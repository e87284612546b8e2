pub mod actors;
pub mod cli;
pub mod error;
pub mod github;
pub mod live_server;
pub mod models;
pub mod presenter;
pub mod status;
pub mod store;
pub mod subscriptions;
pub mod types;
