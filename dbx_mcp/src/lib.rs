pub mod args;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod providers;
pub mod registry;
