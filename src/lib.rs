pub mod app;
pub mod cli;
pub mod config;
pub mod index;
pub mod journaling;
pub mod model;
pub mod reconcile;
pub mod schedule;
pub mod storage;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
