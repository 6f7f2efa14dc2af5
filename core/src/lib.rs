pub mod db;
pub mod metrics;
pub mod models;
pub mod progress;
pub mod service;
pub mod stats;
