pub mod access;
pub mod analytics;
pub mod course;
pub mod enrollment;
pub mod error;
pub mod progress;
pub mod quiz;
pub mod reports;
pub mod roles;
pub mod task;
pub mod types;
pub mod versioning;
