//! LearnHub engine.
//!
//! Exposes the operations of the learning platform (accounts, catalogue,
//! enrolment and progress, quizzes, analytics) as async functions over an
//! [`EngineState`](state::EngineState). Every operation takes the requesting
//! [`Principal`](learnhub_core::access::Principal) and returns a
//! [`ServiceResult`](error::ServiceResult). Transport layers translate
//! to and from these calls.

pub mod analytics;
pub mod auth;
pub mod cache;
pub mod config;
pub mod courses;
pub mod enrollments;
pub mod error;
pub mod progress;
pub mod quiz;
pub mod state;
pub mod tasks;
pub mod telemetry;
pub mod users;
pub mod versions;
