//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods. Methods
//! that only ever run on their own take `&PgPool`; methods that participate
//! in multi-row transactions are generic over [`sqlx::PgExecutor`] so they
//! accept either the pool or `&mut *tx`.

pub mod analytics_repo;
pub mod attempt_repo;
pub mod course_repo;
pub mod course_version_repo;
pub mod enrollment_repo;
pub mod instructor_repo;
pub mod progress_repo;
pub mod quiz_repo;
pub mod status_transition_repo;
pub mod task_repo;
pub mod user_repo;

pub use analytics_repo::AnalyticsRepo;
pub use attempt_repo::AttemptRepo;
pub use course_repo::CourseRepo;
pub use course_version_repo::CourseVersionRepo;
pub use enrollment_repo::EnrollmentRepo;
pub use instructor_repo::InstructorRepo;
pub use progress_repo::ProgressRepo;
pub use quiz_repo::QuizRepo;
pub use status_transition_repo::StatusTransitionRepo;
pub use task_repo::TaskRepo;
pub use user_repo::UserRepo;
