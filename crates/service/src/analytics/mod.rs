//! Analytics aggregator: role-gated, cached reports and dashboards.
//!
//! Every report is computed from read-only queries in `AnalyticsRepo` and
//! memoised in the engine's [`ReportCache`](crate::cache::ReportCache).
//! Reports never write.

pub mod course;
pub mod dashboard;
pub mod student;

use std::future::Future;

use learnhub_core::error::CoreError;
use learnhub_core::types::DbId;
use learnhub_db::repositories::UserRepo;

use crate::error::ServiceResult;
use crate::state::EngineState;

pub use course::{course_analytics, course_student_progress, course_task_analytics};
pub use dashboard::{admin_dashboard, instructor_dashboard, student_dashboard};
pub use student::{student_progress, student_quiz_performance};

/// Cache id for platform-wide reports.
pub(crate) const PLATFORM_REPORT_ID: DbId = 0;

pub(crate) async fn ensure_user_exists(state: &EngineState, user_id: DbId) -> ServiceResult<()> {
    UserRepo::find_by_id(&state.pool, user_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| {
            CoreError::NotFound {
                entity: "User",
                id: user_id,
            }
            .into()
        })
}

/// Run one dashboard section, replacing a failure with an empty value.
pub(crate) async fn section<T, Fut>(name: &'static str, fut: Fut) -> T
where
    T: Default,
    Fut: Future<Output = ServiceResult<T>>,
{
    match fut.await {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(section = name, error = %e, "Dashboard section failed");
            T::default()
        }
    }
}
