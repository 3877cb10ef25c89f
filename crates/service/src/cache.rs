//! Process-wide TTL memoisation of computed reports.
//!
//! Entries are keyed on `(ReportKind, entity_id)` and expire after the TTL of
//! their kind. Mutations never evict; readers accept staleness bounded by the
//! TTL. Computations run outside the lock, so two requests for the same cold
//! key may both compute and the later write wins.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use learnhub_core::types::DbId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::ServiceResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    CourseAnalytics,
    CourseStudentProgress,
    CourseTaskAnalytics,
    StudentProgress,
    StudentQuizPerformance,
    StudentDashboard,
    InstructorDashboard,
    AdminDashboard,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CourseAnalytics => "course_analytics",
            Self::CourseStudentProgress => "course_student_progress",
            Self::CourseTaskAnalytics => "course_task_analytics",
            Self::StudentProgress => "student_progress",
            Self::StudentQuizPerformance => "student_quiz_performance",
            Self::StudentDashboard => "student_dashboard",
            Self::InstructorDashboard => "instructor_dashboard",
            Self::AdminDashboard => "admin_dashboard",
        }
    }

    /// Course-scoped reports use the longer course TTL.
    pub fn is_course_scoped(&self) -> bool {
        matches!(
            self,
            Self::CourseAnalytics | Self::CourseStudentProgress | Self::CourseTaskAnalytics
        )
    }
}

struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

pub struct ReportCache {
    course_ttl: Duration,
    student_ttl: Duration,
    entries: RwLock<HashMap<(ReportKind, DbId), CacheEntry>>,
}

impl ReportCache {
    pub fn new(course_ttl: Duration, student_ttl: Duration) -> Self {
        Self {
            course_ttl,
            student_ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl_for(&self, kind: ReportKind) -> Duration {
        if kind.is_course_scoped() {
            self.course_ttl
        } else {
            self.student_ttl
        }
    }

    /// A live entry, decoded. Expired or undecodable entries read as a miss.
    pub async fn get<T: DeserializeOwned>(&self, kind: ReportKind, id: DbId) -> Option<T> {
        let entries = self.entries.read().await;
        let entry = entries.get(&(kind, id))?;
        if Instant::now() >= entry.expires_at {
            return None;
        }
        serde_json::from_value(entry.value.clone()).ok()
    }

    /// Whether `(kind, id)` holds an entry past its expiry.
    async fn has_expired(&self, kind: ReportKind, id: DbId) -> bool {
        let entries = self.entries.read().await;
        entries
            .get(&(kind, id))
            .is_some_and(|entry| Instant::now() >= entry.expires_at)
    }

    pub async fn put<T: Serialize>(&self, kind: ReportKind, id: DbId, report: &T) {
        let value = match serde_json::to_value(report) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(kind = kind.as_str(), id, error = %e, "Report not cacheable");
                return;
            }
        };
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl_for(kind),
        };
        self.entries.write().await.insert((kind, id), entry);
    }

    /// Return the cached report or compute, store, and return a fresh one.
    ///
    /// A miss caused by expiry sweeps every expired entry first. Errors from
    /// `compute` are returned and nothing is cached.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        kind: ReportKind,
        id: DbId,
        compute: F,
    ) -> ServiceResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        if let Some(hit) = self.get(kind, id).await {
            tracing::debug!(kind = kind.as_str(), id, "Report cache hit");
            return Ok(hit);
        }
        if self.has_expired(kind, id).await {
            let purged = self.purge_expired().await;
            tracing::debug!(kind = kind.as_str(), id, purged, "Expired reports purged");
        }

        let report = compute().await?;
        self.put(kind, id, &report).await;
        Ok(report)
    }

    /// Drop expired entries. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
