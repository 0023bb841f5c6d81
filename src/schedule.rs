//! Accepted outputs waiting for their publish time.
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::ScheduleError;
use crate::model::Surface;
use crate::pipeline::{PipelineResult, PipelineStatus};
use crate::store::ResultStore;

/// A copy of a completed result; later refinements of the surface do not
/// reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledItem {
    pub id: Uuid,
    pub surface: Surface,
    pub text: String,
    pub image_url: Option<String>,
    pub scheduled_at: DateTime<Utc>,
}

/// Sorted ascending by `scheduled_at`; equal times keep insertion order.
#[derive(Debug, Clone, Default)]
pub struct ScheduleQueue {
    items: Vec<ScheduledItem>,
}

impl ScheduleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule the current output of `surface`. The surface must be
    /// `completed`.
    pub fn insert(
        &mut self,
        results: &ResultStore,
        surface: Surface,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Uuid, ScheduleError> {
        self.insert_result(&results.get(surface), scheduled_at)
    }

    pub fn insert_result(
        &mut self,
        result: &PipelineResult,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Uuid, ScheduleError> {
        if result.status != PipelineStatus::Completed {
            return Err(ScheduleError::NotCompleted {
                surface: result.surface,
                status: result.status,
            });
        }
        let item = ScheduledItem {
            id: Uuid::new_v4(),
            surface: result.surface,
            text: result.text.clone(),
            image_url: result.image_url.clone(),
            scheduled_at,
        };
        let id = item.id;
        // After every item at or before `scheduled_at`, which keeps ties stable.
        let pos = self.items.partition_point(|i| i.scheduled_at <= scheduled_at);
        self.items.insert(pos, item);
        info!(%id, surface = %result.surface, %scheduled_at, "scheduled");
        Ok(id)
    }

    /// Remove the item with `id`, if present.
    pub fn delete(&mut self, id: Uuid) -> Option<ScheduledItem> {
        let pos = self.items.iter().position(|i| i.id == id)?;
        Some(self.items.remove(pos))
    }

    pub fn get(&self, id: Uuid) -> Option<&ScheduledItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScheduledItem> {
        self.items.iter()
    }

    pub fn items(&self) -> &[ScheduledItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn completed(surface: Surface, text: &str) -> PipelineResult {
        PipelineResult {
            text: text.into(),
            status: PipelineStatus::Completed,
            ..PipelineResult::idle(surface)
        }
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 20, 9, 0, 0).unwrap()
    }

    fn assert_sorted(q: &ScheduleQueue) {
        for pair in q.items().windows(2) {
            assert!(pair[0].scheduled_at <= pair[1].scheduled_at);
        }
    }

    #[test]
    fn stays_sorted_after_every_insert() {
        let mut q = ScheduleQueue::new();
        let offsets = [5i64, -3, 12, 0, 5, -10, 7, 0];
        for (n, off) in offsets.iter().enumerate() {
            q.insert_result(
                &completed(Surface::Twitter, &format!("post {}", n)),
                base() + Duration::hours(*off),
            )
            .unwrap();
            assert_sorted(&q);
            assert_eq!(q.len(), n + 1);
        }
    }

    #[test]
    fn equal_times_keep_insertion_order() {
        let mut q = ScheduleQueue::new();
        let later = base() + Duration::minutes(30);
        q.insert_result(&completed(Surface::LinkedIn, "a"), later).unwrap();
        q.insert_result(&completed(Surface::Twitter, "b"), base()).unwrap();
        q.insert_result(&completed(Surface::Threads, "c"), later).unwrap();
        q.insert_result(&completed(Surface::Instagram, "d"), base()).unwrap();
        let texts: Vec<_> = q.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn rejects_non_completed() {
        let mut q = ScheduleQueue::new();
        let mut r = completed(Surface::Twitter, "x");
        r.status = PipelineStatus::Error;
        let err = q.insert_result(&r, base()).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::NotCompleted {
                surface: Surface::Twitter,
                status: PipelineStatus::Error
            }
        );
        assert!(q.is_empty());
    }

    #[test]
    fn delete_removes_exactly_one() {
        let mut q = ScheduleQueue::new();
        let a = q.insert_result(&completed(Surface::Twitter, "a"), base()).unwrap();
        let b = q.insert_result(&completed(Surface::Twitter, "a"), base()).unwrap();
        assert_ne!(a, b);
        let removed = q.delete(a).unwrap();
        assert_eq!(removed.id, a);
        assert_eq!(q.len(), 1);
        assert!(q.get(b).is_some());
        assert!(q.delete(a).is_none());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn items_are_copies() {
        let mut q = ScheduleQueue::new();
        let mut r = completed(Surface::Instagram, "Original");
        r.image_url = Some("data:image/png;base64,AAA".into());
        let id = q.insert_result(&r, base()).unwrap();
        r.text = "Refined".into();
        let item = q.get(id).unwrap();
        assert_eq!(item.text, "Original");
        assert_eq!(item.image_url.as_deref(), Some("data:image/png;base64,AAA"));
    }
}
