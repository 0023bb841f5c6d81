//! The result table: one slot per surface, mutated only through
//! [`ResultStore::apply`].
//!
//! Each slot carries an epoch. Starting a batch on a surface bumps it, and
//! writes tagged with an older epoch are dropped, so a newer batch supersedes
//! any run still in flight for the same surface.
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::RefineError;
use crate::model::{GenerationSettings, Surface};
use crate::pipeline::{InvalidTransition, PipelineResult, PipelineStatus, ResultPatch};

const EVENT_CAPACITY: usize = 256;

/// Emitted after every applied patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineEvent {
    pub surface: Surface,
    pub epoch: u64,
    pub status: PipelineStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied(PipelineStatus),
    Stale { current_epoch: u64 },
}

#[derive(Debug, Clone)]
struct Slot {
    result: PipelineResult,
    epoch: u64,
    settings: GenerationSettings,
}

#[derive(Debug)]
struct Table {
    slots: [Slot; Surface::COUNT],
}

/// Snapshot taken when a refinement is admitted.
#[derive(Debug, Clone)]
pub struct RefineTicket {
    pub epoch: u64,
    pub text: String,
    pub settings: GenerationSettings,
}

#[derive(Clone)]
pub struct ResultStore {
    table: Arc<Mutex<Table>>,
    events: broadcast::Sender<PipelineEvent>,
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultStore {
    pub fn new() -> Self {
        let slots = Surface::ALL.map(|surface| Slot {
            result: PipelineResult::idle(surface),
            epoch: 0,
            settings: GenerationSettings::default(),
        });
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            table: Arc::new(Mutex::new(Table { slots })),
            events,
        }
    }

    // The lock is never held across an await, so a poisoned guard still
    // holds a consistent table.
    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, surface: Surface, epoch: u64, status: PipelineStatus) {
        // No subscribers is fine.
        let _ = self.events.send(PipelineEvent {
            surface,
            epoch,
            status,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn get(&self, surface: Surface) -> PipelineResult {
        self.lock().slots[surface.index()].result.clone()
    }

    /// All slots in surface declaration order.
    pub fn snapshot(&self) -> Vec<PipelineResult> {
        self.lock().slots.iter().map(|s| s.result.clone()).collect()
    }

    pub fn epoch(&self, surface: Surface) -> u64 {
        self.lock().slots[surface.index()].epoch
    }

    /// Open a new epoch for `surface` and reset it to `generating-text`.
    pub fn begin(
        &self,
        surface: Surface,
        image_requested: bool,
        settings: GenerationSettings,
    ) -> u64 {
        let epoch = {
            let mut table = self.lock();
            let slot = &mut table.slots[surface.index()];
            slot.epoch += 1;
            slot.settings = settings;
            // Start is accepted from every state.
            let _ = slot.result.apply(ResultPatch::Start { image_requested });
            slot.epoch
        };
        self.emit(surface, epoch, PipelineStatus::GeneratingText);
        epoch
    }

    /// Apply `patch` to `surface` if `epoch` is still current.
    pub fn apply(
        &self,
        surface: Surface,
        epoch: u64,
        patch: ResultPatch,
    ) -> Result<ApplyOutcome, InvalidTransition> {
        let status = {
            let mut table = self.lock();
            let slot = &mut table.slots[surface.index()];
            if slot.epoch != epoch {
                debug!(%surface, epoch, current = slot.epoch, patch = patch.name(), "dropping stale write");
                return Ok(ApplyOutcome::Stale {
                    current_epoch: slot.epoch,
                });
            }
            slot.result.apply(patch)?;
            slot.result.status
        };
        self.emit(surface, epoch, status);
        Ok(ApplyOutcome::Applied(status))
    }

    /// Atomically check the refinement precondition and move the surface to
    /// `refining`. A second caller sees `refining` and is rejected.
    pub fn begin_refine(&self, surface: Surface) -> Result<RefineTicket, RefineError> {
        let ticket = {
            let mut table = self.lock();
            let slot = &mut table.slots[surface.index()];
            let status = slot.result.status;
            if status != PipelineStatus::Completed {
                return Err(RefineError::NotCompleted { surface, status });
            }
            if slot.result.text.is_empty() {
                return Err(RefineError::EmptyText { surface });
            }
            slot.result
                .apply(ResultPatch::RefineStarted)
                .map_err(|_| RefineError::NotCompleted { surface, status })?;
            RefineTicket {
                epoch: slot.epoch,
                text: slot.result.text.clone(),
                settings: slot.settings,
            }
        };
        self.emit(surface, ticket.epoch, PipelineStatus::Refining);
        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_one_idle_slot_per_surface() {
        let store = ResultStore::new();
        let snap = store.snapshot();
        assert_eq!(snap.len(), Surface::COUNT);
        for (slot, surface) in snap.iter().zip(Surface::ALL) {
            assert_eq!(slot.surface, surface);
            assert_eq!(slot.status, PipelineStatus::Idle);
        }
    }

    #[test]
    fn stale_epoch_is_dropped() {
        let store = ResultStore::new();
        let first = store.begin(Surface::Twitter, false, GenerationSettings::default());
        let second = store.begin(Surface::Twitter, false, GenerationSettings::default());
        assert_eq!(second, first + 1);

        let out = store
            .apply(Surface::Twitter, first, ResultPatch::TextReady { text: "old".into() })
            .unwrap();
        assert_eq!(out, ApplyOutcome::Stale { current_epoch: second });
        assert_eq!(store.get(Surface::Twitter).status, PipelineStatus::GeneratingText);

        let out = store
            .apply(Surface::Twitter, second, ResultPatch::TextReady { text: "new".into() })
            .unwrap();
        assert_eq!(out, ApplyOutcome::Applied(PipelineStatus::Completed));
        assert_eq!(store.get(Surface::Twitter).text, "new");
    }

    #[test]
    fn writes_only_touch_their_own_slot() {
        let store = ResultStore::new();
        let before = store.get(Surface::Threads);
        let epoch = store.begin(Surface::LinkedIn, true, GenerationSettings::default());
        store
            .apply(Surface::LinkedIn, epoch, ResultPatch::TextReady { text: "x".into() })
            .unwrap();
        assert_eq!(store.get(Surface::Threads), before);
        assert_eq!(store.epoch(Surface::Threads), 0);
    }

    #[test]
    fn refine_admission_is_exclusive() {
        let store = ResultStore::new();
        let epoch = store.begin(Surface::Instagram, false, GenerationSettings::default());
        store
            .apply(Surface::Instagram, epoch, ResultPatch::TextReady { text: "post".into() })
            .unwrap();

        let ticket = store.begin_refine(Surface::Instagram).unwrap();
        assert_eq!(ticket.text, "post");
        assert_eq!(ticket.epoch, epoch);
        let err = store.begin_refine(Surface::Instagram).unwrap_err();
        assert_eq!(
            err,
            RefineError::NotCompleted {
                surface: Surface::Instagram,
                status: PipelineStatus::Refining
            }
        );
    }

    #[tokio::test]
    async fn applied_patches_are_broadcast() {
        let store = ResultStore::new();
        let mut rx = store.subscribe();
        let epoch = store.begin(Surface::Twitter, false, GenerationSettings::default());
        store
            .apply(Surface::Twitter, epoch, ResultPatch::TextFailed { reason: "x".into() })
            .unwrap();
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.status, PipelineStatus::GeneratingText);
        assert_eq!(second.status, PipelineStatus::Error);
        assert_eq!(second.surface, Surface::Twitter);
    }
}
