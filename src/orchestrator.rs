//! Fans one batch request out into one pipeline per enabled surface and
//! waits for all of them, regardless of individual failures.
use futures::future::join_all;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info, instrument, warn};

use crate::connection::ConnectionProvider;
use crate::content::ContentService;
use crate::error::SubmitError;
use crate::history::{HistoryEntry, HistoryLog, HistoryStore, Rollup};
use crate::model::{BatchRequest, Surface};
use crate::pipeline::{PipelineResult, PipelineRun, PipelineStatus, ResultPatch, RunOutcome};
use crate::refine::RefinementController;
use crate::store::{ApplyOutcome, ResultStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceOutcome {
    pub surface: Surface,
    pub outcome: RunOutcome,
}

/// What one `submit` produced once every pipeline settled.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub entry: HistoryEntry,
    pub outcomes: Vec<SurfaceOutcome>,
    /// Table entries for the batch's surfaces, read after the join.
    pub results: Vec<PipelineResult>,
}

impl BatchReport {
    pub fn completed(&self) -> impl Iterator<Item = &PipelineResult> {
        self.results
            .iter()
            .filter(|r| r.status == PipelineStatus::Completed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &PipelineResult> {
        self.results
            .iter()
            .filter(|r| r.status == PipelineStatus::Error)
    }
}

pub struct GenerationOrchestrator {
    content: Arc<dyn ContentService>,
    connection: Arc<dyn ConnectionProvider>,
    results: ResultStore,
    history: Mutex<HistoryLog>,
    history_store: Arc<dyn HistoryStore>,
    // Serializes history saves.
    persist: tokio::sync::Mutex<()>,
}

impl GenerationOrchestrator {
    pub fn new(
        content: Arc<dyn ContentService>,
        connection: Arc<dyn ConnectionProvider>,
        history_store: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            content,
            connection,
            results: ResultStore::new(),
            history: Mutex::new(HistoryLog::new()),
            history_store,
            persist: tokio::sync::Mutex::new(()),
        }
    }

    /// Seed the in-memory log from the history store. Meant to run once at
    /// start-up; attempts already submitted are kept after the loaded ones.
    pub async fn load_history(&self) {
        match self.history_store.load().await {
            Ok(records) => {
                let mut log = self.history_log();
                let mut loaded = HistoryLog::from_persisted(records);
                info!(entries = loaded.len(), "history loaded");
                loaded.extend(log.chronological().cloned());
                *log = loaded;
            }
            Err(err) => warn!(%err, "failed to load history; starting empty"),
        }
    }

    /// Write the current log. The snapshot is taken under the save lock, so
    /// each save holds at least the entries of the one before it.
    async fn persist_history(&self) {
        let _guard = self.persist.lock().await;
        let persisted = self.history_log().to_persisted();
        if let Err(err) = self.history_store.save(&persisted).await {
            warn!(%err, "failed to persist history");
        }
    }

    fn history_log(&self) -> MutexGuard<'_, HistoryLog> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    pub fn history(&self) -> HistoryLog {
        self.history_log().clone()
    }

    pub fn rollup(&self) -> Rollup {
        self.history_log().rollup()
    }

    /// Refinement controller sharing this orchestrator's result table and
    /// content service.
    pub fn refinement(&self) -> RefinementController {
        RefinementController::new(self.content.clone(), self.results.clone())
    }

    fn validate(request: &BatchRequest) -> Result<(), SubmitError> {
        if request.topic.trim().is_empty() {
            return Err(SubmitError::EmptyTopic);
        }
        if request.surfaces.is_empty() {
            return Err(SubmitError::NoSurfaces);
        }
        Ok(())
    }

    /// Run one batch. Returns once every started pipeline reached a terminal
    /// state or was superseded. Only validation and connection failures are
    /// errors; generation failures end up in the result table.
    #[instrument(skip_all, fields(surfaces = request.surfaces.len()))]
    pub async fn submit(&self, request: BatchRequest) -> Result<BatchReport, SubmitError> {
        Self::validate(&request)?;
        if !self.connection.is_connected().await {
            warn!("submission rejected: not connected");
            return Err(SubmitError::NotConnected);
        }

        let surfaces: Vec<Surface> = request.surfaces.iter().copied().collect();
        let entry = HistoryEntry::new(request.tone, surfaces.clone());
        self.history_log().append(entry.clone());

        let request = Arc::new(request);
        let settings = request.settings();
        let runs: Vec<(Surface, u64)> = surfaces
            .iter()
            .map(|&surface| {
                let epoch = self
                    .results
                    .begin(surface, request.generate_images, settings);
                (surface, epoch)
            })
            .collect();

        let handles: Vec<_> = runs
            .iter()
            .map(|&(surface, epoch)| {
                let run = PipelineRun {
                    surface,
                    epoch,
                    request: request.clone(),
                    content: self.content.clone(),
                    store: self.results.clone(),
                };
                tokio::spawn(run.drive())
            })
            .collect();
        info!(topic_len = request.topic.len(), "batch started");

        self.persist_history().await;

        let joined = join_all(handles).await;
        let outcomes = runs
            .iter()
            .zip(joined)
            .map(|(&(surface, epoch), joined)| {
                let outcome = match joined {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        error!(%surface, %err, "pipeline task aborted");
                        self.fail_aborted(surface, epoch, &err.to_string())
                    }
                };
                SurfaceOutcome { surface, outcome }
            })
            .collect();

        let results = surfaces.iter().map(|&s| self.results.get(s)).collect();
        info!("batch settled");
        Ok(BatchReport {
            entry,
            outcomes,
            results,
        })
    }

    /// A task that died without reaching a terminal state still has to leave
    /// its surface terminal.
    fn fail_aborted(&self, surface: Surface, epoch: u64, reason: &str) -> RunOutcome {
        let reason = format!("pipeline aborted: {}", reason);
        let patch = match self.results.get(surface).status {
            PipelineStatus::GeneratingText => ResultPatch::TextFailed { reason },
            PipelineStatus::GeneratingImage => ResultPatch::ImageFailed { reason },
            status => return RunOutcome::Finished(status),
        };
        match self.results.apply(surface, epoch, patch) {
            Ok(ApplyOutcome::Applied(status)) => RunOutcome::Finished(status),
            _ => RunOutcome::Superseded,
        }
    }
}
