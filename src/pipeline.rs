//! Per-surface pipeline: the result record, its transition rules, and the
//! runner that drives one batch attempt to a terminal state.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::content::{ContentService, ImageRequest, TextRequest};
use crate::model::{BatchRequest, Surface};
use crate::store::{ApplyOutcome, ResultStore};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStatus {
    Idle,
    GeneratingText,
    GeneratingImage,
    Refining,
    Completed,
    Error,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Idle => "idle",
            PipelineStatus::GeneratingText => "generating-text",
            PipelineStatus::GeneratingImage => "generating-image",
            PipelineStatus::Refining => "refining",
            PipelineStatus::Completed => "completed",
            PipelineStatus::Error => "error",
        }
    }

    /// Terminal for a generation run. `Refining` is not: it always returns
    /// to `Completed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStatus::Completed | PipelineStatus::Error)
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Output and state of one surface in the result table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub surface: Surface,
    pub text: String,
    pub image_url: Option<String>,
    pub image_requested: bool,
    pub status: PipelineStatus,
    pub error: Option<String>,
}

impl PipelineResult {
    pub fn idle(surface: Surface) -> Self {
        Self {
            surface,
            text: String::new(),
            image_url: None,
            image_requested: false,
            status: PipelineStatus::Idle,
            error: None,
        }
    }

    /// Apply one transition. On `Err` the record is left untouched.
    pub fn apply(&mut self, patch: ResultPatch) -> Result<(), InvalidTransition> {
        use PipelineStatus::*;
        let from = self.status;
        match (from, patch) {
            // A fresh batch resets from any state; text survives until overwritten.
            (_, ResultPatch::Start { image_requested }) => {
                self.status = GeneratingText;
                self.error = None;
                self.image_url = None;
                self.image_requested = image_requested;
            }
            (GeneratingText, ResultPatch::TextReady { text }) => {
                self.text = text;
                self.status = if self.image_requested {
                    GeneratingImage
                } else {
                    Completed
                };
            }
            (GeneratingText, ResultPatch::TextFailed { reason }) => {
                self.text.clear();
                self.status = Error;
                self.error = Some(reason);
            }
            (GeneratingImage, ResultPatch::ImageReady { image_url }) => {
                self.image_url = Some(image_url);
                self.status = Completed;
            }
            // Partial failure: the generated text is kept.
            (GeneratingImage, ResultPatch::ImageFailed { reason }) => {
                self.status = Error;
                self.error = Some(reason);
            }
            (Completed, ResultPatch::RefineStarted) if !self.text.is_empty() => {
                self.status = Refining;
            }
            (Refining, ResultPatch::Refined { text }) => {
                self.text = text;
                self.status = Completed;
                self.error = None;
            }
            (Refining, ResultPatch::RefineFailed { reason }) => {
                self.status = Completed;
                self.error = Some(reason);
            }
            (_, patch) => {
                return Err(InvalidTransition {
                    surface: self.surface,
                    from,
                    patch: patch.name(),
                })
            }
        }
        Ok(())
    }
}

/// A narrow update to one surface's result. Patches name transitions, not
/// fields, so every write goes through [`PipelineResult::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultPatch {
    Start { image_requested: bool },
    TextReady { text: String },
    TextFailed { reason: String },
    ImageReady { image_url: String },
    ImageFailed { reason: String },
    RefineStarted,
    Refined { text: String },
    RefineFailed { reason: String },
}

impl ResultPatch {
    pub fn name(&self) -> &'static str {
        match self {
            ResultPatch::Start { .. } => "start",
            ResultPatch::TextReady { .. } => "text-ready",
            ResultPatch::TextFailed { .. } => "text-failed",
            ResultPatch::ImageReady { .. } => "image-ready",
            ResultPatch::ImageFailed { .. } => "image-failed",
            ResultPatch::RefineStarted => "refine-started",
            ResultPatch::Refined { .. } => "refined",
            ResultPatch::RefineFailed { .. } => "refine-failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{surface}: '{patch}' is not allowed from {from}")]
pub struct InvalidTransition {
    pub surface: Surface,
    pub from: PipelineStatus,
    pub patch: &'static str,
}

/// How a run ended from the runner's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Finished(PipelineStatus),
    /// A newer batch took over the surface; this run's later writes were dropped.
    Superseded,
}

/// One generation attempt for one surface. Owns everything it needs so it
/// can run as an independent task.
pub struct PipelineRun {
    pub surface: Surface,
    pub epoch: u64,
    pub request: Arc<BatchRequest>,
    pub content: Arc<dyn ContentService>,
    pub store: ResultStore,
}

impl PipelineRun {
    fn write(&self, patch: ResultPatch) -> Option<PipelineStatus> {
        match self.store.apply(self.surface, self.epoch, patch) {
            Ok(ApplyOutcome::Applied(status)) => Some(status),
            Ok(ApplyOutcome::Stale { current_epoch }) => {
                debug!(surface = %self.surface, epoch = self.epoch, current_epoch, "run superseded");
                None
            }
            Err(err) => {
                warn!(%err, epoch = self.epoch, "rejected pipeline write");
                None
            }
        }
    }

    /// Drive `generating-text` to `completed` or `error`. Text always
    /// precedes image generation.
    #[instrument(skip_all, fields(surface = %self.surface, epoch = self.epoch))]
    pub async fn drive(self) -> RunOutcome {
        let req = &self.request;
        let text_req = TextRequest {
            surface: self.surface,
            topic: req.topic.clone(),
            tone: req.tone,
            language: req.language,
            keywords: req.keywords.clone(),
            brand_voice: req.brand_voice.clone(),
            thread_mode: req.thread_mode,
            model_tier: req.model_tier,
        };

        let text = match self.content.generate_text(&text_req).await {
            Ok(text) => text,
            Err(err) => {
                warn!(%err, "text generation failed");
                return self.finish(ResultPatch::TextFailed {
                    reason: err.to_string(),
                });
            }
        };

        let status = match self.write(ResultPatch::TextReady { text: text.clone() }) {
            Some(status) => status,
            None => return RunOutcome::Superseded,
        };
        if status != PipelineStatus::GeneratingImage {
            info!(%status, "pipeline finished");
            return RunOutcome::Finished(status);
        }

        let image_req = ImageRequest {
            surface: self.surface,
            topic: req.topic.clone(),
            context_text: text,
            tone: req.tone,
            model_tier: req.model_tier,
        };
        match self.content.generate_image(&image_req).await {
            Ok(image_url) => self.finish(ResultPatch::ImageReady { image_url }),
            Err(err) => {
                warn!(%err, "image generation failed; keeping text");
                self.finish(ResultPatch::ImageFailed {
                    reason: err.to_string(),
                })
            }
        }
    }

    fn finish(&self, patch: ResultPatch) -> RunOutcome {
        match self.write(patch) {
            Some(status) => {
                info!(%status, "pipeline finished");
                RunOutcome::Finished(status)
            }
            None => RunOutcome::Superseded,
        }
    }
}
