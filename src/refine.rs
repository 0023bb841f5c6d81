use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::content::{ContentService, RefineRequest};
use crate::error::RefineError;
use crate::model::{RefinementAction, Surface};
use crate::pipeline::{PipelineResult, ResultPatch};
use crate::store::{ApplyOutcome, ResultStore};

pub const REFINEMENT_FAILED: &str = "Refinement failed";

/// Applies post-completion edits to one surface's text. Failures revert to
/// `completed` with the previous text intact.
#[derive(Clone)]
pub struct RefinementController {
    content: Arc<dyn ContentService>,
    results: ResultStore,
}

impl RefinementController {
    pub fn new(content: Arc<dyn ContentService>, results: ResultStore) -> Self {
        Self { content, results }
    }

    /// Refine `surface`'s text. Rejected without any state change unless the
    /// surface is `completed` with non-empty text; this also rejects a second
    /// refinement while one is in flight. Returns the surface's entry after
    /// the attempt.
    #[instrument(skip_all, fields(%surface, %action))]
    pub async fn refine(
        &self,
        surface: Surface,
        action: RefinementAction,
    ) -> Result<PipelineResult, RefineError> {
        let ticket = self.results.begin_refine(surface)?;
        let req = RefineRequest {
            surface,
            current_text: ticket.text,
            action,
            tone: ticket.settings.tone,
            language: ticket.settings.language,
            model_tier: ticket.settings.model_tier,
        };

        let patch = match self.content.refine(&req).await {
            Ok(text) => {
                info!(chars = text.chars().count(), "refined");
                ResultPatch::Refined { text }
            }
            Err(err) => {
                warn!(%err, "refinement failed; keeping previous text");
                ResultPatch::RefineFailed {
                    reason: REFINEMENT_FAILED.to_string(),
                }
            }
        };

        match self.results.apply(surface, ticket.epoch, patch) {
            Ok(ApplyOutcome::Applied(_)) => {}
            Ok(ApplyOutcome::Stale { current_epoch }) => {
                info!(epoch = ticket.epoch, current_epoch, "refinement superseded by a new batch");
            }
            Err(err) => warn!(%err, "rejected refinement write"),
        }
        Ok(self.results.get(surface))
    }
}
