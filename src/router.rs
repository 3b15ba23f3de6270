use std::sync::Arc;

use crate::error::QuillError;
use crate::host::DocumentSink;
use crate::request::EditRequest;
use crate::review::{ReviewItem, ReviewSurface};
use crate::session::TerminalOutcome;

/// Placeholder token replaced by the trimmed result during formatting.
pub const RESULT_PLACEHOLDER: &str = "{{result}}";

/// Substitute every placeholder occurrence with the trimmed result. A
/// template without the placeholder is used verbatim and the result is
/// dropped — templates may only want a fixed message plus metadata.
pub fn render_template(template: &str, result: &str) -> String {
    template.replace(RESULT_PLACEHOLDER, result)
}

/// Releases still-held spinner/result state once a result has been applied,
/// discarded, or cancelled out of review.
pub type ReleaseHook = Arc<dyn Fn() + Send + Sync>;

/// Where the format template is read from at application time. Deferred
/// application reads it lazily, so template edits made after streaming but
/// before acceptance are honored.
pub type TemplateSource = Arc<dyn Fn() -> String + Send + Sync>;

/// Everything the router may touch while applying one outcome.
pub struct RouteTargets {
    pub document: Arc<dyn DocumentSink>,
    pub surface: Option<Arc<dyn ReviewSurface>>,
    pub release: ReleaseHook,
    /// Live template source; `None` freezes the request's template.
    pub template: Option<TemplateSource>,
}

/// Decides, per request, which application strategy a terminal outcome gets:
/// immediate apply, deferred review, or discard. Invoked once per outcome.
#[derive(Default)]
pub struct ResultRouter;

impl ResultRouter {
    pub fn new() -> Self {
        Self
    }

    pub async fn route(
        &self,
        outcome: TerminalOutcome,
        request: &EditRequest,
        targets: RouteTargets,
    ) -> Result<(), QuillError> {
        let TerminalOutcome::Completed(text) = outcome else {
            (targets.release)();
            return Ok(());
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            (targets.release)();
            return Ok(());
        }

        let template: TemplateSource = targets.template.unwrap_or_else(|| {
            let frozen = request.format_template.clone();
            Arc::new(move || frozen.clone())
        });

        if !request.deferred {
            let rendered = render_template(&template(), trimmed);
            // Applied at the request-time snapshot, not the live cursor.
            let applied = targets
                .document
                .apply(&request.location, &rendered, &request.snapshot)
                .await;
            (targets.release)();
            return applied;
        }

        let Some(surface) = targets.surface else {
            // Fail soft: no mutation, nothing escapes to the caller.
            tracing::warn!("deferred result dropped: no review surface available");
            (targets.release)();
            return Ok(());
        };

        let item = ReviewItem::new(
            trimmed.to_string(),
            request,
            Arc::clone(&targets.document),
            template,
            targets.release,
        );
        surface.present(item).await
    }
}
