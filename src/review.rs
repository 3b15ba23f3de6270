use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::error::QuillError;
use crate::host::DocumentSink;
use crate::request::{EditRequest, LocationIntent, SelectionSnapshot};
use crate::router::{ReleaseHook, TemplateSource, render_template};

static ITEM_COUNTER: AtomicU64 = AtomicU64::new(0);

/// An interactive panel that holds a finished result until the user acts.
/// Presenting a new item while one is held replaces it (preemption is the
/// surface's concern).
#[async_trait]
pub trait ReviewSurface: Send + Sync {
    async fn present(&self, item: ReviewItem) -> Result<(), QuillError>;
}

/// One pending result held for review, bound to the originating request's
/// cursor/selection snapshot. The three user actions consume the item, so
/// each fires at most once; formatting happens lazily inside them.
pub struct ReviewItem {
    id: u64,
    text: String,
    default_location: LocationIntent,
    snapshot: SelectionSnapshot,
    has_external_target: bool,
    template: TemplateSource,
    document: Arc<dyn DocumentSink>,
    release: ReleaseHook,
}

impl ReviewItem {
    pub(crate) fn new(
        text: String,
        request: &EditRequest,
        document: Arc<dyn DocumentSink>,
        template: TemplateSource,
        release: ReleaseHook,
    ) -> Self {
        Self {
            id: ITEM_COUNTER.fetch_add(1, Ordering::Relaxed),
            text,
            default_location: request.location.clone(),
            snapshot: request.snapshot,
            has_external_target: request.has_external_target(),
            template,
            document,
            release,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The raw trimmed result, unformatted.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn default_location(&self) -> &LocationIntent {
        &self.default_location
    }

    /// Whether the originating request offered a named alternate target;
    /// surfaces use this to decide whether to show a redirect action.
    pub fn has_external_target(&self) -> bool {
        self.has_external_target
    }

    /// The result as it would be written right now, with the current
    /// template. For preview rendering inside the surface.
    pub fn rendered(&self) -> String {
        render_template(&(self.template)(), &self.text)
    }

    /// Apply at the original location.
    pub async fn accept(self) -> Result<(), QuillError> {
        let location = self.default_location.clone();
        self.apply_at(location).await
    }

    /// Apply at a caller-chosen alternate location instead of the original.
    pub async fn redirect(self, location: LocationIntent) -> Result<(), QuillError> {
        self.apply_at(location).await
    }

    /// Discard without mutating the document.
    pub fn cancel(self) {
        (self.release)();
    }

    async fn apply_at(self, location: LocationIntent) -> Result<(), QuillError> {
        let rendered = render_template(&(self.template)(), &self.text);
        let applied = self
            .document
            .apply(&location, &rendered, &self.snapshot)
            .await;
        (self.release)();
        applied
    }
}
