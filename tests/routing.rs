//! Tests for result application: template substitution, the three
//! application strategies, and the deferred review flow.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use quill::error::QuillError;
use quill::host::DocumentSink;
use quill::request::{EditRequest, LocationIntent, SelectionSnapshot};
use quill::review::{ReviewItem, ReviewSurface};
use quill::router::{RESULT_PLACEHOLDER, ResultRouter, RouteTargets, render_template};
use quill::session::TerminalOutcome;

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingDocument {
    applies: Mutex<Vec<(LocationIntent, String, SelectionSnapshot)>>,
}

impl RecordingDocument {
    fn applies(&self) -> Vec<(LocationIntent, String, SelectionSnapshot)> {
        self.applies.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentSink for RecordingDocument {
    async fn apply(
        &self,
        intent: &LocationIntent,
        text: &str,
        snapshot: &SelectionSnapshot,
    ) -> Result<(), QuillError> {
        self.applies
            .lock()
            .unwrap()
            .push((intent.clone(), text.to_string(), *snapshot));
        Ok(())
    }
}

#[derive(Default)]
struct CapturingSurface {
    item: Mutex<Option<ReviewItem>>,
}

impl CapturingSurface {
    fn take(&self) -> ReviewItem {
        self.item.lock().unwrap().take().expect("no item presented")
    }
}

#[async_trait]
impl ReviewSurface for CapturingSurface {
    async fn present(&self, item: ReviewItem) -> Result<(), QuillError> {
        *self.item.lock().unwrap() = Some(item);
        Ok(())
    }
}

fn release_counter() -> (Arc<AtomicUsize>, Arc<dyn Fn() + Send + Sync>) {
    let counter = Arc::new(AtomicUsize::new(0));
    let hook = {
        let counter = counter.clone();
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }) as Arc<dyn Fn() + Send + Sync>
    };
    (counter, hook)
}

fn make_request() -> EditRequest {
    let mut request = EditRequest::new("Summarize.", "input text", "test-model");
    request.location = LocationIntent::ReplaceSelection;
    request.snapshot = SelectionSnapshot {
        cursor: 42,
        selection: Some((10, 20)),
    };
    request
}

// ---------------------------------------------------------------------------
// Template substitution
// ---------------------------------------------------------------------------

#[test]
fn template_substitutes_every_occurrence() {
    assert_eq!(
        render_template("**Summary**: {{result}}\n\n", "hello"),
        "**Summary**: hello\n\n"
    );
    assert_eq!(
        render_template("{{result}} and {{result}}", "x"),
        "x and x"
    );
}

#[test]
fn template_without_placeholder_is_used_verbatim() {
    // The result is dropped on purpose: templates may only want a fixed
    // message plus metadata.
    assert_eq!(render_template("no placeholder", "anything"), "no placeholder");
    assert_eq!(RESULT_PLACEHOLDER, "{{result}}");
}

// ---------------------------------------------------------------------------
// Discard strategy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn whitespace_only_result_is_never_applied() {
    let router = ResultRouter::new();
    let document = Arc::new(RecordingDocument::default());
    let (released, hook) = release_counter();

    router
        .route(
            TerminalOutcome::Completed("   \n\t ".to_string()),
            &make_request(),
            RouteTargets {
                document: document.clone(),
                surface: None,
                release: hook,
                template: None,
            },
        )
        .await
        .unwrap();

    assert!(document.applies().is_empty());
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn non_completed_outcomes_do_nothing() {
    let router = ResultRouter::new();
    let document = Arc::new(RecordingDocument::default());
    let (released, hook) = release_counter();

    router
        .route(
            TerminalOutcome::Cancelled,
            &make_request(),
            RouteTargets {
                document: document.clone(),
                surface: None,
                release: hook.clone(),
                template: None,
            },
        )
        .await
        .unwrap();

    router
        .route(
            TerminalOutcome::Failed(QuillError::Other("boom".to_string())),
            &make_request(),
            RouteTargets {
                document: document.clone(),
                surface: None,
                release: hook,
                template: None,
            },
        )
        .await
        .unwrap();

    assert!(document.applies().is_empty());
    assert_eq!(released.load(Ordering::SeqCst), 2);
}

// ---------------------------------------------------------------------------
// Immediate strategy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn immediate_apply_uses_snapshot_location_and_template() {
    let router = ResultRouter::new();
    let document = Arc::new(RecordingDocument::default());
    let (released, hook) = release_counter();

    let mut request = make_request();
    request.format_template = "**Summary**: {{result}}\n\n".to_string();

    router
        .route(
            TerminalOutcome::Completed("Hello world!".to_string()),
            &request,
            RouteTargets {
                document: document.clone(),
                surface: None,
                release: hook,
                template: None,
            },
        )
        .await
        .unwrap();

    let applies = document.applies();
    assert_eq!(applies.len(), 1);
    let (intent, text, snapshot) = &applies[0];
    assert_eq!(*intent, LocationIntent::ReplaceSelection);
    assert_eq!(text, "**Summary**: Hello world!\n\n");
    assert_eq!(snapshot.cursor, 42);
    assert_eq!(snapshot.selection, Some((10, 20)));
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn immediate_apply_trims_the_result() {
    let router = ResultRouter::new();
    let document = Arc::new(RecordingDocument::default());
    let (_, hook) = release_counter();

    router
        .route(
            TerminalOutcome::Completed("\n  trimmed  \n".to_string()),
            &make_request(),
            RouteTargets {
                document: document.clone(),
                surface: None,
                release: hook,
                template: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(document.applies()[0].1, "trimmed");
}

#[tokio::test]
async fn fixed_template_drops_the_result_by_design() {
    let router = ResultRouter::new();
    let document = Arc::new(RecordingDocument::default());
    let (_, hook) = release_counter();

    let mut request = make_request();
    request.format_template = "generated below\n".to_string();

    router
        .route(
            TerminalOutcome::Completed("ignored".to_string()),
            &request,
            RouteTargets {
                document: document.clone(),
                surface: None,
                release: hook,
                template: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(document.applies()[0].1, "generated below\n");
}

// ---------------------------------------------------------------------------
// Deferred strategy
// ---------------------------------------------------------------------------

fn deferred_request() -> EditRequest {
    let mut request = make_request();
    request.deferred = true;
    request.format_template = "> {{result}}".to_string();
    request.external_target = Some("scratch".to_string());
    request
}

#[tokio::test]
async fn deferred_presents_raw_text_without_mutation() {
    let router = ResultRouter::new();
    let document = Arc::new(RecordingDocument::default());
    let surface = Arc::new(CapturingSurface::default());
    let (released, hook) = release_counter();

    router
        .route(
            TerminalOutcome::Completed("  Test result  ".to_string()),
            &deferred_request(),
            RouteTargets {
                document: document.clone(),
                surface: Some(surface.clone()),
                release: hook,
                template: None,
            },
        )
        .await
        .unwrap();

    assert!(document.applies().is_empty());
    assert_eq!(released.load(Ordering::SeqCst), 0);

    let item = surface.take();
    assert_eq!(item.text(), "Test result");
    assert_eq!(item.default_location(), &LocationIntent::ReplaceSelection);
    assert!(item.has_external_target());
    assert_eq!(item.rendered(), "> Test result");
}

#[tokio::test]
async fn review_accept_applies_at_original_location() {
    let router = ResultRouter::new();
    let document = Arc::new(RecordingDocument::default());
    let surface = Arc::new(CapturingSurface::default());
    let (released, hook) = release_counter();

    router
        .route(
            TerminalOutcome::Completed("Test result".to_string()),
            &deferred_request(),
            RouteTargets {
                document: document.clone(),
                surface: Some(surface.clone()),
                release: hook,
                template: None,
            },
        )
        .await
        .unwrap();

    surface.take().accept().await.unwrap();

    let applies = document.applies();
    assert_eq!(applies.len(), 1);
    assert_eq!(applies[0].0, LocationIntent::ReplaceSelection);
    assert_eq!(applies[0].1, "> Test result");
    assert_eq!(applies[0].2.cursor, 42);
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn review_redirect_applies_at_alternate_location() {
    let router = ResultRouter::new();
    let document = Arc::new(RecordingDocument::default());
    let surface = Arc::new(CapturingSurface::default());
    let (released, hook) = release_counter();

    router
        .route(
            TerminalOutcome::Completed("Test result".to_string()),
            &deferred_request(),
            RouteTargets {
                document: document.clone(),
                surface: Some(surface.clone()),
                release: hook,
                template: None,
            },
        )
        .await
        .unwrap();

    surface
        .take()
        .redirect(LocationIntent::AppendToTarget("scratch".to_string()))
        .await
        .unwrap();

    let applies = document.applies();
    assert_eq!(applies.len(), 1);
    assert_eq!(
        applies[0].0,
        LocationIntent::AppendToTarget("scratch".to_string())
    );
    assert_eq!(applies[0].1, "> Test result");
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn review_cancel_mutates_nothing() {
    let router = ResultRouter::new();
    let document = Arc::new(RecordingDocument::default());
    let surface = Arc::new(CapturingSurface::default());
    let (released, hook) = release_counter();

    router
        .route(
            TerminalOutcome::Completed("Test result".to_string()),
            &deferred_request(),
            RouteTargets {
                document: document.clone(),
                surface: Some(surface.clone()),
                release: hook,
                template: None,
            },
        )
        .await
        .unwrap();

    surface.take().cancel();

    assert!(document.applies().is_empty());
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn review_honors_template_edits_made_before_acceptance() {
    let router = ResultRouter::new();
    let document = Arc::new(RecordingDocument::default());
    let surface = Arc::new(CapturingSurface::default());
    let (_, hook) = release_counter();

    let live_template = Arc::new(Mutex::new("old: {{result}}".to_string()));
    let template_source = {
        let live = live_template.clone();
        Arc::new(move || live.lock().unwrap().clone()) as Arc<dyn Fn() -> String + Send + Sync>
    };

    router
        .route(
            TerminalOutcome::Completed("body".to_string()),
            &deferred_request(),
            RouteTargets {
                document: document.clone(),
                surface: Some(surface.clone()),
                release: hook,
                template: Some(template_source),
            },
        )
        .await
        .unwrap();

    // Edited after streaming finished but before the user accepted.
    *live_template.lock().unwrap() = "new: {{result}}".to_string();

    surface.take().accept().await.unwrap();
    assert_eq!(document.applies()[0].1, "new: body");
}

#[tokio::test]
async fn deferred_without_surface_fails_soft() {
    let router = ResultRouter::new();
    let document = Arc::new(RecordingDocument::default());
    let (released, hook) = release_counter();

    let result = router
        .route(
            TerminalOutcome::Completed("Test result".to_string()),
            &deferred_request(),
            RouteTargets {
                document: document.clone(),
                surface: None,
                release: hook,
                template: None,
            },
        )
        .await;

    assert!(result.is_ok());
    assert!(document.applies().is_empty());
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn review_item_ids_are_unique() {
    let router = ResultRouter::new();
    let document = Arc::new(RecordingDocument::default());
    let surface = Arc::new(CapturingSurface::default());

    let mut ids = Vec::new();
    for _ in 0..3 {
        let (_, hook) = release_counter();
        router
            .route(
                TerminalOutcome::Completed("text".to_string()),
                &deferred_request(),
                RouteTargets {
                    document: document.clone(),
                    surface: Some(surface.clone()),
                    release: hook,
                    template: None,
                },
            )
            .await
            .unwrap();
        ids.push(surface.take().id());
    }

    ids.dedup();
    assert_eq!(ids.len(), 3);
}
