//! Display formatting for the live typing affordance. Pure functions of the
//! raw accumulated text — independent of delivery timing, so any fragment
//! split of the same text renders identically.

/// Trailing caret shown while a response is still streaming.
pub const TYPING_CARET: &str = "▍";

/// View of the accumulated text shown while streaming.
pub fn live_preview(raw: &str) -> String {
    format!("{}{TYPING_CARET}", normalize(raw))
}

/// Final view pushed to the display once the stream completes.
pub fn final_preview(raw: &str) -> String {
    normalize(raw).to_string()
}

/// Models often open with a blank line; the inline affordance renders at a
/// fixed offset, so leading whitespace would push it around mid-stream.
fn normalize(raw: &str) -> &str {
    raw.trim_start()
}
