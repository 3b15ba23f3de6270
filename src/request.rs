use crate::backend::GenerateRequest;

/// Where in the document a finished result should be written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LocationIntent {
    InsertAtStart,
    AppendAtEnd,
    AppendAfterSelection,
    ReplaceSelection,
    /// Append to a named target outside the active document.
    AppendToTarget(String),
}

/// Cursor and selection captured when the request was created. Result
/// application always resolves against this snapshot — the live cursor may
/// have moved during streaming.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SelectionSnapshot {
    /// Byte offset of the cursor in the document.
    pub cursor: usize,
    /// Selection range (start, end), if any text was selected.
    pub selection: Option<(usize, usize)>,
}

/// One unit of work: a natural-language instruction run against document
/// text. Created by the caller, never mutated after submission.
#[derive(Clone, Debug)]
pub struct EditRequest {
    /// Natural-language instruction sent to the model as the system prompt.
    pub system_instruction: String,
    /// Output template. Every `{{result}}` occurrence is replaced with the
    /// trimmed result; a template without the placeholder is used verbatim.
    pub format_template: String,
    /// Raw document text handed to the model as input.
    pub input: String,
    /// Registry key of the model to use.
    pub model: String,
    /// Sampling temperature: 0.0 = deterministic, 1.0 = creative.
    pub temperature: Option<f64>,
    /// Cap on generated output length, in tokens.
    pub max_tokens: Option<u64>,
    /// Extra user-supplied prompt fragment appended after the input.
    pub extra_prompt: Option<String>,
    /// Where the result should be written.
    pub location: LocationIntent,
    /// Named alternate target offered as a redirect destination in review.
    pub external_target: Option<String>,
    /// Route the finished result through the review surface instead of
    /// applying it immediately.
    pub deferred: bool,
    /// Ask the backend for incremental delivery.
    pub stream: bool,
    /// Cursor/selection at request creation time.
    pub snapshot: SelectionSnapshot,
}

impl EditRequest {
    pub fn new(system_instruction: impl Into<String>, input: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            format_template: crate::router::RESULT_PLACEHOLDER.to_string(),
            input: input.into(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
            extra_prompt: None,
            location: LocationIntent::AppendAfterSelection,
            external_target: None,
            deferred: false,
            stream: true,
            snapshot: SelectionSnapshot::default(),
        }
    }

    pub fn has_external_target(&self) -> bool {
        self.external_target.is_some()
    }

    /// Build the backend request for this edit.
    pub fn to_generate(&self) -> GenerateRequest {
        GenerateRequest {
            model: self.model.clone(),
            system_instruction: self.system_instruction.clone(),
            input: self.input.clone(),
            extra_prompt: self.extra_prompt.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: self.stream,
        }
    }
}
