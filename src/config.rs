//! Inputs the core consumes from external collaborators (spec.md §6).
//! Endpoint selection, health tracking, and model-name rewriting live
//! outside this crate; `EndpointInfo` is the minimal seam a caller
//! fills in to pick an adapter and tweak request rendering.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyKind {
    ChatCompletions,
    Responses,
    AnthropicMessages,
    Gemini,
}

/// `max_tokens_field_name` lets a ChatCompletions-speaking endpoint
/// request `max_completion_tokens` or `max_output_tokens` in place of
/// the classic `max_tokens` key, without the adapter needing to know
/// about individual endpoints.
#[derive(Debug, Clone)]
pub struct EndpointInfo {
    pub kind: FamilyKind,
    pub max_tokens_field_name: Option<String>,
}

impl EndpointInfo {
    pub fn new(kind: FamilyKind) -> Self {
        Self {
            kind,
            max_tokens_field_name: None,
        }
    }
}
