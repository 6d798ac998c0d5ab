//! Provider-neutral canonical data model.
//!
//! Every format adapter parses into these types and every builder
//! renders from them; nothing here knows about any particular wire
//! format. See spec.md §3 for the authoritative field semantics.

use serde_json::Value;

/// `system`, `user`, `assistant`, or `tool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// Canonical finish-reason vocabulary. Every adapter maps to/from its
/// own family's vocabulary through `crate::mappers::finish_reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    Function(String),
}

/// A tool definition offered to the model. `kind` is always `"function"`
/// in this revision but kept explicit so a future variant doesn't need
/// a breaking rename.
#[derive(Debug, Clone)]
pub struct CanonicalTool {
    pub kind: String,
    pub name: String,
    pub description: Option<String>,
    pub parameters: Value,
}

impl CanonicalTool {
    pub fn function(name: impl Into<String>, description: Option<String>, parameters: Value) -> Self {
        Self {
            kind: "function".to_string(),
            name: name.into(),
            description,
            parameters,
        }
    }
}

/// A structured function invocation requested by the model.
///
/// Arguments are stored verbatim as the raw string the model produced;
/// `as_value` parses on demand rather than carrying a duplicated
/// `serde_json::Value` for the common path where nothing needs the
/// structural form.
#[derive(Debug, Clone)]
pub struct CanonicalToolCall {
    pub id: String,
    pub index: usize,
    pub name: String,
    pub arguments: String,
}

impl CanonicalToolCall {
    pub fn as_value(&self) -> Option<Value> {
        if self.arguments.is_empty() {
            return Some(Value::Object(Default::default()));
        }
        serde_json::from_str(&self.arguments).ok()
    }
}

/// Where a `thinking` block originated, for round-tripping back to the
/// same family's native shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThinkingProvider {
    Anthropic,
    OpenAi,
}

#[derive(Debug, Clone)]
pub struct Thinking {
    pub provider: ThinkingProvider,
    pub text: Option<String>,
    pub budget_tokens: Option<u32>,
}

/// A single piece of message content. Providers expose `content` as
/// either a bare string or a heterogeneous list of typed blocks; the
/// canonical form always normalizes to the variant form and lets
/// builders decide how to collapse it back down.
#[derive(Debug, Clone)]
pub enum CanonicalContent {
    Text(String),
    Image {
        url: String,
        media_type: Option<String>,
    },
    ToolUse {
        id: String,
        name: String,
        arguments: String,
        parsed: Option<Value>,
        index: usize,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        structured_content: Option<Vec<CanonicalContent>>,
        is_error: bool,
    },
    Thinking(Thinking),
}

/// One message in a conversation.
#[derive(Debug, Clone)]
pub struct CanonicalMessage {
    pub role: Role,
    pub name: Option<String>,
    pub tool_call_id: Option<String>,
    pub content: Vec<CanonicalContent>,
    pub tool_calls: Vec<CanonicalToolCall>,
}

impl CanonicalMessage {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            name: None,
            tool_call_id: None,
            content: Vec::new(),
            tool_calls: Vec::new(),
        }
    }

    pub fn text(role: Role, text: impl Into<String>) -> Self {
        let mut msg = Self::new(role);
        msg.content.push(CanonicalContent::Text(text.into()));
        msg
    }

    /// Concatenates every `Text` content block with no separator — the
    /// common case of "give me the plain-text body of this message".
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                CanonicalContent::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Ensures every `ToolUse` content block has a matching entry in
    /// `tool_calls` and vice versa, per spec.md §3's invariant. Called
    /// by parsers after populating either projection.
    pub fn sync_tool_call_projections(&mut self) {
        for block in &self.content {
            if let CanonicalContent::ToolUse {
                id, name, arguments, index, ..
            } = block
            {
                if !self.tool_calls.iter().any(|tc| tc.id == *id) {
                    self.tool_calls.push(CanonicalToolCall {
                        id: id.clone(),
                        index: *index,
                        name: name.clone(),
                        arguments: arguments.clone(),
                    });
                }
            }
        }
        for tc in &self.tool_calls {
            if !self.content.iter().any(|c| matches!(c, CanonicalContent::ToolUse { id, .. } if id == &tc.id)) {
                self.content.push(CanonicalContent::ToolUse {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: tc.arguments.clone(),
                    parsed: None,
                    index: tc.index,
                });
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.total_tokens.unwrap_or_else(|| {
            self.prompt_tokens.unwrap_or(0) + self.completion_tokens.unwrap_or(0)
        })
    }
}

/// Constraint on the shape of the model's response, e.g. `{"type":
/// "json_object"}`. Carried opaquely — the core never validates it.
pub type ResponseFormat = Value;

#[derive(Debug, Clone, Default)]
pub struct CanonicalRequest {
    pub model: String,
    pub messages: Vec<CanonicalMessage>,
    pub tools: Vec<CanonicalTool>,
    pub tool_choice: Option<ToolChoice>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
    pub stop_sequences: Vec<String>,
    pub presence_penalty: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub logit_bias: Option<Value>,
    pub n: Option<u32>,
    pub max_tokens: Option<u32>,
    pub user: Option<String>,
    pub metadata: Value,
    pub response_format: Option<ResponseFormat>,
    pub stream: bool,
    pub parallel_tool_calls: Option<bool>,
    pub reasoning: Option<Thinking>,
}

impl CanonicalRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            metadata: Value::Object(Default::default()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct CanonicalResponse {
    pub id: String,
    pub model: String,
    pub messages: Vec<CanonicalMessage>,
    pub finish_reason: Option<FinishReason>,
    pub stop_sequence: Option<String>,
    pub usage: Option<TokenUsage>,
    pub success: bool,
    pub thinking: Option<Thinking>,
}

impl CanonicalResponse {
    /// The single materialized message builders most often want:
    /// choice 0 / the first output message.
    pub fn primary_message(&self) -> Option<&CanonicalMessage> {
        self.messages.first()
    }
}

/// Streaming event emitted by transducers and consumed by the
/// aggregator. Ordering within a stream is significant; `message_stop`
/// is always last.
#[derive(Debug, Clone)]
pub enum CanonicalEvent {
    MessageStart { id: String, model: String },
    RoleDelta { role: Role },
    TextDelta { text: String },
    Image { url: String, media_type: Option<String> },
    ToolStart { index: usize, id: String, name: String },
    ToolDelta { index: usize, arguments_fragment: String },
    ToolStop { index: usize },
    Usage { usage: TokenUsage },
    Finish { reason: FinishReason, stop_sequence: Option<String> },
    MessageStop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_as_value_defaults_empty_to_object() {
        let call = CanonicalToolCall {
            id: "t1".into(),
            index: 0,
            name: "search".into(),
            arguments: String::new(),
        };
        assert_eq!(call.as_value(), Some(Value::Object(Default::default())));
    }

    #[test]
    fn sync_tool_call_projections_fills_both_directions() {
        let mut msg = CanonicalMessage::new(Role::Assistant);
        msg.tool_calls.push(CanonicalToolCall {
            id: "t1".into(),
            index: 0,
            name: "search".into(),
            arguments: "{}".into(),
        });
        msg.sync_tool_call_projections();
        assert!(msg
            .content
            .iter()
            .any(|c| matches!(c, CanonicalContent::ToolUse { id, .. } if id == "t1")));
    }

    #[test]
    fn token_usage_total_derives_from_parts() {
        let usage = TokenUsage {
            prompt_tokens: Some(10),
            completion_tokens: Some(5),
            total_tokens: None,
        };
        assert_eq!(usage.total(), 15);
    }
}
