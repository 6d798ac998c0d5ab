//! Finish-reason normalization between the canonical set
//! `{end_turn, max_tokens, stop_sequence, tool_use}` and each family's
//! native vocabulary (spec.md §3, §4.1–§4.3).

use crate::canonical::FinishReason;

/// ChatCompletions: `stop|"" → end_turn`, `length → max_tokens`,
/// `tool_calls → tool_use`, `stop_sequence → stop_sequence`, other →
/// `end_turn`.
pub fn chat_completions_to_canonical(reason: &str) -> FinishReason {
    match reason {
        "stop" | "" => FinishReason::EndTurn,
        "length" => FinishReason::MaxTokens,
        "tool_calls" => FinishReason::ToolUse,
        "stop_sequence" => FinishReason::StopSequence,
        _ => FinishReason::EndTurn,
    }
}

pub fn canonical_to_chat_completions(reason: FinishReason) -> &'static str {
    match reason {
        FinishReason::EndTurn => "stop",
        FinishReason::MaxTokens => "length",
        FinishReason::StopSequence => "stop_sequence",
        FinishReason::ToolUse => "tool_calls",
    }
}

/// Anthropic stop-reason mapping used by the AnthropicMessages adapter
/// and the AnthropicMessages→ChatCompletions transducer.
pub fn anthropic_to_canonical(reason: &str) -> FinishReason {
    match reason {
        "max_tokens" => FinishReason::MaxTokens,
        "tool_use" => FinishReason::ToolUse,
        "stop_sequence" => FinishReason::StopSequence,
        "end_turn" | "" => FinishReason::EndTurn,
        _ => FinishReason::EndTurn,
    }
}

pub fn canonical_to_anthropic(reason: FinishReason) -> &'static str {
    match reason {
        FinishReason::EndTurn => "end_turn",
        FinishReason::MaxTokens => "max_tokens",
        FinishReason::StopSequence => "stop_sequence",
        FinishReason::ToolUse => "tool_use",
    }
}

/// Gemini's uppercase vocabulary is read-only (inbound only); there is
/// no `canonical_to_gemini` since the Gemini adapter never builds
/// requests or responses.
pub fn gemini_to_canonical(reason: &str) -> FinishReason {
    match reason {
        "STOP" => FinishReason::EndTurn,
        "MAX_TOKENS" => FinishReason::MaxTokens,
        "SAFETY" => FinishReason::EndTurn,
        "TOOL_CALLS" => FinishReason::ToolUse,
        _ => FinishReason::EndTurn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_completions_roundtrip_is_idempotent() {
        for reason in [
            FinishReason::EndTurn,
            FinishReason::MaxTokens,
            FinishReason::StopSequence,
            FinishReason::ToolUse,
        ] {
            let native = canonical_to_chat_completions(reason);
            assert_eq!(chat_completions_to_canonical(native), reason);
        }
    }

    #[test]
    fn anthropic_roundtrip_is_idempotent() {
        for reason in [
            FinishReason::EndTurn,
            FinishReason::MaxTokens,
            FinishReason::StopSequence,
            FinishReason::ToolUse,
        ] {
            let native = canonical_to_anthropic(reason);
            assert_eq!(anthropic_to_canonical(native), reason);
        }
    }

    #[test]
    fn empty_string_defaults_to_end_turn() {
        assert_eq!(chat_completions_to_canonical(""), FinishReason::EndTurn);
        assert_eq!(anthropic_to_canonical(""), FinishReason::EndTurn);
    }

    #[test]
    fn gemini_tool_calls_maps_to_tool_use() {
        assert_eq!(gemini_to_canonical("TOOL_CALLS"), FinishReason::ToolUse);
        assert_eq!(gemini_to_canonical("SAFETY"), FinishReason::EndTurn);
    }
}
