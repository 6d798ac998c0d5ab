//! The six literal end-to-end scenarios from spec.md §8, exercised
//! through the public crate API rather than per-module unit tests.
//! Mirrors the pack's `rhernaus-borg` convention of a top-level
//! `tests/` directory for cross-module scenarios (see SPEC_FULL.md §8).

use llm_proxy_core::adapters::{AnthropicMessagesAdapter, ChatCompletionsAdapter, FormatAdapter};
use serde_json::Value;

#[test]
fn scenario_1_chat_completions_to_anthropic_request() {
    let cc = ChatCompletionsAdapter::default();
    let anthropic = AnthropicMessagesAdapter::default();

    let body = br#"{
        "model": "gpt-5",
        "messages": [
            {"role": "system", "content": "You are helpful"},
            {"role": "user", "content": [{"type": "text", "text": "Hello"}]}
        ],
        "temperature": 0.4,
        "max_tokens": 128,
        "user": "tester"
    }"#;

    let canonical = cc.parse_request(body).unwrap();
    let rendered = anthropic.build_request(&canonical).unwrap();
    let value: Value = serde_json::from_slice(&rendered).unwrap();

    assert_eq!(value["model"], "gpt-5");
    assert_eq!(value["max_tokens"], 128);
    assert_eq!(value["temperature"], 0.4);
    assert_eq!(value["system"], "You are helpful");
    assert_eq!(value["metadata"]["user_id"], "tester");
    assert_eq!(value["messages"][0]["role"], "user");
    assert_eq!(value["messages"][0]["content"][0]["type"], "text");
    assert_eq!(value["messages"][0]["content"][0]["text"], "Hello");
}

#[test]
fn scenario_2_anthropic_to_chat_completions_response() {
    let anthropic = AnthropicMessagesAdapter::default();
    let cc = ChatCompletionsAdapter::default();

    let body = br#"{
        "id": "msg_123",
        "role": "assistant",
        "model": "claude-sonnet",
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 10, "output_tokens": 5},
        "content": [{"type": "text", "text": "Hello OpenAI"}]
    }"#;

    let canonical = anthropic.parse_response(body).unwrap();
    let rendered = cc.build_response(&canonical).unwrap();
    let value: Value = serde_json::from_slice(&rendered).unwrap();

    assert_eq!(value["choices"][0]["finish_reason"], "stop");
    assert_eq!(value["choices"][0]["message"]["content"], "Hello OpenAI");
    assert_eq!(value["usage"]["total_tokens"], 15);
}

#[test]
fn scenario_3_chat_completions_to_responses_streaming() {
    use llm_proxy_core::transducer::cc_to_responses::ChatCompletionsToResponses;
    use llm_proxy_core::transducer::sse::SseDecoder;
    use llm_proxy_core::transducer::Transducer;

    let mut transducer = ChatCompletionsToResponses::new();
    let mut decoder = SseDecoder::new();
    let mut out = Vec::new();

    let chunks = [
        "data: {\"id\":\"c1\",\"model\":\"gpt-5\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hello\"}}]}\n\n",
        "data: {\"id\":\"c1\",\"model\":\"gpt-5\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\" world\"}}]}\n\n",
        "data: {\"id\":\"c1\",\"model\":\"gpt-5\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    ];
    for chunk in chunks {
        for event in decoder.push(chunk.as_bytes()).unwrap() {
            out.extend(transducer.feed(event).unwrap());
        }
    }
    out.extend(transducer.finish());

    let text = String::from_utf8(out).unwrap();
    let frames: Vec<&str> = text.split("\n\n").filter(|s| !s.is_empty()).collect();

    assert_eq!(frames.iter().filter(|f| f.contains("response.created")).count(), 1);
    let delta_frames: Vec<&&str> = frames.iter().filter(|f| f.contains("response.output_text.delta")).collect();
    assert_eq!(delta_frames.len(), 2);
    assert!(delta_frames[0].contains("\"delta\":\"Hello\""));
    assert!(delta_frames[1].contains("\"delta\":\" world\""));
    assert!(text.contains("response.completed"));
    assert!(text.contains("\"finish_reason\":\"stop\""));
}

#[test]
fn scenario_4_anthropic_to_chat_completions_tool_call_streaming() {
    use llm_proxy_core::transducer::anthropic_to_cc::AnthropicToChatCompletions;
    use llm_proxy_core::transducer::{RawSseEvent, Transducer};

    let mut transducer = AnthropicToChatCompletions::new();
    let mut out = Vec::new();

    let events = [
        ("message_start", r#"{"message":{"id":"msg_1","model":"claude-test"}}"#),
        (
            "content_block_start",
            r#"{"index":0,"content_block":{"type":"tool_use","id":"tool_1","name":"search"}}"#,
        ),
        (
            "content_block_delta",
            r#"{"index":0,"delta":{"type":"input_json_delta","partial_json":"{\"q\":\"x\"}"}}"#,
        ),
        ("message_delta", r#"{"delta":{"stop_reason":"tool_use"}}"#),
        ("message_stop", "{}"),
    ];
    for (name, data) in events {
        out.extend(
            transducer
                .feed(RawSseEvent {
                    event: Some(name.to_string()),
                    data: data.to_string(),
                })
                .unwrap(),
        );
    }

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("\"role\":\"assistant\""));
    assert!(text.contains("\"id\":\"tool_1\""));
    assert!(text.contains("\"name\":\"search\""));
    assert!(text.contains("{\\\"q\\\":\\\"x\\\"}") || text.contains(r#"{"q":"x"}"#));
    assert!(text.contains("\"finish_reason\":\"tool_calls\""));
    assert!(text.trim_end().ends_with("data: [DONE]"));
}

#[test]
fn scenario_5_chat_completions_tool_call_to_responses_non_stream() {
    use llm_proxy_core::adapters::ResponsesAdapter;

    let cc = ChatCompletionsAdapter::default();
    let responses = ResponsesAdapter::default();

    let body = br#"{
        "id": "chatcmpl-1",
        "model": "gpt-5",
        "choices": [{
            "index": 0,
            "finish_reason": "tool_calls",
            "message": {
                "role": "assistant",
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "search", "arguments": "{\"q\":\"weather\"}"}
                }]
            }
        }]
    }"#;

    let canonical = cc.parse_response(body).unwrap();
    let rendered = responses.build_response(&canonical).unwrap();
    let value: Value = serde_json::from_slice(&rendered).unwrap();

    let last = value["output"].as_array().unwrap().last().unwrap();
    assert_eq!(last["type"], "function_call");
    assert_eq!(last["name"], "search");
    assert_eq!(last["arguments"], r#"{"q":"weather"}"#);
}

#[test]
fn scenario_6_python_literal_tool_arguments_are_repaired() {
    use llm_proxy_core::mappers::json_repair::repair_python_literal;

    let raw = "{'path': '/tmp', 'recursive': True}";
    let repaired = repair_python_literal(raw).expect("should repair into valid JSON");
    let value: Value = serde_json::from_str(&repaired).unwrap();

    assert_eq!(value["path"], "/tmp");
    assert_eq!(value["recursive"], true);

    let unrepairable = "definitely not json and not python either {{{";
    assert_eq!(repair_python_literal(unrepairable), None);
}
