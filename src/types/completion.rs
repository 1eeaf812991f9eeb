//! Chat completion request/response bodies.

use super::message::Message;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    pub model: String,
    #[serde(default)]
    pub usage: Usage,
    pub choices: Vec<Choice>,
}

impl ChatCompletionResponse {
    /// Text of the first choice, if it is plain text.
    pub fn first_text(&self) -> Option<&str> {
        self.choices.first().and_then(|c| match &c.message.content {
            super::MessageContent::Text(t) => Some(t.as_str()),
            super::MessageContent::Parts(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: Message,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_groq_response() {
        let body = r#"{
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "llama3-8b-8192",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Ankara"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 2, "total_tokens": 14},
            "x_groq": {"id": "req_1"}
        }"#;
        let resp: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.first_text(), Some("Ankara"));
        assert_eq!(resp.usage.total_tokens, 14);
    }

    #[test]
    fn test_request_skips_unset_options() {
        let req = ChatCompletionRequest::new("llama3-8b-8192", vec![Message::user("hi")]);
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert!(json.get("temperature").is_none());
        let json = serde_json::to_value(req.with_max_tokens(16)).unwrap();
        assert_eq!(json["max_tokens"], 16);
    }
}
