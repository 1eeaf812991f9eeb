//! 类型模块：聊天消息与补全请求/响应的数据结构。
//!
//! # Types Module
//!
//! Wire types for the chat completion endpoint, plus the cache-key derivation the
//! semantic cache relies on.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Chat message with role and text-or-parts content |
//! | [`ContentPart`] | Text or image-URL part of a multimodal message |
//! | [`ChatCompletionRequest`] | Request body for `/chat/completions` |
//! | [`ChatCompletionResponse`] | Response body, the value the cache stores |
//!
//! ```rust
//! use groq_client::types::{fingerprint, ContentPart, Message};
//!
//! let messages = vec![
//!     Message::system("Answer briefly."),
//!     Message::user_parts(vec![
//!         ContentPart::text("What is in"),
//!         ContentPart::image_url("https://example.com/cat.png"),
//!         ContentPart::text("this picture?"),
//!     ]),
//! ];
//! assert_eq!(fingerprint(&messages).as_deref(), Some("What is in this picture?"));
//! ```

pub mod completion;
pub mod message;

pub use completion::{ChatCompletionRequest, ChatCompletionResponse, Choice, Usage};
pub use message::{fingerprint, ContentPart, ImageUrl, Message, MessageContent, MessageRole};
