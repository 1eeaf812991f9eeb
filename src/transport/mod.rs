//! 网络传输层：限流、重试的 HTTP 执行。
//!
//! Network transport: a replayable request model, the [`HttpExecutor`] primitive, and
//! the rate-limited retrying [`HttpTransport`] built on top of it.

pub mod http;

pub use http::{
    FormPart, HttpExecutor, HttpRequest, HttpResponse, HttpTransport, RequestBody, ReqwestExecutor,
    TransportConfig, TransportError, REQUEST_ID_HEADER,
};
pub use reqwest::Method;
