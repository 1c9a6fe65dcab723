//! Sitesmith Gateway: the single point of contact with the text provider
//!
//! Owns request shaping (with a cache hint on the system block), the retry
//! policy, buffered and incremental response modes, and the two tolerant
//! extractors the stages use to coerce model output into shape.

pub mod client;
pub mod config;
pub mod extract;
pub mod mock;
pub mod retry;
pub mod sse;

pub use client::{call_structured, AnthropicGateway, CallOptions, LlmGateway, Message, Role};
pub use config::{GatewayConfig, SUPPORTED_MODELS};
pub use extract::{extract_json_payload, extract_markup, has_document_marker, parse_structured};
pub use mock::{MockGateway, RecordedCall};
pub use retry::RetryPolicy;
pub use sse::{SseDecoder, Usage};
