//! Sitesmith Stages: the four generating stages and the orchestrator
//!
//! # Pipeline Flow
//!
//! ```text
//! prompt → Intent → Design ─┬─→ Codegen → Quality → PipelineResult
//!                  Content ─┘
//!            (tier decides which of these hit the network)
//! ```
//!
//! Every stage takes the gateway as `&dyn LlmGateway`, so the same code runs
//! against the provider and against `MockGateway` in tests.

pub mod codegen;
pub mod content;
pub mod intent;
pub mod pipeline;
pub mod prompts;
pub mod style;
pub mod themes;

pub use codegen::{ensure_document, generate_document, generate_document_streaming, iterate_document};
pub use content::{content_plan_from_intent, default_layout, generate_content_plan, thread_intent_context};
pub use intent::{classify_intent, extract_business_name, fallback_intent};
pub use pipeline::{IterateOutput, Pipeline};
pub use prompts::PromptRenderer;
pub use style::{generate_style_system, is_concrete_color};
pub use themes::{template_style_system, StyleLibrary};
