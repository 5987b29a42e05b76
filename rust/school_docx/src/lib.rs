//! Renders school research-project payloads into a `.docx` template.
//!
//! The template carries `{KEY}` placeholders (title page, chapters, intro,
//! conclusion, appendices) and five `{SOURCE_n}` bibliography paragraphs.
//! [`render_payload`] maps a [`Payload`] onto those keys, fills a copy of the
//! cached template and returns the new document bytes together with any
//! warnings about missing or overflowing content.

pub mod blocks;
pub mod config;
pub mod data;
pub mod delivery;
pub mod error;
pub mod normalize;
pub mod package;
pub mod payload;
pub mod render;
pub mod resolve;
pub mod scaffold;
pub mod sources;
pub mod xml;

pub use config::EngineConfig;
pub use data::{build_template_data, Diagnostics, TemplateData, Warning};
pub use delivery::{export, DocxResponse, ExportError, PayloadError};
pub use error::{RenderError, RenderResult, SourceLayoutError};
pub use package::TemplateCache;
pub use payload::Payload;
pub use render::{render, render_payload, RenderOptions, RenderOutput};
