use std::path::PathBuf;
use thiserror::Error;

/// Fatal failures of a render call. Nothing is returned to the caller when
/// one of these is raised.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Template not found. Tried: {}; {}", .primary.display(), .fallback.display())]
    TemplateMissing { primary: PathBuf, fallback: PathBuf },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Write error: {0}")]
    Write(#[from] std::io::Error),

    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Template entry not found: {0}")]
    MissingEntry(String),

    #[error("failed to read template entry {entry}: {source}")]
    EntryRead {
        entry: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings root <w:settings> not found.")]
    MissingSettingsRoot,

    #[error(transparent)]
    SourceLayout(#[from] SourceLayoutError),

    #[error("Unresolved placeholders: {}", .0.join(", "))]
    UnresolvedPlaceholders(Vec<String>),
}

/// Structural violations of the `{SOURCE_1}`..`{SOURCE_5}` block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceLayoutError {
    #[error("Source placeholders must be in separate paragraphs.")]
    SharedParagraph,

    #[error("Source placeholders must appear exactly once each (SOURCE_{0} repeated).")]
    Duplicate(u8),

    #[error("Expected {{SOURCE_1}}..{{SOURCE_5}} placeholders in consecutive paragraphs (SOURCE_{0} missing).")]
    Missing(u8),

    #[error("Source placeholders must be placed in five consecutive paragraphs.")]
    NotConsecutive,

    #[error("Source placeholders were not fully replaced in the document.")]
    Leftover,
}

pub type RenderResult<T> = Result<T, RenderError>;
