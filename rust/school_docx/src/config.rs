//! Engine configuration.
//!
//! `defaults/school_docx.default.toml` is embedded so the binary and the docs
//! agree on defaults. A user TOML file and `SCHOOL_DOCX__<SECTION>__<KEY>`
//! environment variables are layered on top by [`load`].

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_TOML: &str = include_str!("../defaults/school_docx.default.toml");

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    pub template: TemplateConfig,
    pub sources: SourcesConfig,
    pub tables: TableStyle,
}

/// Candidate template locations, tried in order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TemplateConfig {
    pub primary: PathBuf,
    pub fallback: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourcesConfig {
    pub max_entries: usize,
}

/// Run formatting forced onto every table in the rendered document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TableStyle {
    /// `w:sz` value, in half-points.
    pub font_size_half_points: u32,
    /// `w:color` value, hex RGB without `#`.
    pub font_color: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            template: TemplateConfig::default(),
            sources: SourcesConfig { max_entries: 20 },
            tables: TableStyle::default(),
        }
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            primary: PathBuf::from("ffff/school_project_template_v2.docx"),
            fallback: PathBuf::from("../ffff/school_project_template_v2.docx"),
        }
    }
}

impl Default for TableStyle {
    fn default() -> Self {
        Self {
            font_size_half_points: 28,
            font_color: "000000".to_string(),
        }
    }
}

/// Built-in defaults, then `user_file` if given, then the environment.
pub fn load(user_file: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let mut builder =
        Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
    if let Some(path) = user_file {
        builder = builder.add_source(File::from(path).format(FileFormat::Toml));
    }
    builder
        .add_source(Environment::with_prefix("SCHOOL_DOCX").separator("__"))
        .build()?
        .try_deserialize()
}
