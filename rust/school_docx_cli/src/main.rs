use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use school_docx::delivery::{download_filename, parse_payload};
use school_docx::{config, render_payload, scaffold, TemplateCache};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a payload JSON file into a .docx built from the template.
    Render {
        /// Payload JSON (topic, title, chapters, introText, ...).
        #[arg(long)]
        payload: PathBuf,

        /// Output .docx path. Defaults to `Проект_<topic>.docx` in the current directory.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Template to try first (overrides the configured primary path).
        #[arg(long)]
        template: Option<PathBuf>,

        /// Template to try when the first one does not exist.
        #[arg(long)]
        fallback_template: Option<PathBuf>,

        /// TOML file layered over the built-in configuration.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Write a starter template containing every placeholder.
    Scaffold {
        /// Output .docx path.
        #[arg(long)]
        out: PathBuf,
    },
}

fn write_file(out_path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out_path, bytes).with_context(|| format!("write {}", out_path.display()))
}

fn render(
    payload_path: &Path,
    out: Option<PathBuf>,
    template: Option<PathBuf>,
    fallback_template: Option<PathBuf>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load(config_path).context("load configuration")?;
    if let Some(template) = template {
        config.template.primary = template;
    }
    if let Some(fallback) = fallback_template {
        config.template.fallback = fallback;
    }

    let body = std::fs::read(payload_path)
        .with_context(|| format!("read {}", payload_path.display()))?;
    let payload = parse_payload(&body).with_context(|| format!("parse {}", payload_path.display()))?;

    let cache = TemplateCache::from_config(&config.template);
    let output = render_payload(&cache, &payload, &config).context("render document")?;

    let out = out.unwrap_or_else(|| PathBuf::from(download_filename(payload.topic.as_deref())));
    write_file(&out, &output.bytes)?;
    tracing::info!(
        path = %out.display(),
        warnings = output.warnings.len(),
        "document written"
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Render {
            payload,
            out,
            template,
            fallback_template,
            config,
        } => render(&payload, out, template, fallback_template, config.as_deref()),
        Command::Scaffold { out } => {
            let bytes = scaffold::starter_template().context("build starter template")?;
            write_file(&out, &bytes)?;
            tracing::info!(path = %out.display(), "starter template written");
            Ok(())
        }
    }
}
