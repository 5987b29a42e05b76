//! Template loading and `.docx` archive I/O.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::config::TemplateConfig;
use crate::error::{RenderError, RenderResult};

/// Single-slot read-through cache of the template bytes.
///
/// The first [`load`](TemplateCache::load) reads the primary path, or the
/// fallback when the primary does not exist. Later calls hand out the same
/// shared buffer until [`reset`](TemplateCache::reset). Two threads racing
/// on an empty slot may both read the file; whichever stores first wins and
/// both observe identical bytes.
#[derive(Debug)]
pub struct TemplateCache {
    primary: PathBuf,
    fallback: PathBuf,
    slot: RwLock<Option<Arc<[u8]>>>,
}

impl TemplateCache {
    pub fn new(primary: impl Into<PathBuf>, fallback: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            fallback: fallback.into(),
            slot: RwLock::new(None),
        }
    }

    pub fn from_config(config: &TemplateConfig) -> Self {
        Self::new(&config.primary, &config.fallback)
    }

    /// A cache that already holds `bytes` and has no paths to reload from.
    pub fn preloaded(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            primary: PathBuf::new(),
            fallback: PathBuf::new(),
            slot: RwLock::new(Some(bytes.into())),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn load(&self) -> RenderResult<Arc<[u8]>> {
        if let Some(bytes) = self.slot.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            return Ok(Arc::clone(bytes));
        }

        let bytes: Arc<[u8]> = match read_if_exists(&self.primary)? {
            Some(bytes) => bytes.into(),
            None => match read_if_exists(&self.fallback)? {
                Some(bytes) => {
                    tracing::debug!(path = %self.fallback.display(), "using fallback template");
                    bytes.into()
                }
                None => {
                    return Err(RenderError::TemplateMissing {
                        primary: self.primary.clone(),
                        fallback: self.fallback.clone(),
                    })
                }
            },
        };

        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(slot.get_or_insert(bytes)))
    }

    /// Drops the cached bytes; the next `load` reads from disk again.
    pub fn reset(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

fn read_if_exists(path: &Path) -> RenderResult<Option<Vec<u8>>> {
    if path.as_os_str().is_empty() {
        return Ok(None);
    }
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(RenderError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// An opened `.docx` whose text entries can be replaced or added.
///
/// Entries never written through [`set_text`](DocxPackage::set_text) are
/// copied into the output verbatim, compressed bytes included.
pub struct DocxPackage<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
    replaced: BTreeMap<String, String>,
}

impl<'a> DocxPackage<'a> {
    pub fn open(bytes: &'a [u8]) -> RenderResult<Self> {
        Ok(Self {
            archive: ZipArchive::new(Cursor::new(bytes))?,
            replaced: BTreeMap::new(),
        })
    }

    pub fn has_entry(&self, name: &str) -> bool {
        self.replaced.contains_key(name) || self.archive.file_names().any(|entry| entry == name)
    }

    pub fn read_text(&mut self, name: &str) -> RenderResult<String> {
        if let Some(text) = self.replaced.get(name) {
            return Ok(text.clone());
        }
        let mut file = match self.archive.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Err(RenderError::MissingEntry(name.to_string())),
            Err(err) => return Err(err.into()),
        };
        let mut text = String::new();
        file.read_to_string(&mut text).map_err(|source| RenderError::EntryRead {
            entry: name.to_string(),
            source,
        })?;
        Ok(text)
    }

    pub fn set_text(&mut self, name: &str, text: impl Into<String>) {
        self.replaced.insert(name.to_string(), text.into());
    }

    /// Writes the archive: original entries in their original order, then
    /// any entries that did not exist before.
    pub fn finish(mut self) -> RenderResult<Vec<u8>> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        for index in 0..self.archive.len() {
            let file = self.archive.by_index_raw(index)?;
            match self.replaced.remove(file.name()) {
                Some(text) => {
                    let name = file.name().to_string();
                    drop(file);
                    zip.start_file(name, options)?;
                    zip.write_all(text.as_bytes())?;
                }
                None => zip.raw_copy_file(file)?,
            }
        }

        for (name, text) in std::mem::take(&mut self.replaced) {
            zip.start_file(name, options)?;
            zip.write_all(text.as_bytes())?;
        }

        Ok(zip.finish()?.into_inner())
    }
}
