//! Template rendering: settings, sources, TOC, placeholders, repack.

use crate::config::{EngineConfig, TableStyle};
use crate::data::{build_template_data, TemplateData, Warning, DEFAULT_MAX_SOURCES};
use crate::error::{RenderError, RenderResult};
use crate::package::{DocxPackage, TemplateCache};
use crate::payload::Payload;
use crate::resolve::{ensure_resolved, resolve_placeholders};
use crate::sources::render_sources;
use crate::xml::XmlTree;

pub const DOCUMENT_ENTRY: &str = "word/document.xml";
pub const SETTINGS_ENTRY: &str = "word/settings.xml";

const EMPTY_SETTINGS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<w:settings xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"></w:settings>"#,
);

// Children of w:settings that come after w:updateFields.
const AFTER_UPDATE_FIELDS: &[&str] = &[
    "w:hdrShapeDefaults",
    "w:footnotePr",
    "w:endnotePr",
    "w:compat",
    "w:docVars",
    "w:rsids",
    "m:mathPr",
    "w:attachedSchema",
    "w:themeFontLang",
    "w:clrSchemeMapping",
    "w:doNotIncludeSubdocsInStats",
    "w:doNotAutoCompressPictures",
    "w:forceUpgrade",
    "w:captions",
    "w:readModeInkLockDown",
    "w:smartTagType",
    "sl:schemaLibrary",
    "w:shapeDefaults",
    "w:doNotEmbedSmartTags",
    "w:decimalSymbol",
    "w:listSeparator",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub max_sources: usize,
    pub table_style: TableStyle,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_sources: DEFAULT_MAX_SOURCES,
            table_style: TableStyle::default(),
        }
    }
}

impl From<&EngineConfig> for RenderOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_sources: config.sources.max_entries,
            table_style: config.tables.clone(),
        }
    }
}

/// Sets every `w:updateFields` to true, adding one when there is none, so
/// Word recomputes fields such as the table of contents on open.
pub fn enable_update_fields(settings_xml: &str) -> RenderResult<String> {
    let mut tree = XmlTree::parse(settings_xml)?;
    let root = tree
        .elements_named(tree.root(), "w:settings")
        .first()
        .copied()
        .ok_or(RenderError::MissingSettingsRoot)?;

    let existing = tree.elements_named(root, "w:updateFields");
    if existing.is_empty() {
        let node = tree.create_element("w:updateFields", &[("w:val", "true")]);
        tree.insert_ordered(root, node, AFTER_UPDATE_FIELDS);
    } else {
        for node in existing {
            tree.set_attr(node, "w:val", "true");
        }
    }
    Ok(tree.to_xml())
}

/// Flags the `begin` field character of every TOC field as dirty. Returns
/// the number of fields marked.
pub fn mark_toc_fields_dirty(tree: &mut XmlTree) -> usize {
    let mut marked = 0;
    for paragraph in tree.elements_named(tree.root(), "w:p") {
        let has_toc = tree
            .elements_named(paragraph, "w:instrText")
            .into_iter()
            .any(|instr| tree.text_content(instr).contains("TOC"));
        if !has_toc {
            continue;
        }
        let begin = tree
            .elements_named(paragraph, "w:fldChar")
            .into_iter()
            .find(|&field| tree.attr(field, "w:fldCharType") == Some("begin"));
        if let Some(begin) = begin {
            tree.set_attr(begin, "w:dirty", "true");
            marked += 1;
        }
    }
    marked
}

/// Renders `data` into a copy of `template`. The template bytes are only
/// read.
pub fn render(template: &[u8], data: &TemplateData, options: &RenderOptions) -> RenderResult<Vec<u8>> {
    let mut package = DocxPackage::open(template)?;

    let settings = if package.has_entry(SETTINGS_ENTRY) {
        package.read_text(SETTINGS_ENTRY)?
    } else {
        tracing::debug!("template has no settings part, creating one");
        EMPTY_SETTINGS.to_string()
    };
    package.set_text(SETTINGS_ENTRY, enable_update_fields(&settings)?);

    let document = package.read_text(DOCUMENT_ENTRY)?;
    let mut tree = XmlTree::parse(&document)?;
    render_sources(&mut tree, &data.sources, options.max_sources)?;
    let toc_fields = mark_toc_fields_dirty(&mut tree);
    resolve_placeholders(&mut tree, data, &options.table_style);
    tracing::debug!(toc_fields, "document tree updated");

    let xml = tree.to_xml();
    ensure_resolved(&xml)?;
    package.set_text(DOCUMENT_ENTRY, xml);
    package.finish()
}

/// A rendered document plus the warnings collected while mapping the
/// payload.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub bytes: Vec<u8>,
    pub warnings: Vec<Warning>,
}

pub fn render_payload(
    cache: &TemplateCache,
    payload: &Payload,
    config: &EngineConfig,
) -> RenderResult<RenderOutput> {
    let (data, diagnostics) = build_template_data(payload, config.sources.max_entries);
    let template = cache.load()?;
    let bytes = render(&template, &data, &RenderOptions::from(config))?;
    if diagnostics.is_empty() {
        tracing::info!(bytes = bytes.len(), "document rendered");
    } else {
        tracing::info!(
            bytes = bytes.len(),
            warnings = diagnostics.warnings().len(),
            "document rendered with warnings"
        );
    }
    Ok(RenderOutput {
        bytes,
        warnings: diagnostics.into_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const W: &str = "xmlns:w=\"urn:w\"";

    fn package(entries: &[(&str, String)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, text) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(text.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn sources_block() -> String {
        (1..=5)
            .map(|n| format!("<w:p><w:r><w:t>{{SOURCE_{n}}}</w:t></w:r></w:p>"))
            .collect()
    }

    #[test]
    fn update_fields_is_added_before_later_siblings() {
        let xml = format!("<w:settings {W}><w:zoom w:percent=\"100\"/><w:compat/></w:settings>");
        assert_eq!(
            enable_update_fields(&xml).unwrap(),
            format!(
                "<w:settings {W}><w:zoom w:percent=\"100\"/><w:updateFields w:val=\"true\"/><w:compat/></w:settings>"
            )
        );
    }

    #[test]
    fn existing_update_fields_is_switched_on() {
        let xml = format!("<w:settings {W}><w:updateFields w:val=\"false\"/></w:settings>");
        assert_eq!(
            enable_update_fields(&xml).unwrap(),
            format!("<w:settings {W}><w:updateFields w:val=\"true\"/></w:settings>")
        );
    }

    #[test]
    fn settings_without_root_is_an_error() {
        assert!(matches!(
            enable_update_fields("<w:other/>"),
            Err(RenderError::MissingSettingsRoot)
        ));
    }

    #[test]
    fn toc_begin_field_is_marked_dirty() {
        let mut tree = XmlTree::parse(
            "<w:body><w:p><w:r><w:fldChar w:fldCharType=\"begin\"/></w:r>\
             <w:r><w:instrText xml:space=\"preserve\"> TOC \\o \"1-3\" </w:instrText></w:r>\
             <w:r><w:fldChar w:fldCharType=\"end\"/></w:r></w:p>\
             <w:p><w:r><w:fldChar w:fldCharType=\"begin\"/></w:r><w:r><w:instrText>PAGE</w:instrText></w:r></w:p></w:body>",
        )
        .unwrap();
        assert_eq!(mark_toc_fields_dirty(&mut tree), 1);

        let fields = tree.elements_named(tree.root(), "w:fldChar");
        assert_eq!(tree.attr(fields[0], "w:dirty"), Some("true"));
        assert_eq!(tree.attr(fields[1], "w:dirty"), None);
        assert_eq!(tree.attr(fields[2], "w:dirty"), None);
    }

    #[test]
    fn render_creates_settings_and_fills_document() {
        let document = format!(
            "<w:document {W}><w:body><w:p><w:r><w:t>{{WORK_TITLE}}</w:t></w:r></w:p>{}</w:body></w:document>",
            sources_block()
        );
        let template = package(&[(DOCUMENT_ENTRY, document)]);
        let mut data = TemplateData::new();
        data.insert("WORK_TITLE", "Вода");
        data.sources = vec!["Книга".to_string()];

        let output = render(&template, &data, &RenderOptions::default()).unwrap();
        let mut rendered = DocxPackage::open(&output).unwrap();
        assert!(rendered
            .read_text(SETTINGS_ENTRY)
            .unwrap()
            .contains("<w:updateFields w:val=\"true\"/>"));
        assert_eq!(
            rendered.read_text(DOCUMENT_ENTRY).unwrap(),
            format!(
                "<w:document {W}><w:body><w:p><w:r><w:t>Вода</w:t></w:r></w:p>\
                 <w:p><w:r><w:t>Книга</w:t></w:r></w:p></w:body></w:document>"
            )
        );
    }

    #[test]
    fn unknown_placeholder_fails_the_render() {
        let document = format!(
            "<w:document {W}><w:body><w:p><w:r><w:t>{{NOT_A_KEY}}</w:t></w:r></w:p>{}</w:body></w:document>",
            sources_block()
        );
        let template = package(&[(DOCUMENT_ENTRY, document)]);
        match render(&template, &TemplateData::new(), &RenderOptions::default()) {
            Err(RenderError::UnresolvedPlaceholders(tokens)) => assert_eq!(tokens, ["{NOT_A_KEY}"]),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn missing_document_entry_is_reported() {
        let template = package(&[("word/styles.xml", "<w:styles/>".to_string())]);
        assert!(matches!(
            render(&template, &TemplateData::new(), &RenderOptions::default()),
            Err(RenderError::MissingEntry(name)) if name == DOCUMENT_ENTRY
        ));
    }
}
