//! A minimal template carrying the full placeholder vocabulary.
//!
//! Useful as a starting point for a real school template and as a fixture:
//! it has a title page with inline placeholders (some split across runs the
//! way Word saves them), a TOC field, block placeholders for every body
//! text, five bibliography paragraphs and two appendices.

use std::io::{Cursor, Write};

use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::data::{CHAPTER_SLOTS, SECTION_SLOTS};
use crate::error::RenderResult;
use crate::sources::SOURCE_SLOTS;

/// Paragraph style id used for bibliography entries.
pub const BIBLIOGRAPHY_STYLE: &str = "a";

const STARTER_SETTINGS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:settings xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:zoom w:percent="100"/><w:defaultTabStop w:val="708"/><w:characterSpacingControl w:val="doNotCompress"/><w:compat><w:compatSetting w:name="compatibilityMode" w:uri="http://schemas.microsoft.com/office/word" w:val="15"/></w:compat></w:settings>"#;

#[derive(Debug, Clone, Copy)]
enum Style {
    Normal,
    Centered,
    Title,
    Heading1,
    Heading2,
    Bibliography,
}

impl Style {
    fn properties(self) -> &'static str {
        match self {
            Style::Normal => "",
            Style::Centered => r#"<w:pPr><w:jc w:val="center"/></w:pPr>"#,
            Style::Title => r#"<w:pPr><w:pStyle w:val="Title"/><w:jc w:val="center"/></w:pPr>"#,
            Style::Heading1 => r#"<w:pPr><w:pStyle w:val="Heading1"/></w:pPr>"#,
            Style::Heading2 => r#"<w:pPr><w:pStyle w:val="Heading2"/></w:pPr>"#,
            Style::Bibliography => r#"<w:pPr><w:pStyle w:val="a"/></w:pPr>"#,
        }
    }
}

/// One paragraph; each element of `runs` becomes its own `w:r`.
fn paragraph(style: Style, runs: &[&str]) -> String {
    let mut out = String::from("<w:p>");
    out.push_str(style.properties());
    for text in runs {
        out.push_str(r#"<w:r><w:t xml:space="preserve">"#);
        out.push_str(&escape(*text));
        out.push_str("</w:t></w:r>");
    }
    out.push_str("</w:p>");
    out
}

fn toc_field() -> String {
    concat!(
        "<w:p>",
        r#"<w:r><w:fldChar w:fldCharType="begin"/></w:r>"#,
        r#"<w:r><w:instrText xml:space="preserve"> TOC \o "1-3" \h \z \u </w:instrText></w:r>"#,
        r#"<w:r><w:fldChar w:fldCharType="separate"/></w:r>"#,
        "<w:r><w:t>Обновите поле, чтобы построить оглавление.</w:t></w:r>",
        r#"<w:r><w:fldChar w:fldCharType="end"/></w:r>"#,
        "</w:p>",
    )
    .to_string()
}

fn page_break() -> &'static str {
    r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#
}

/// Body XML of the starter template.
pub fn starter_body() -> String {
    let mut body = String::new();

    body.push_str(&paragraph(Style::Centered, &["{SCHOOL_NAME}"]));
    body.push_str(&paragraph(Style::Centered, &["{SCHOOL_ADDRESS}"]));
    body.push_str(&paragraph(Style::Centered, &["Индивидуальный проект"]));
    body.push_str(&paragraph(Style::Title, &["{WORK_TITLE}"]));
    body.push_str(&paragraph(
        Style::Normal,
        &["Выполнил(а): ", "{STUDENT_", "NAME}", ", ученик(ца) ", "{CLASS}", " класса"],
    ));
    body.push_str(&paragraph(
        Style::Normal,
        &["Руководитель: {SUPERVISOR_NAME}, учитель ", "{SUBJ", "ECT}"],
    ));
    body.push_str(&paragraph(Style::Centered, &["{CITY}", ", ", "{YEAR}"]));
    body.push_str(page_break());

    body.push_str(&paragraph(Style::Heading1, &["Оглавление"]));
    body.push_str(&toc_field());
    body.push_str(page_break());

    body.push_str(&paragraph(Style::Heading1, &["Введение"]));
    body.push_str(&paragraph(Style::Normal, &["{INTRO}"]));

    for chapter in 1..=CHAPTER_SLOTS {
        let title = format!("Глава {chapter}. {{CH{chapter}_TITLE}}");
        body.push_str(&paragraph(Style::Heading1, &[title.as_str()]));
        for section in 1..=SECTION_SLOTS {
            let heading = format!("{chapter}.{section} {{CH{chapter}_{section}_TITLE}}");
            let text = format!("{{CH{chapter}_{section}_TEXT}}");
            body.push_str(&paragraph(Style::Heading2, &[heading.as_str()]));
            body.push_str(&paragraph(Style::Normal, &[text.as_str()]));
        }
    }

    body.push_str(&paragraph(Style::Heading1, &["Заключение"]));
    body.push_str(&paragraph(Style::Normal, &["{CONCLUSION}"]));

    body.push_str(&paragraph(Style::Heading1, &["Список литературы"]));
    for slot in 1..=SOURCE_SLOTS {
        let placeholder = format!("{{SOURCE_{slot}}}");
        body.push_str(&paragraph(Style::Bibliography, &[placeholder.as_str()]));
    }

    for appendix in 1..=2 {
        let title = format!("Приложение {appendix}. {{APP{appendix}_TITLE}}");
        let content = format!("{{APP{appendix}_CONTENT}}");
        body.push_str(&paragraph(Style::Heading1, &[title.as_str()]));
        body.push_str(&paragraph(Style::Normal, &[content.as_str()]));
    }

    body
}

/// Wraps body XML in a `w:document` with an A4 section.
pub fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1134" w:right="850" w:bottom="1134" w:left="1701" w:header="708" w:footer="708" w:gutter="0"/><w:cols w:space="708"/><w:docGrid w:linePitch="360"/></w:sectPr></w:body></w:document>"#
    )
}

fn content_types_xml(with_settings: bool) -> String {
    let settings = if with_settings {
        r#"<Override PartName="/word/settings.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.settings+xml"/>"#
    } else {
        ""
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>{settings}</Types>"#
    )
}

fn rels_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#
}

fn word_rels_xml(with_settings: bool) -> String {
    let settings = if with_settings {
        r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/settings" Target="settings.xml"/>"#
    } else {
        ""
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>{settings}</Relationships>"#
    )
}

fn styles_xml() -> &'static str {
    // Normal, title, two heading levels and the bibliography list style.
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:docDefaults>
    <w:rPrDefault>
      <w:rPr>
        <w:rFonts w:ascii="Times New Roman" w:hAnsi="Times New Roman" w:cs="Times New Roman"/>
        <w:sz w:val="28"/>
        <w:lang w:val="ru-RU"/>
      </w:rPr>
    </w:rPrDefault>
    <w:pPrDefault>
      <w:pPr>
        <w:spacing w:after="0" w:line="360" w:lineRule="auto"/>
      </w:pPr>
    </w:pPrDefault>
  </w:docDefaults>
  <w:style w:type="paragraph" w:default="1" w:styleId="Normal">
    <w:name w:val="Normal"/>
    <w:qFormat/>
    <w:pPr>
      <w:ind w:firstLine="709"/>
      <w:jc w:val="both"/>
    </w:pPr>
  </w:style>
  <w:style w:type="paragraph" w:styleId="Title">
    <w:name w:val="Title"/>
    <w:basedOn w:val="Normal"/>
    <w:qFormat/>
    <w:pPr>
      <w:spacing w:before="480" w:after="480"/>
      <w:ind w:firstLine="0"/>
    </w:pPr>
    <w:rPr>
      <w:b/>
      <w:sz w:val="36"/>
    </w:rPr>
  </w:style>
  <w:style w:type="paragraph" w:styleId="Heading1">
    <w:name w:val="heading 1"/>
    <w:basedOn w:val="Normal"/>
    <w:next w:val="Normal"/>
    <w:uiPriority w:val="9"/>
    <w:qFormat/>
    <w:pPr>
      <w:keepNext/>
      <w:keepLines/>
      <w:spacing w:before="240" w:after="120"/>
      <w:ind w:firstLine="0"/>
      <w:jc w:val="center"/>
      <w:outlineLvl w:val="0"/>
    </w:pPr>
    <w:rPr>
      <w:b/>
      <w:sz w:val="32"/>
    </w:rPr>
  </w:style>
  <w:style w:type="paragraph" w:styleId="Heading2">
    <w:name w:val="heading 2"/>
    <w:basedOn w:val="Normal"/>
    <w:next w:val="Normal"/>
    <w:uiPriority w:val="9"/>
    <w:qFormat/>
    <w:pPr>
      <w:keepNext/>
      <w:keepLines/>
      <w:spacing w:before="200" w:after="100"/>
      <w:outlineLvl w:val="1"/>
    </w:pPr>
    <w:rPr>
      <w:b/>
    </w:rPr>
  </w:style>
  <w:style w:type="paragraph" w:styleId="a">
    <w:name w:val="List Paragraph"/>
    <w:basedOn w:val="Normal"/>
    <w:uiPriority w:val="34"/>
    <w:qFormat/>
    <w:pPr>
      <w:ind w:left="720" w:hanging="360"/>
    </w:pPr>
  </w:style>
</w:styles>"#
}

/// Packs `body` into a `.docx`. `settings` becomes `word/settings.xml`
/// when given.
pub fn build_template(body: &str, settings: Option<&str>) -> RenderResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opt = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("[Content_Types].xml", opt)?;
    zip.write_all(content_types_xml(settings.is_some()).as_bytes())?;

    zip.start_file("_rels/.rels", opt)?;
    zip.write_all(rels_xml().as_bytes())?;

    zip.start_file("word/document.xml", opt)?;
    zip.write_all(document_xml(body).as_bytes())?;

    zip.start_file("word/_rels/document.xml.rels", opt)?;
    zip.write_all(word_rels_xml(settings.is_some()).as_bytes())?;

    zip.start_file("word/styles.xml", opt)?;
    zip.write_all(styles_xml().as_bytes())?;

    if let Some(settings) = settings {
        zip.start_file("word/settings.xml", opt)?;
        zip.write_all(settings.as_bytes())?;
    }

    Ok(zip.finish()?.into_inner())
}

pub fn starter_template() -> RenderResult<Vec<u8>> {
    build_template(&starter_body(), Some(STARTER_SETTINGS))
}
