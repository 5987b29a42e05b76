//! Maps a [`Payload`] onto the template's placeholder vocabulary.

use chrono::Datelike;
use std::collections::BTreeMap;
use std::fmt;

use crate::normalize::{
    normalize_chapter_title, normalize_section_title, normalize_single_line,
    strip_duplicate_leading_heading, strip_markdown_artifacts,
};
use crate::payload::Payload;

/// Substituted for anything the payload did not provide.
pub const DASH: &str = "—";

pub const CHAPTER_SLOTS: usize = 2;
pub const SECTION_SLOTS: usize = 4;
pub const APPENDIX_SLOTS: usize = 2;
pub const DEFAULT_MAX_SOURCES: usize = 20;

/// Separator between appendix entries folded into `APP2_CONTENT`.
pub const APPENDIX_DELIMITER: &str = "\n\n---\n\n";

/// Resolved placeholder values plus the bibliography list, which is not a
/// placeholder key and is consumed by the source-list renderer only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateData {
    values: BTreeMap<String, String>,
    pub sources: Vec<String>,
}

impl TemplateData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Non-fatal conditions found while building the data map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    MissingField { key: String },
    TooFewChapters { found: usize },
    ExtraChapters { found: usize },
    TooFewSections { chapter: usize, found: usize },
    ExtraSections { chapter: usize, found: usize },
    BibliographyTruncated { found: usize, kept: usize },
    AppendixFolded { found: usize },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingField { key } => write!(f, "Missing data for {key}"),
            Warning::TooFewChapters { found } => write!(
                f,
                "Chapters length is {found}; template expects {CHAPTER_SLOTS} chapters."
            ),
            Warning::ExtraChapters { found } => write!(
                f,
                "Chapters length is {found}; only the first {CHAPTER_SLOTS} are rendered."
            ),
            Warning::TooFewSections { chapter, found } => write!(
                f,
                "Chapter {chapter} has {found} sections; template expects {SECTION_SLOTS} sections."
            ),
            Warning::ExtraSections { chapter, found } => write!(
                f,
                "Chapter {chapter} has {found} sections; only the first {SECTION_SLOTS} are rendered."
            ),
            Warning::BibliographyTruncated { found, kept } => write!(
                f,
                "Bibliography has {found} entries; only the first {kept} are rendered."
            ),
            Warning::AppendixFolded { found } => write!(
                f,
                "Appendix has {found} entries; extra entries are merged into Appendix {APPENDIX_SLOTS}."
            ),
        }
    }
}

/// Collected warnings. Each one is also logged when recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn contains(&self, warning: &Warning) -> bool {
        self.warnings.contains(warning)
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_vec(self) -> Vec<Warning> {
        self.warnings
    }
}

fn single_line_or(value: Option<&str>, fallback: &str) -> String {
    let normalized = normalize_single_line(value.unwrap_or_default());
    if normalized.is_empty() {
        fallback.to_string()
    } else {
        normalized
    }
}

fn or_dash(value: String) -> String {
    if value.is_empty() {
        DASH.to_string()
    } else {
        value
    }
}

fn check_structure(payload: &Payload, max_sources: usize, diagnostics: &mut Diagnostics) {
    let chapters = payload.chapters.len();
    if chapters < CHAPTER_SLOTS {
        diagnostics.warn(Warning::TooFewChapters { found: chapters });
    } else if chapters > CHAPTER_SLOTS {
        diagnostics.warn(Warning::ExtraChapters { found: chapters });
    }

    for (index, chapter) in payload.chapters.iter().take(CHAPTER_SLOTS).enumerate() {
        let found = chapter.sections.len();
        let chapter = index + 1;
        if found < SECTION_SLOTS {
            diagnostics.warn(Warning::TooFewSections { chapter, found });
        } else if found > SECTION_SLOTS {
            diagnostics.warn(Warning::ExtraSections { chapter, found });
        }
    }

    let bibliography = payload.bibliography.len();
    if bibliography > max_sources {
        diagnostics.warn(Warning::BibliographyTruncated {
            found: bibliography,
            kept: max_sources,
        });
    }

    if payload.appendix.len() > APPENDIX_SLOTS {
        diagnostics.warn(Warning::AppendixFolded {
            found: payload.appendix.len(),
        });
    }
}

/// Builds the placeholder map. Never fails: gaps become [`DASH`] and a
/// warning in the returned [`Diagnostics`].
pub fn build_template_data(payload: &Payload, max_sources: usize) -> (TemplateData, Diagnostics) {
    let mut diagnostics = Diagnostics::default();
    check_structure(payload, max_sources, &mut diagnostics);

    let title = &payload.title;
    let mut data = TemplateData::new();

    let organization = title.organization.as_deref().unwrap_or_default();
    let mut organization_lines = organization.lines();
    let org_name = normalize_single_line(organization_lines.next().unwrap_or_default());
    let org_address = normalize_single_line(organization_lines.next().unwrap_or_default());

    let current_year = chrono::Local::now().year().to_string();
    let subject = title.subject.as_deref().or(title.teacher_subject.as_deref());

    data.insert("WORK_TITLE", single_line_or(payload.topic.as_deref(), DASH));
    data.insert("STUDENT_NAME", single_line_or(title.student.as_deref(), DASH));
    data.insert("CLASS", single_line_or(title.class.as_deref(), DASH));
    data.insert("SUPERVISOR_NAME", single_line_or(title.teacher.as_deref(), DASH));
    data.insert("SUBJECT", single_line_or(subject, DASH));
    data.insert("CITY", single_line_or(title.city.as_deref(), DASH));
    data.insert("YEAR", single_line_or(title.year.as_deref(), &current_year));
    data.insert(
        "SCHOOL_NAME",
        single_line_or(title.school_name.as_deref(), &or_dash(org_name)),
    );
    data.insert(
        "SCHOOL_ADDRESS",
        single_line_or(title.school_address.as_deref(), &or_dash(org_address)),
    );
    data.insert(
        "INTRO",
        or_dash(strip_markdown_artifacts(payload.intro_text.as_deref().unwrap_or_default())),
    );
    data.insert(
        "CONCLUSION",
        or_dash(strip_markdown_artifacts(
            payload.conclusion_text.as_deref().unwrap_or_default(),
        )),
    );

    for chapter_index in 0..CHAPTER_SLOTS {
        let chapter_number = chapter_index + 1;
        let chapter = payload.chapters.get(chapter_index);

        let title_key = format!("CH{chapter_number}_TITLE");
        let chapter_title = chapter
            .and_then(|c| c.title.as_deref())
            .map(|t| normalize_chapter_title(&strip_markdown_artifacts(t)))
            .unwrap_or_default();
        if chapter_title.is_empty() {
            diagnostics.warn(Warning::MissingField { key: title_key.clone() });
        }
        data.insert(title_key, or_dash(chapter_title));

        for section_index in 0..SECTION_SLOTS {
            let section_number = section_index + 1;
            let section = chapter.and_then(|c| c.sections.get(section_index));
            let title_key = format!("CH{chapter_number}_{section_number}_TITLE");
            let text_key = format!("CH{chapter_number}_{section_number}_TEXT");

            let section_title = section
                .and_then(|s| s.title.as_deref())
                .map(|t| normalize_section_title(&strip_markdown_artifacts(t)))
                .unwrap_or_default();
            let section_text = section
                .and_then(|s| s.content.as_deref())
                .unwrap_or_default();

            if section_title.is_empty() {
                diagnostics.warn(Warning::MissingField { key: title_key.clone() });
            }
            if section_text.is_empty() {
                diagnostics.warn(Warning::MissingField { key: text_key.clone() });
            }

            let body =
                strip_duplicate_leading_heading(&strip_markdown_artifacts(section_text), &section_title);
            data.insert(title_key, or_dash(section_title));
            data.insert(text_key, or_dash(body));
        }
    }

    insert_appendix(payload, &mut data);

    data.sources = payload
        .bibliography
        .iter()
        .map(|entry| normalize_single_line(entry.as_deref().unwrap_or_default()))
        .filter(|entry| !entry.is_empty())
        .take(max_sources)
        .collect();

    (data, diagnostics)
}

/// The first two entries fill `APP1_*`/`APP2_*`; later ones are appended to
/// `APP2_CONTENT` with [`APPENDIX_DELIMITER`] between them.
fn insert_appendix(payload: &Payload, data: &mut TemplateData) {
    let entries: Vec<(String, String)> = payload
        .appendix
        .iter()
        .map(|entry| entry.to_title_and_content())
        .collect();
    let slot = |index: usize| -> (String, String) {
        entries
            .get(index)
            .map(|(title, content)| {
                (
                    normalize_single_line(&strip_markdown_artifacts(title)),
                    strip_markdown_artifacts(content),
                )
            })
            .unwrap_or_default()
    };

    let (app1_title, app1_content) = slot(0);
    let (app2_title, mut app2_content) = slot(1);

    let extra = entries
        .iter()
        .skip(APPENDIX_SLOTS)
        .map(|(title, content)| {
            [strip_markdown_artifacts(title), strip_markdown_artifacts(content)]
                .into_iter()
                .filter(|piece| !piece.is_empty())
                .collect::<Vec<_>>()
                .join("\n\n")
        })
        .filter(|entry| !entry.is_empty())
        .collect::<Vec<_>>()
        .join(APPENDIX_DELIMITER);

    if !extra.is_empty() {
        app2_content = if app2_content.is_empty() {
            extra
        } else {
            format!("{app2_content}{APPENDIX_DELIMITER}{extra}")
        };
    }

    data.insert("APP1_TITLE", or_dash(app1_title));
    data.insert("APP1_CONTENT", or_dash(app1_content));
    data.insert("APP2_TITLE", or_dash(app2_title));
    data.insert("APP2_CONTENT", or_dash(app2_content));
}
