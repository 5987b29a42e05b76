#![allow(dead_code)]

use school_docx::package::DocxPackage;
use school_docx::render::DOCUMENT_ENTRY;
use school_docx::resolve::paragraph_text;
use school_docx::xml::XmlTree;
use school_docx::Payload;
use serde_json::{json, Value};

pub fn sources(count: usize) -> Vec<String> {
    (1..=count)
        .map(|n| format!("Автор {n}. Название книги {n}. – М.: Просвещение, 2020."))
        .collect()
}

fn section(chapter: usize, section: usize) -> Value {
    let title = format!("{chapter}.{section} Тема {section} главы {chapter}");
    json!({
        "title": title,
        "content": format!("{title}\nТекст раздела {chapter}.{section}.\n\nВторой абзац."),
    })
}

/// A complete payload: two chapters of four sections, intro, conclusion,
/// `bibliography` entries and two appendices.
pub fn full_payload_json(bibliography: usize) -> Value {
    let chapters: Vec<Value> = (1..=2)
        .map(|chapter| {
            json!({
                "title": format!("Глава {chapter}. Содержание главы {chapter}"),
                "sections": (1..=4).map(|s| section(chapter, s)).collect::<Vec<_>>(),
            })
        })
        .collect();

    json!({
        "topic": "Влияние музыки на память",
        "title": {
            "student": "Иванов Иван",
            "class": "9Б",
            "teacher": "Петрова Анна Сергеевна",
            "teacherSubject": "биология",
            "city": "Казань",
            "year": "2024",
            "organization": "МБОУ «Лицей №1»\nул. Школьная, 1"
        },
        "introText": "Актуальность:\nМузыка окружает школьников.\n\nЦель:\nВыяснить влияние музыки.",
        "chapters": chapters,
        "conclusionText": "Гипотеза подтвердилась.",
        "bibliography": sources(bibliography),
        "appendix": [
            { "title": "Анкета", "content": "1. Слушаете ли вы музыку?\n2. Как часто?" },
            { "type": "table", "title": "Результаты", "headers": ["Группа", "Слов"], "rows": [["С музыкой", "12"], ["Без музыки", "15"]] }
        ]
    })
}

pub fn full_payload(bibliography: usize) -> Payload {
    serde_json::from_value(full_payload_json(bibliography)).expect("payload fixture deserializes")
}

pub fn document_xml(docx: &[u8]) -> String {
    DocxPackage::open(docx)
        .and_then(|mut package| package.read_text(DOCUMENT_ENTRY))
        .expect("rendered document is readable")
}

pub fn entry_text(docx: &[u8], entry: &str) -> String {
    DocxPackage::open(docx)
        .and_then(|mut package| package.read_text(entry))
        .expect("entry is readable")
}

/// Visible text of every paragraph, in document order.
pub fn paragraph_texts(document: &str) -> Vec<String> {
    let tree = XmlTree::parse(document).expect("rendered XML parses");
    tree.elements_named(tree.root(), "w:p")
        .into_iter()
        .map(|p| paragraph_text(&tree, p))
        .collect()
}

pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
