//! Input payload as posted by the project generator.
//!
//! The generator is loose about types (years arrive as numbers, lists as
//! `null`), so every field deserializes leniently: anything unusable becomes
//! "absent" and is reported later by the data builder instead of failing here.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::normalize::normalize_single_line;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Payload {
    #[serde(deserialize_with = "lenient_text")]
    pub topic: Option<String>,
    #[serde(deserialize_with = "lenient_record")]
    pub title: TitlePage,
    #[serde(deserialize_with = "lenient_list")]
    pub chapters: Vec<Chapter>,
    #[serde(deserialize_with = "lenient_text")]
    pub intro_text: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub conclusion_text: Option<String>,
    #[serde(deserialize_with = "lenient_texts")]
    pub bibliography: Vec<Option<String>>,
    #[serde(deserialize_with = "lenient_list")]
    pub appendix: Vec<AppendixEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TitlePage {
    #[serde(deserialize_with = "lenient_text")]
    pub student: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub class: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub teacher: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub subject: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub teacher_subject: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub city: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub year: Option<String>,
    /// Free-form "name\naddress" block of the school.
    #[serde(deserialize_with = "lenient_text")]
    pub organization: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub school_name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub school_address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Chapter {
    #[serde(deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Section {
    #[serde(deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub content: Option<String>,
}

/// One appendix item: a typed `text`/`table`/`chart` record, or a bare
/// `{title, content}` pair.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AppendixEntry {
    Typed(TypedAppendix),
    Plain(PlainAppendix),
}

impl Default for AppendixEntry {
    fn default() -> Self {
        AppendixEntry::Plain(PlainAppendix::default())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlainAppendix {
    #[serde(deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TypedAppendix {
    Text {
        #[serde(default, deserialize_with = "lenient_text")]
        title: Option<String>,
        #[serde(default, alias = "text", deserialize_with = "lenient_text")]
        content: Option<String>,
    },
    Table {
        #[serde(default, alias = "caption", deserialize_with = "lenient_text")]
        title: Option<String>,
        #[serde(default, deserialize_with = "lenient_texts")]
        headers: Vec<Option<String>>,
        #[serde(default, deserialize_with = "lenient_rows")]
        rows: Vec<Vec<String>>,
        #[serde(default, deserialize_with = "lenient_text")]
        notes: Option<String>,
    },
    Chart {
        #[serde(default, rename = "chartType", deserialize_with = "lenient_text")]
        chart_type: Option<String>,
        #[serde(default, alias = "caption", deserialize_with = "lenient_text")]
        title: Option<String>,
        #[serde(default, deserialize_with = "lenient_texts")]
        labels: Vec<Option<String>>,
        #[serde(default, deserialize_with = "lenient_list")]
        series: Vec<ChartSeries>,
        #[serde(default, deserialize_with = "lenient_text")]
        notes: Option<String>,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChartSeries {
    #[serde(deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_numbers")]
    pub values: Vec<f64>,
}

impl AppendixEntry {
    /// Flattens the entry into the `(title, content)` pair the template has
    /// room for. Tables and charts become pipe tables inside the content.
    pub fn to_title_and_content(&self) -> (String, String) {
        match self {
            AppendixEntry::Plain(plain) => (text_or_empty(&plain.title), text_or_empty(&plain.content)),
            AppendixEntry::Typed(TypedAppendix::Text { title, content }) => {
                (text_or_empty(title), text_or_empty(content))
            }
            AppendixEntry::Typed(TypedAppendix::Table {
                title,
                headers,
                rows,
                notes,
            }) => {
                let title = non_empty(title).unwrap_or_else(|| "Таблица".to_string());
                let headers: Vec<String> = headers.iter().map(text_or_empty).collect();
                let mut parts = vec![pipe_table(&headers, rows)];
                parts.extend(non_empty(notes));
                (title, parts.join("\n\n"))
            }
            AppendixEntry::Typed(TypedAppendix::Chart {
                chart_type,
                title,
                labels,
                series,
                notes,
            }) => {
                let title = non_empty(title).unwrap_or_else(|| "Рисунок".to_string());
                let chart_type = non_empty(chart_type)
                    .map(|kind| kind.to_lowercase())
                    .unwrap_or_else(|| "bar".to_string());
                let series: Vec<&ChartSeries> =
                    series.iter().filter(|s| !s.values.is_empty()).collect();

                let mut headers = vec!["Показатель".to_string()];
                headers.extend(
                    series
                        .iter()
                        .map(|s| non_empty(&s.name).unwrap_or_else(|| "Series".to_string())),
                );
                let points = series.iter().map(|s| s.values.len()).max().unwrap_or(0).max(labels.len());
                let rows: Vec<Vec<String>> = (0..points)
                    .map(|index| {
                        let label = labels
                            .get(index)
                            .and_then(non_empty)
                            .unwrap_or_else(|| (index + 1).to_string());
                        let mut row = vec![label];
                        row.extend(series.iter().map(|s| {
                            s.values.get(index).map(|v| v.to_string()).unwrap_or_default()
                        }));
                        row
                    })
                    .collect();

                let mut parts = vec![format!("Диаграмма ({chart_type})")];
                if !rows.is_empty() {
                    parts.push(pipe_table(&headers, &rows));
                }
                parts.extend(non_empty(notes));
                (title, parts.join("\n\n"))
            }
        }
    }
}

fn text_or_empty(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn pipe_cell(value: &str) -> String {
    normalize_single_line(value).replace('|', "/")
}

/// Renders rows as a markdown pipe table the block parser understands.
fn pipe_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let width = rows
        .iter()
        .map(Vec::len)
        .max()
        .unwrap_or(0)
        .max(headers.len())
        .max(2);
    let pad = |cells: Vec<String>| -> String {
        let mut cells = cells;
        cells.resize(width, String::new());
        format!("| {} |", cells.join(" | "))
    };

    let header_cells: Vec<String> = (0..width)
        .map(|index| match headers.get(index) {
            Some(h) if !h.trim().is_empty() => pipe_cell(h),
            _ => (index + 1).to_string(),
        })
        .collect();

    let mut lines = vec![pad(header_cells), pad(vec!["---".to_string(); width])];
    for row in rows {
        lines.push(pad(row.iter().map(|cell| pipe_cell(cell)).collect()));
    }
    lines.join("\n")
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(value_to_text))
}

fn lenient_texts<'de, D>(deserializer: D) -> Result<Vec<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items.into_iter().map(value_to_text).collect(),
        _ => Vec::new(),
    })
}

fn lenient_rows<'de, D>(deserializer: D) -> Result<Vec<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(rows)) => rows
            .into_iter()
            .map(|row| match row {
                Value::Array(cells) => cells
                    .into_iter()
                    .map(|cell| value_to_text(cell).unwrap_or_default())
                    .collect(),
                _ => Vec::new(),
            })
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_numbers<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            })
            .filter(|n| n.is_finite())
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).unwrap_or_default())
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_record<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(value @ Value::Object(_)) => serde_json::from_value(value).unwrap_or_default(),
        _ => T::default(),
    })
}
