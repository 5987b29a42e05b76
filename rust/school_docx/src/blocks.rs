//! Splits a field's free text into paragraphs and pipe tables.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NUMBERED_ITEM: Regex = Regex::new(r"^[0-9]+\.\s+").unwrap();
    static ref SEPARATOR_CELL: Regex = Regex::new(r"^:?-{3,}:?$").unwrap();
}

/// Labels that always stand on their own line in intro-style text.
const SECTION_LABELS: &[&str] = &[
    "Актуальность:",
    "Цель:",
    "Задачи:",
    "Гипотеза:",
    "Методы:",
    "Объект:",
    "Предмет:",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph { text: String },
    Table { headers: Vec<String>, rows: Vec<Vec<String>> },
}

impl Block {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Block::Paragraph { text: text.into() }
    }
}

fn split_row(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('|').unwrap_or(trimmed);
    trimmed.split('|').map(|cell| cell.trim().to_string()).collect()
}

/// `| --- | :---: |` style row. Needs at least two cells.
pub fn looks_like_table_separator(line: &str) -> bool {
    if !line.contains('|') {
        return false;
    }
    let cells = split_row(line);
    cells.len() >= 2 && cells.iter().all(|cell| SEPARATOR_CELL.is_match(cell))
}

struct BlockBuilder {
    blocks: Vec<Block>,
    pending: Vec<String>,
}

impl BlockBuilder {
    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let text = self
            .pending
            .drain(..)
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !text.is_empty() {
            self.blocks.push(Block::Paragraph { text });
        }
    }

    fn push(&mut self, block: Block) {
        self.flush();
        self.blocks.push(block);
    }
}

/// Never returns an empty list: blank input yields one empty paragraph.
pub fn parse_blocks(text: &str) -> Vec<Block> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = normalized.split('\n').collect();
    let mut builder = BlockBuilder {
        blocks: Vec::new(),
        pending: Vec::new(),
    };

    let mut index = 0;
    while index < lines.len() {
        let line = lines[index];
        let trimmed = line.trim();

        if trimmed.is_empty() {
            builder.flush();
            index += 1;
            continue;
        }

        if SECTION_LABELS.contains(&trimmed) || NUMBERED_ITEM.is_match(trimmed) {
            builder.push(Block::paragraph(trimmed));
            index += 1;
            continue;
        }

        let next_is_separator = lines
            .get(index + 1)
            .is_some_and(|next| looks_like_table_separator(next));
        if line.contains('|') && next_is_separator {
            let headers = split_row(line);
            index += 2;
            let mut rows = Vec::new();
            while let Some(row) = lines.get(index) {
                if row.trim().is_empty() || !row.contains('|') {
                    break;
                }
                rows.push(split_row(row));
                index += 1;
            }
            builder.push(Block::Table { headers, rows });
            continue;
        }

        builder.pending.push(line.to_string());
        index += 1;
    }
    builder.flush();

    if builder.blocks.is_empty() {
        return vec![Block::paragraph("")];
    }
    builder.blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lines_join_until_blank_line() {
        let blocks = parse_blocks("Первая строка\nвторая строка\n\nНовый абзац");
        assert_eq!(
            blocks,
            vec![
                Block::paragraph("Первая строка вторая строка"),
                Block::paragraph("Новый абзац"),
            ]
        );
    }

    #[test]
    fn labels_and_numbered_items_stand_alone() {
        let blocks = parse_blocks("Цель:\nизучить вопрос\nЗадачи:\n1. Собрать данные\n2. Обработать");
        assert_eq!(
            blocks,
            vec![
                Block::paragraph("Цель:"),
                Block::paragraph("изучить вопрос"),
                Block::paragraph("Задачи:"),
                Block::paragraph("1. Собрать данные"),
                Block::paragraph("2. Обработать"),
            ]
        );
    }

    #[test]
    fn only_ascii_digits_start_numbered_items() {
        let blocks = parse_blocks("Список:\n١. первый\n2. второй");
        assert_eq!(
            blocks,
            vec![
                Block::paragraph("Список: ١. первый"),
                Block::paragraph("2. второй"),
            ]
        );
    }

    #[test]
    fn pipe_table_keeps_column_counts() {
        let text = "До таблицы\n| Год | Значение | Примечание |\n|---|:---:|---:|\n| 2020 | 10 | нет |\n| 2021 | 12 | да |\nПосле таблицы";
        let blocks = parse_blocks(text);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], Block::paragraph("До таблицы"));
        match &blocks[1] {
            Block::Table { headers, rows } => {
                assert_eq!(headers, &["Год", "Значение", "Примечание"]);
                assert_eq!(rows.len(), 2);
                assert!(rows.iter().all(|row| row.len() == headers.len()));
                assert_eq!(rows[1], vec!["2021", "12", "да"]);
            }
            other => panic!("expected table, got {other:?}"),
        }
        assert_eq!(blocks[2], Block::paragraph("После таблицы"));
    }

    #[test]
    fn pipe_line_without_separator_is_plain_text() {
        let blocks = parse_blocks("a | b\nc | d");
        assert_eq!(blocks, vec![Block::paragraph("a | b c | d")]);
    }

    #[test]
    fn separator_needs_two_dashes_cells() {
        assert!(looks_like_table_separator("| --- | --- |"));
        assert!(looks_like_table_separator(":---|---:"));
        assert!(!looks_like_table_separator("| --- |"));
        assert!(!looks_like_table_separator("| -- | -- |"));
        assert!(!looks_like_table_separator("---"));
    }

    #[test]
    fn empty_input_yields_single_empty_paragraph() {
        assert_eq!(parse_blocks(""), vec![Block::paragraph("")]);
        assert_eq!(parse_blocks("\n  \n"), vec![Block::paragraph("")]);
    }
}
