//! Placeholder substitution inside `word/document.xml`.
//!
//! A paragraph whose whole text is one `{KEY}` is a block placeholder: it is
//! replaced by the paragraphs and tables parsed from the value. Any other
//! `{KEY}` is substituted inline, keeping the paragraph's run layout.
//! `{SOURCE_n}` keys are left for [`crate::sources`].

use lazy_static::lazy_static;
use regex::Regex;

use crate::blocks::{parse_blocks, Block};
use crate::config::TableStyle;
use crate::data::TemplateData;
use crate::error::{RenderError, RenderResult};
use crate::xml::{NodeId, XmlTree};

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{[A-Z0-9_]+\}").unwrap();
    static ref BLOCK_PLACEHOLDER: Regex = Regex::new(r"^\{([A-Z0-9_]+)\}$").unwrap();
}

pub const SOURCE_PREFIX: &str = "SOURCE_";

// Elements that must follow the one being inserted, per the WordprocessingML
// sequence for w:pPr and w:rPr.
const AFTER_JC: &[&str] = &[
    "w:textDirection",
    "w:textAlignment",
    "w:textboxTightWrap",
    "w:outlineLvl",
    "w:divId",
    "w:cnfStyle",
    "w:rPr",
    "w:sectPr",
    "w:pPrChange",
];
const AFTER_IND: &[&str] = &[
    "w:contextualSpacing",
    "w:mirrorIndents",
    "w:suppressOverlap",
    "w:jc",
    "w:textDirection",
    "w:textAlignment",
    "w:textboxTightWrap",
    "w:outlineLvl",
    "w:divId",
    "w:cnfStyle",
    "w:rPr",
    "w:sectPr",
    "w:pPrChange",
];
const AFTER_SZ: &[&str] = &[
    "w:szCs",
    "w:highlight",
    "w:u",
    "w:effect",
    "w:bdr",
    "w:shd",
    "w:fitText",
    "w:vertAlign",
    "w:rtl",
    "w:cs",
    "w:em",
    "w:lang",
    "w:eastAsianLayout",
    "w:specVanish",
    "w:oMath",
    "w:rPrChange",
];
const AFTER_COLOR: &[&str] = &[
    "w:spacing",
    "w:w",
    "w:kern",
    "w:position",
    "w:sz",
    "w:szCs",
    "w:highlight",
    "w:u",
    "w:effect",
    "w:bdr",
    "w:shd",
    "w:fitText",
    "w:vertAlign",
    "w:rtl",
    "w:cs",
    "w:em",
    "w:lang",
    "w:eastAsianLayout",
    "w:specVanish",
    "w:oMath",
    "w:rPrChange",
];

/// Visible text of a paragraph: every `w:t` below it, concatenated.
pub fn paragraph_text(tree: &XmlTree, paragraph: NodeId) -> String {
    tree.elements_named(paragraph, "w:t")
        .into_iter()
        .map(|t| tree.text_content(t))
        .collect()
}

fn needs_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace)
}

fn text_element(tree: &mut XmlTree, text: &str) -> NodeId {
    let t = if needs_preserve(text) {
        tree.create_element("w:t", &[("xml:space", "preserve")])
    } else {
        tree.create_element("w:t", &[])
    };
    tree.set_text(t, text);
    t
}

/// Drops everything but `w:pPr` and appends one run holding `text`. The run
/// reuses a copy of the first run's `w:rPr`, if there was one.
pub fn replace_paragraph_text_with_single_run(tree: &mut XmlTree, paragraph: NodeId, text: &str) {
    let first_run_props = tree
        .elements_named(paragraph, "w:r")
        .first()
        .and_then(|&run| tree.elements_named(run, "w:rPr").first().copied());
    let props = first_run_props.map(|props| tree.clone_subtree(props));

    for child in tree.children(paragraph).to_vec() {
        if !tree.is_element(child, "w:pPr") {
            tree.detach(child);
        }
    }

    let run = tree.create_element("w:r", &[]);
    if let Some(props) = props {
        tree.append_child(run, props);
    }
    let t = text_element(tree, text);
    tree.append_child(run, t);
    tree.append_child(paragraph, run);
}

/// Writes `text` into the paragraph's first `w:t` and empties the rest.
/// Runs left with nothing but `w:rPr` are removed.
pub fn replace_paragraph_text_preserving_runs(tree: &mut XmlTree, paragraph: NodeId, text: &str) {
    let texts = tree.elements_named(paragraph, "w:t");
    let Some((&first, rest)) = texts.split_first() else {
        return;
    };

    tree.set_text(first, text);
    if needs_preserve(text) {
        tree.set_attr(first, "xml:space", "preserve");
    } else {
        tree.remove_attr(first, "xml:space");
    }

    let mut runs: Vec<NodeId> = Vec::new();
    for &node in rest {
        tree.set_text(node, "");
        tree.remove_attr(node, "xml:space");
        if let Some(parent) = tree.parent(node) {
            if tree.is_element(parent, "w:r") && !runs.contains(&parent) {
                runs.push(parent);
            }
        }
    }

    for run in runs {
        let children = tree.child_elements(run);
        let has_text = children
            .iter()
            .any(|&child| tree.is_element(child, "w:t") && !tree.text_content(child).is_empty());
        let has_other = children
            .iter()
            .any(|&child| !tree.is_element(child, "w:t") && !tree.is_element(child, "w:rPr"));
        if !has_text && !has_other {
            tree.detach(run);
        }
    }
}

fn table_cell(tree: &mut XmlTree, text: &str) -> NodeId {
    let tc = tree.create_element("w:tc", &[]);
    let tc_pr = tree.create_element("w:tcPr", &[]);
    let tc_w = tree.create_element("w:tcW", &[("w:type", "auto"), ("w:w", "0")]);
    tree.append_child(tc_pr, tc_w);
    tree.append_child(tc, tc_pr);

    let p = tree.create_element("w:p", &[]);
    let r = tree.create_element("w:r", &[]);
    let t = text_element(tree, text);
    tree.append_child(r, t);
    tree.append_child(p, r);
    tree.append_child(tc, p);
    tc
}

/// Builds a detached auto-width `w:tbl`. An empty `headers` slice adds no
/// header row.
pub fn create_table(tree: &mut XmlTree, headers: &[String], rows: &[Vec<String>]) -> NodeId {
    let table = tree.create_element("w:tbl", &[]);
    let tbl_pr = tree.create_element("w:tblPr", &[]);
    let tbl_w = tree.create_element("w:tblW", &[("w:type", "auto"), ("w:w", "0")]);
    tree.append_child(tbl_pr, tbl_w);
    tree.append_child(table, tbl_pr);

    let header_row = (!headers.is_empty()).then_some(headers);
    for cells in header_row.into_iter().chain(rows.iter().map(Vec::as_slice)) {
        let tr = tree.create_element("w:tr", &[]);
        for cell in cells {
            let tc = table_cell(tree, cell);
            tree.append_child(tr, tc);
        }
        tree.append_child(table, tr);
    }
    table
}

/// Direct child `name` of `parent`, created when absent. A new element goes
/// right before the first existing sibling listed in `followers`.
fn ensure_child(tree: &mut XmlTree, parent: NodeId, name: &str, followers: &[&str]) -> NodeId {
    if let Some(existing) = tree.first_child_named(parent, name) {
        return existing;
    }
    let created = tree.create_element(name, &[]);
    tree.insert_ordered(parent, created, followers);
    created
}

fn ensure_first_child(tree: &mut XmlTree, parent: NodeId, name: &str) -> NodeId {
    if let Some(existing) = tree.first_child_named(parent, name) {
        return existing;
    }
    let created = tree.create_element(name, &[]);
    tree.prepend_child(parent, created);
    created
}

/// Forces left alignment and zero indent on every table cell paragraph and
/// the configured size and color on every run inside a table. Running it
/// twice changes nothing.
pub fn enforce_table_style(tree: &mut XmlTree, style: &TableStyle) {
    let size = style.font_size_half_points.to_string();
    for table in tree.elements_named(tree.root(), "w:tbl") {
        for cell in tree.elements_named(table, "w:tc") {
            for paragraph in tree.elements_named(cell, "w:p") {
                let props = ensure_first_child(tree, paragraph, "w:pPr");
                let jc = ensure_child(tree, props, "w:jc", AFTER_JC);
                tree.set_attr(jc, "w:val", "left");
                let ind = ensure_child(tree, props, "w:ind", AFTER_IND);
                tree.set_attr(ind, "w:left", "0");
                tree.set_attr(ind, "w:firstLine", "0");
            }
        }

        for run in tree.elements_named(table, "w:r") {
            let props = ensure_first_child(tree, run, "w:rPr");
            let sz = ensure_child(tree, props, "w:sz", AFTER_SZ);
            tree.set_attr(sz, "w:val", &size);
            let color = ensure_child(tree, props, "w:color", AFTER_COLOR);
            tree.set_attr(color, "w:val", &style.font_color);
        }
    }
}

fn block_key(text: &str) -> Option<&str> {
    BLOCK_PLACEHOLDER
        .captures(text.trim())
        .and_then(|caps| caps.get(1))
        .map(|key| key.as_str())
}

fn expand_block(tree: &mut XmlTree, paragraph: NodeId, value: &str) {
    for block in parse_blocks(value) {
        match block {
            Block::Table { headers, rows } => {
                let table = create_table(tree, &headers, &rows);
                tree.insert_before(paragraph, table);
            }
            Block::Paragraph { text } => {
                let copy = tree.clone_subtree(paragraph);
                replace_paragraph_text_with_single_run(tree, copy, &text);
                tree.insert_before(paragraph, copy);
            }
        }
    }
    tree.detach(paragraph);
}

fn substitute_inline(text: &str, data: &TemplateData) -> String {
    let mut seen: Vec<&str> = Vec::new();
    let mut updated = text.to_string();
    for token in PLACEHOLDER.find_iter(text).map(|m| m.as_str()) {
        if seen.contains(&token) {
            continue;
        }
        seen.push(token);
        let key = &token[1..token.len() - 1];
        if key.starts_with(SOURCE_PREFIX) {
            continue;
        }
        if let Some(value) = data.get(key) {
            updated = updated.replace(token, value);
        }
    }
    updated
}

/// Resolves every non-`SOURCE_` placeholder whose key is in `data`, then
/// applies [`enforce_table_style`]. Unknown keys are left as they are for
/// [`ensure_resolved`] to report.
pub fn resolve_placeholders(tree: &mut XmlTree, data: &TemplateData, style: &TableStyle) {
    let paragraphs = tree.elements_named(tree.root(), "w:p");
    let mut expanded = 0usize;

    for paragraph in paragraphs {
        if !tree.is_attached(paragraph) {
            continue;
        }
        let text = paragraph_text(tree, paragraph);

        let block_value = block_key(&text)
            .filter(|key| !key.starts_with(SOURCE_PREFIX))
            .and_then(|key| data.get(key));
        if let Some(value) = block_value {
            expand_block(tree, paragraph, value);
            expanded += 1;
            continue;
        }

        if !PLACEHOLDER.is_match(&text) {
            continue;
        }
        let updated = substitute_inline(&text, data);
        if updated != text {
            replace_paragraph_text_preserving_runs(tree, paragraph, &updated);
        }
    }

    tracing::debug!(expanded, "placeholders resolved");
    enforce_table_style(tree, style);
}

/// Distinct `{KEY}` tokens in `xml`, in first-seen order.
pub fn unresolved_placeholders(xml: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for token in PLACEHOLDER.find_iter(xml) {
        if !found.iter().any(|seen| seen == token.as_str()) {
            found.push(token.as_str().to_string());
        }
    }
    found
}

pub fn ensure_resolved(xml: &str) -> RenderResult<()> {
    let remaining = unresolved_placeholders(xml);
    if remaining.is_empty() {
        return Ok(());
    }
    tracing::error!(placeholders = ?remaining, "placeholders left after resolution");
    Err(RenderError::UnresolvedPlaceholders(remaining))
}
