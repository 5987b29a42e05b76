//! Bibliography rendering over the `{SOURCE_1}`..`{SOURCE_5}` paragraphs.
//!
//! The five placeholders must sit in five consecutive paragraphs, one each.
//! They are filled in order; entries past the fifth are rendered into
//! copies of the fifth paragraph.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{RenderResult, SourceLayoutError};
use crate::resolve::{paragraph_text, replace_paragraph_text_with_single_run};
use crate::xml::{NodeId, XmlTree};

lazy_static! {
    static ref SOURCE_PLACEHOLDER: Regex = Regex::new(r"\{SOURCE_([1-5])\}").unwrap();
}

pub const SOURCE_SLOTS: usize = 5;
const EMPTY_LIST_MARKER: &str = "—";

/// Paragraph nodes for slots 1..=5 with their position among all `w:p`.
fn locate_slots(tree: &XmlTree) -> Result<[(NodeId, usize); SOURCE_SLOTS], SourceLayoutError> {
    let mut slots: [Option<(NodeId, usize)>; SOURCE_SLOTS] = [None; SOURCE_SLOTS];

    for (index, paragraph) in tree.elements_named(tree.root(), "w:p").into_iter().enumerate() {
        let text = paragraph_text(tree, paragraph);
        let mut numbers = SOURCE_PLACEHOLDER
            .captures_iter(&text)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<u8>().ok());
        let Some(number) = numbers.next() else {
            continue;
        };
        if numbers.next().is_some() {
            return Err(SourceLayoutError::SharedParagraph);
        }
        let slot = &mut slots[usize::from(number) - 1];
        if slot.is_some() {
            return Err(SourceLayoutError::Duplicate(number));
        }
        *slot = Some((paragraph, index));
    }

    let mut located = [(tree.root(), 0usize); SOURCE_SLOTS];
    for (offset, &slot) in slots.iter().enumerate() {
        // offset < 5, so the narrowing cannot truncate
        located[offset] = slot.ok_or(SourceLayoutError::Missing(offset as u8 + 1))?;
    }

    let first = located[0].1;
    if located
        .iter()
        .enumerate()
        .any(|(offset, &(_, index))| index != first + offset)
    {
        return Err(SourceLayoutError::NotConsecutive);
    }
    Ok(located)
}

/// Validates the placeholder layout and renders at most `max_entries` of
/// `sources`. Zero entries leave a single dash paragraph.
pub fn render_sources(tree: &mut XmlTree, sources: &[String], max_entries: usize) -> RenderResult<()> {
    let slots = locate_slots(tree)?.map(|(paragraph, _)| paragraph);

    if sources.len() > max_entries {
        tracing::warn!(found = sources.len(), max_entries, "source list truncated");
    }
    let sources = &sources[..sources.len().min(max_entries)];

    if sources.is_empty() {
        replace_paragraph_text_with_single_run(tree, slots[0], EMPTY_LIST_MARKER);
        for &paragraph in &slots[1..] {
            tree.detach(paragraph);
        }
    } else {
        for (offset, &paragraph) in slots.iter().enumerate() {
            match sources.get(offset) {
                Some(entry) => replace_paragraph_text_with_single_run(tree, paragraph, entry),
                None => tree.detach(paragraph),
            }
        }

        let template = slots[SOURCE_SLOTS - 1];
        let mut previous = template;
        for entry in sources.iter().skip(SOURCE_SLOTS) {
            let copy = tree.clone_subtree(template);
            replace_paragraph_text_with_single_run(tree, copy, entry);
            tree.insert_after(previous, copy);
            previous = copy;
        }
    }

    let leftover = tree
        .elements_named(tree.root(), "w:p")
        .into_iter()
        .any(|paragraph| SOURCE_PLACEHOLDER.is_match(&paragraph_text(tree, paragraph)));
    if leftover {
        return Err(SourceLayoutError::Leftover.into());
    }

    tracing::debug!(rendered = sources.len(), "sources rendered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use pretty_assertions::assert_eq;

    fn para(text: &str) -> String {
        format!("<w:p><w:pPr><w:pStyle w:val=\"a\"/></w:pPr><w:r><w:rPr><w:sz w:val=\"24\"/></w:rPr><w:t>{text}</w:t></w:r></w:p>")
    }

    fn document(paragraphs: &[&str]) -> XmlTree {
        let inner: String = paragraphs.iter().map(|text| para(text)).collect();
        XmlTree::parse(&format!("<w:document><w:body>{inner}</w:body></w:document>")).unwrap()
    }

    fn standard() -> XmlTree {
        document(&[
            "Список литературы",
            "{SOURCE_1}",
            "{SOURCE_2}",
            "{SOURCE_3}",
            "{SOURCE_4}",
            "{SOURCE_5}",
            "Приложения",
        ])
    }

    fn texts(tree: &XmlTree) -> Vec<String> {
        tree.elements_named(tree.root(), "w:p")
            .into_iter()
            .map(|p| paragraph_text(tree, p))
            .collect()
    }

    fn entries(count: usize) -> Vec<String> {
        (1..=count).map(|n| format!("Источник {n}")).collect()
    }

    fn layout_error(tree: &mut XmlTree) -> SourceLayoutError {
        match render_sources(tree, &entries(3), 20) {
            Err(RenderError::SourceLayout(err)) => err,
            other => panic!("expected layout error, got {other:?}"),
        }
    }

    #[test]
    fn zero_entries_leave_one_dash() {
        let mut tree = standard();
        render_sources(&mut tree, &[], 20).unwrap();
        assert_eq!(texts(&tree), ["Список литературы", "—", "Приложения"]);
    }

    #[test]
    fn three_entries_drop_unused_slots() {
        let mut tree = standard();
        render_sources(&mut tree, &entries(3), 20).unwrap();
        assert_eq!(
            texts(&tree),
            ["Список литературы", "Источник 1", "Источник 2", "Источник 3", "Приложения"]
        );
    }

    #[test]
    fn five_entries_fill_slots_without_copies() {
        let mut tree = standard();
        let before = tree.elements_named(tree.root(), "w:p");
        render_sources(&mut tree, &entries(5), 20).unwrap();
        assert_eq!(tree.elements_named(tree.root(), "w:p"), before);
        assert_eq!(texts(&tree)[5], "Источник 5");
    }

    #[test]
    fn overflow_is_cloned_after_fifth_and_capped() {
        let mut tree = standard();
        render_sources(&mut tree, &entries(21), 20).unwrap();
        let texts = texts(&tree);
        assert_eq!(texts.len(), 1 + 20 + 1);
        assert_eq!(texts[1..21], entries(20)[..]);
        assert_eq!(texts[21], "Приложения");

        let styled = tree
            .elements_named(tree.root(), "w:pStyle")
            .into_iter()
            .filter(|&style| tree.attr(style, "w:val") == Some("a"))
            .count();
        assert_eq!(styled, 22);
        let last_source = tree.elements_named(tree.root(), "w:p")[20];
        let size = tree.elements_named(last_source, "w:sz")[0];
        assert_eq!(tree.attr(size, "w:val"), Some("24"));
    }

    #[test]
    fn sixth_placeholder_paragraph_is_rejected() {
        let mut tree = document(&[
            "{SOURCE_1}",
            "{SOURCE_2}",
            "{SOURCE_3}",
            "{SOURCE_4}",
            "{SOURCE_5}",
            "{SOURCE_5}",
        ]);
        assert_eq!(layout_error(&mut tree), SourceLayoutError::Duplicate(5));
    }

    #[test]
    fn gap_between_placeholders_is_rejected() {
        let mut tree = document(&[
            "{SOURCE_1}",
            "{SOURCE_2}",
            "текст",
            "{SOURCE_3}",
            "{SOURCE_4}",
            "{SOURCE_5}",
        ]);
        assert_eq!(layout_error(&mut tree), SourceLayoutError::NotConsecutive);
    }

    #[test]
    fn out_of_order_placeholders_are_rejected() {
        let mut tree = document(&["{SOURCE_2}", "{SOURCE_1}", "{SOURCE_3}", "{SOURCE_4}", "{SOURCE_5}"]);
        assert_eq!(layout_error(&mut tree), SourceLayoutError::NotConsecutive);
    }

    #[test]
    fn shared_and_missing_placeholders_are_rejected() {
        let mut tree = document(&["{SOURCE_1} {SOURCE_2}", "{SOURCE_3}", "{SOURCE_4}", "{SOURCE_5}"]);
        assert_eq!(layout_error(&mut tree), SourceLayoutError::SharedParagraph);

        let mut tree = document(&["{SOURCE_1}", "{SOURCE_2}", "{SOURCE_3}", "{SOURCE_5}"]);
        assert_eq!(layout_error(&mut tree), SourceLayoutError::Missing(4));
    }

    #[test]
    fn placeholder_split_across_runs_is_found() {
        let mut tree = XmlTree::parse(
            "<w:body><w:p><w:r><w:t>{SOURCE_</w:t></w:r><w:r><w:t>1}</w:t></w:r></w:p>\
             <w:p><w:r><w:t>{SOURCE_2}</w:t></w:r></w:p><w:p><w:r><w:t>{SOURCE_3}</w:t></w:r></w:p>\
             <w:p><w:r><w:t>{SOURCE_4}</w:t></w:r></w:p><w:p><w:r><w:t>{SOURCE_5}</w:t></w:r></w:p></w:body>",
        )
        .unwrap();
        render_sources(&mut tree, &entries(1), 20).unwrap();
        assert_eq!(
            tree.to_xml(),
            "<w:body><w:p><w:r><w:t>Источник 1</w:t></w:r></w:p></w:body>"
        );
    }
}
