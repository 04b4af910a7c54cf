//! Removing paragraphs left empty by substitution.
//!
//! Runs once per document, after every paragraph has been substituted.
//! Removal is structural: the paragraph (with its numbering reference) is
//! taken out of its parent, so no empty line or dangling bullet remains.

use crate::document::Paragraph;
use crate::tokenizer::logical_text;
use crate::xml::XmlTree;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref BULLET_ONLY_RE: Regex = Regex::new(r"^[•\-\x{2013}\x{2014}]\s*$").unwrap();
}

/// Which list paragraphs the empty-list-item rule may remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListPruning {
    /// Any list paragraph whose text is empty after substitution, including
    /// empty items the template already had.
    AllListItems,
    /// Only list paragraphs that contained placeholders. Paragraphs without
    /// placeholders are never touched.
    #[default]
    PlaceholderParagraphs,
}

/// What a paragraph looked like before substitution.
#[derive(Debug, Clone, Copy)]
pub struct ParagraphOrigin {
    pub paragraph: Paragraph,
    /// Held at least one placeholder.
    pub had_placeholders: bool,
    /// Text was nothing but placeholders and whitespace.
    pub placeholder_only: bool,
    /// Every placeholder resolved to an empty value.
    pub all_blank: bool,
}

impl ParagraphOrigin {
    /// A paragraph without placeholders.
    pub fn plain(paragraph: Paragraph) -> Self {
        Self {
            paragraph,
            had_placeholders: false,
            placeholder_only: false,
            all_blank: false,
        }
    }
}

fn final_text(tree: &XmlTree, paragraph: Paragraph) -> String {
    logical_text(tree, paragraph.node).text().to_string()
}

/// Apply the pruning rules in order, returning how many paragraphs went.
///
/// 1. placeholder-only paragraphs whose values were all blank
/// 2. list paragraphs with empty or whitespace-only text
/// 3. paragraphs that held placeholders and are down to a lone bullet glyph
pub fn prune(tree: &mut XmlTree, origins: &[ParagraphOrigin], lists: ListPruning) -> usize {
    let mut removed = 0;

    for origin in origins {
        let p = origin.paragraph;
        if !origin.placeholder_only || !origin.all_blank || !removable(tree, p) {
            continue;
        }
        if final_text(tree, p).trim().is_empty() {
            log::debug!("pruning blank placeholder paragraph (node {})", p.node);
            p.remove(tree);
            removed += 1;
        }
    }

    for origin in origins {
        let p = origin.paragraph;
        if lists == ListPruning::PlaceholderParagraphs && !origin.had_placeholders {
            continue;
        }
        if !removable(tree, p) || !p.is_list_item(tree) {
            continue;
        }
        if final_text(tree, p).trim().is_empty() {
            log::debug!("pruning empty list item (node {})", p.node);
            p.remove(tree);
            removed += 1;
        }
    }

    for origin in origins {
        let p = origin.paragraph;
        if !origin.had_placeholders || !removable(tree, p) {
            continue;
        }
        if BULLET_ONLY_RE.is_match(final_text(tree, p).trim()) {
            log::debug!("pruning orphan bullet (node {})", p.node);
            p.remove(tree);
            removed += 1;
        }
    }

    removed
}

/// Still in the document, not already emptied as the last paragraph of a
/// cell or text box, and holding nothing but text.
fn removable(tree: &XmlTree, p: Paragraph) -> bool {
    tree.is_attached(p.node)
        && !p.has_structural_content(tree)
        && !(p.is_last_in_container(tree) && logical_text(tree, p.node).runs.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(body: &str) -> (XmlTree, Vec<Paragraph>) {
        let tree = XmlTree::parse(format!("<w:body xmlns:w=\"urn:w\">{}</w:body>", body)).unwrap();
        let paragraphs = tree.find_all("p").into_iter().map(Paragraph::new).collect();
        (tree, paragraphs)
    }

    fn origin(p: Paragraph, placeholder_only: bool, all_blank: bool) -> ParagraphOrigin {
        ParagraphOrigin {
            paragraph: p,
            had_placeholders: true,
            placeholder_only,
            all_blank,
        }
    }

    const NUM: &str = "<w:pPr><w:numPr><w:ilvl w:val=\"0\"/><w:numId w:val=\"1\"/></w:numPr></w:pPr>";

    #[test]
    fn test_blank_placeholder_paragraph_removed() {
        let (mut tree, ps) = setup("<w:p><w:r><w:t>keep</w:t></w:r></w:p><w:p><w:r/></w:p>");
        let origins = vec![ParagraphOrigin::plain(ps[0]), origin(ps[1], true, true)];
        assert_eq!(prune(&mut tree, &origins, ListPruning::AllListItems), 1);
        assert_eq!(tree.find_all("p"), vec![ps[0].node]);
    }

    #[test]
    fn test_mixed_text_paragraph_survives_rule_one() {
        let (mut tree, ps) = setup("<w:p><w:r><w:t xml:space=\"preserve\">Date: </w:t></w:r></w:p>");
        let origins = vec![origin(ps[0], false, true)];
        assert_eq!(prune(&mut tree, &origins, ListPruning::AllListItems), 0);
    }

    #[test]
    fn test_empty_list_items_and_scope() {
        let body = format!(
            "<w:p>{num}<w:r><w:t>one</w:t></w:r></w:p><w:p>{num}<w:r><w:t xml:space=\"preserve\"> </w:t></w:r></w:p><w:p>{num}</w:p>",
            num = NUM
        );

        let (mut tree, ps) = setup(&body);
        let origins = vec![
            ParagraphOrigin::plain(ps[0]),
            origin(ps[1], false, false),
            ParagraphOrigin::plain(ps[2]),
        ];
        assert_eq!(prune(&mut tree, &origins, ListPruning::AllListItems), 2);
        assert_eq!(tree.find_all("p"), vec![ps[0].node]);

        let (mut tree, ps) = setup(&body);
        let origins = vec![
            ParagraphOrigin::plain(ps[0]),
            origin(ps[1], false, false),
            ParagraphOrigin::plain(ps[2]),
        ];
        assert_eq!(prune(&mut tree, &origins, ListPruning::PlaceholderParagraphs), 1);
        assert_eq!(tree.find_all("p"), vec![ps[0].node, ps[2].node]);
    }

    #[test]
    fn test_orphan_bullet_removed_only_when_placeholders_were_there() {
        let (mut tree, ps) = setup(
            "<w:p><w:r><w:t xml:space=\"preserve\">• </w:t></w:r></w:p><w:p><w:r><w:t>–</w:t></w:r></w:p>",
        );
        let origins = vec![origin(ps[0], false, false), ParagraphOrigin::plain(ps[1])];
        assert_eq!(prune(&mut tree, &origins, ListPruning::AllListItems), 1);
        assert_eq!(tree.find_all("p"), vec![ps[1].node]);
    }

    #[test]
    fn test_paragraph_with_drawing_is_kept() {
        let body = format!("<w:p>{}<w:r><w:drawing/></w:r></w:p>", NUM);
        let (mut tree, ps) = setup(&body);
        let origins = vec![origin(ps[0], true, true)];
        assert_eq!(prune(&mut tree, &origins, ListPruning::AllListItems), 0);
        assert!(tree.is_attached(ps[0].node));
    }
}
