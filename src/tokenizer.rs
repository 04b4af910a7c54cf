//! Logical text of a paragraph.
//!
//! Word splits visually continuous text into many runs (formatting changes,
//! spell-check marks, revision ids). The logical text concatenates every
//! run's text in order and remembers, for each character, which run and
//! which text atom inside that run produced it.
//!
//! A [`LogicalText`] is a snapshot. Any edit to the paragraph invalidates it;
//! build a new one with [`logical_text`] instead of patching the old one.

use crate::xml::{NodeId, XmlTree};

/// Kind of run child contributing characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomKind {
    /// `w:t`
    Text,
    /// `w:tab`, contributes `\t`
    Tab,
    /// `w:br` / `w:cr`, contributes `\n`
    Break,
}

/// One character-bearing child of a run.
#[derive(Debug, Clone)]
pub struct Atom {
    pub node: NodeId,
    pub kind: AtomKind,
    pub text: String,
}

/// A `w:r` element and its atoms.
#[derive(Debug, Clone)]
pub struct RunView {
    pub node: NodeId,
    pub atoms: Vec<Atom>,
}

/// Where a logical character came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePos {
    /// Index into [`LogicalText::runs`].
    pub run: usize,
    /// Index into that run's atoms.
    pub atom: usize,
    /// Character offset inside the atom's text.
    pub offset: usize,
}

/// Concatenated paragraph text plus the per-character source mapping.
#[derive(Debug, Clone)]
pub struct LogicalText {
    pub runs: Vec<RunView>,
    text: String,
    positions: Vec<SourcePos>,
}

impl LogicalText {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length in characters (not bytes).
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Source of the character at `index` (a character index).
    pub fn position(&self, index: usize) -> Option<SourcePos> {
        self.positions.get(index).copied()
    }

    pub fn atom(&self, pos: SourcePos) -> &Atom {
        &self.runs[pos.run].atoms[pos.atom]
    }
}

/// Runs of a paragraph in document order.
///
/// Descends through wrappers such as hyperlinks, insertions, smart tags and
/// content controls. Stops at nested paragraphs (text boxes are paragraphs
/// of their own) and at `mc:Fallback`, which duplicates `mc:Choice`.
pub fn paragraph_runs(tree: &XmlTree, paragraph: NodeId) -> Vec<NodeId> {
    let mut runs = Vec::new();
    collect_runs(tree, paragraph, &mut runs);
    runs
}

fn collect_runs(tree: &XmlTree, node: NodeId, runs: &mut Vec<NodeId>) {
    for &child in tree.children(node) {
        match tree.local_name(child) {
            Some("r") => runs.push(child),
            Some("p") | Some("pPr") | Some("Fallback") | None => {}
            Some(_) => collect_runs(tree, child, runs),
        }
    }
}

fn run_atoms(tree: &XmlTree, run: NodeId) -> Vec<Atom> {
    tree.children(run)
        .iter()
        .filter_map(|&child| {
            let (kind, text) = match tree.local_name(child)? {
                "t" => (AtomKind::Text, tree.text_content(child)),
                "tab" => (AtomKind::Tab, "\t".to_string()),
                "br" | "cr" => (AtomKind::Break, "\n".to_string()),
                _ => return None,
            };
            Some(Atom {
                node: child,
                kind,
                text,
            })
        })
        .collect()
}

/// Build the logical text of `paragraph` from the current tree.
pub fn logical_text(tree: &XmlTree, paragraph: NodeId) -> LogicalText {
    let mut runs = Vec::new();
    let mut text = String::new();
    let mut positions = Vec::new();

    for (run_idx, run) in paragraph_runs(tree, paragraph).into_iter().enumerate() {
        let atoms = run_atoms(tree, run);
        for (atom_idx, atom) in atoms.iter().enumerate() {
            for (offset, ch) in atom.text.chars().enumerate() {
                text.push(ch);
                positions.push(SourcePos {
                    run: run_idx,
                    atom: atom_idx,
                    offset,
                });
            }
        }
        runs.push(RunView { node: run, atoms });
    }

    LogicalText {
        runs,
        text,
        positions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(xml: &str) -> (XmlTree, NodeId) {
        let tree = XmlTree::parse(format!("<w:body xmlns:w=\"urn:w\">{}</w:body>", xml)).unwrap();
        let p = tree.find_all("p")[0];
        (tree, p)
    }

    #[test]
    fn test_concatenates_runs_without_loss() {
        let (tree, p) = paragraph(
            "<w:p><w:pPr><w:rPr><w:b/></w:rPr></w:pPr>\
             <w:r><w:rPr><w:i/></w:rPr><w:t>«Na</w:t></w:r>\
             <w:proofErr w:type=\"spellStart\"/>\
             <w:r><w:t xml:space=\"preserve\">me» </w:t><w:tab/><w:t>x</w:t><w:br/></w:r></w:p>",
        );
        let lt = logical_text(&tree, p);
        assert_eq!(lt.text(), "«Name» \tx\n");
        assert_eq!(lt.len(), 10);
        assert_eq!(lt.runs.len(), 2);
        assert_eq!(lt.position(0), Some(SourcePos { run: 0, atom: 0, offset: 0 }));
        assert_eq!(lt.position(3), Some(SourcePos { run: 1, atom: 0, offset: 0 }));
        assert_eq!(lt.position(7), Some(SourcePos { run: 1, atom: 1, offset: 0 }));
        assert_eq!(lt.atom(lt.position(7).unwrap()).kind, AtomKind::Tab);
        assert_eq!(lt.position(10), None);
    }

    #[test]
    fn test_includes_wrapped_runs_but_not_nested_paragraphs() {
        let (tree, p) = paragraph(
            "<w:p><w:hyperlink><w:r><w:t>link</w:t></w:r></w:hyperlink>\
             <w:r><w:drawing><w:txbxContent><w:p><w:r><w:t>boxed</w:t></w:r></w:p></w:txbxContent></w:drawing></w:r>\
             <w:ins><w:r><w:t>+added</w:t></w:r></w:ins></w:p>",
        );
        assert_eq!(logical_text(&tree, p).text(), "link+added");

        let nested = tree.find_all("p")[1];
        assert_eq!(logical_text(&tree, nested).text(), "boxed");
    }

    #[test]
    fn test_empty_paragraph() {
        let (tree, p) = paragraph("<w:p/>");
        let lt = logical_text(&tree, p);
        assert!(lt.is_empty());
        assert!(lt.runs.is_empty());
    }
}
