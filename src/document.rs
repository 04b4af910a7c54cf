//! The main document part of an opened DOCX, as an editable tree.

use crate::error::FillError;
use crate::package::Package;
use crate::xml::{NodeId, XmlTree};

/// Elements whose presence makes a paragraph more than text. Paragraphs
/// holding any of these are never pruned.
const EMBEDDED_CONTENT: &[&str] = &[
    "drawing",
    "pict",
    "object",
    "fldChar",
    "fldSimple",
    "footnoteReference",
    "endnoteReference",
    "sym",
    "txbxContent",
];

/// An opened template: the package plus the parsed main part.
///
/// Built from input bytes, edited in place, consumed once by [`Document::write`].
#[derive(Debug)]
pub struct Document {
    package: Package,
    tree: XmlTree,
}

impl Document {
    pub fn open(bytes: Vec<u8>) -> Result<Self, FillError> {
        let (package, xml) = Package::open(bytes)?;
        let tree = XmlTree::parse(xml)?;
        Ok(Self { package, tree })
    }

    pub fn tree(&self) -> &XmlTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut XmlTree {
        &mut self.tree
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Every attached paragraph in document order, including paragraphs in
    /// table cells and text boxes.
    pub fn paragraphs(&self) -> Vec<Paragraph> {
        self.tree
            .find_all("p")
            .into_iter()
            .map(Paragraph::new)
            .collect()
    }

    /// Serialize the main part and repack the container.
    pub fn write(self) -> Result<Vec<u8>, FillError> {
        self.package.write(&self.tree.serialize())
    }
}

/// Handle to a `w:p` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Paragraph {
    pub node: NodeId,
}

impl Paragraph {
    pub fn new(node: NodeId) -> Self {
        Self { node }
    }

    /// Paragraph style id from `w:pPr/w:pStyle`.
    pub fn style<'a>(&self, tree: &'a XmlTree) -> Option<&'a str> {
        let ppr = tree.child(self.node, "pPr")?;
        let style = tree.child(ppr, "pStyle")?;
        tree.element(style)?.attribute("val")
    }

    /// Whether the paragraph carries list metadata: a numbering reference or a
    /// list/bullet paragraph style.
    pub fn is_list_item(&self, tree: &XmlTree) -> bool {
        let numbered = tree
            .child(self.node, "pPr")
            .and_then(|ppr| tree.child(ppr, "numPr"))
            .is_some_and(|num_pr| {
                // numId 0 explicitly switches numbering off
                let num_id = tree
                    .child(num_pr, "numId")
                    .and_then(|n| tree.element(n))
                    .and_then(|el| el.attribute("val"));
                num_id != Some("0")
            });
        if numbered {
            return true;
        }
        self.style(tree).is_some_and(|style| {
            let style = style.to_lowercase();
            style.contains("list") || style.contains("bullet")
        })
    }

    /// Whether removing this paragraph would take more than text with it:
    /// embedded objects, fields, or a section break.
    pub fn has_structural_content(&self, tree: &XmlTree) -> bool {
        let section_break = tree
            .child(self.node, "pPr")
            .and_then(|ppr| tree.child(ppr, "sectPr"))
            .is_some();
        section_break || contains_any(tree, self.node, EMBEDDED_CONTENT)
    }

    /// Nearest ancestor that must keep at least one paragraph: a table cell
    /// or a text box. Content-control and custom XML wrappers in between are
    /// looked through.
    pub fn required_container(&self, tree: &XmlTree) -> Option<NodeId> {
        let mut current = tree.parent(self.node)?;
        loop {
            match tree.local_name(current)? {
                "tc" | "txbxContent" => return Some(current),
                "sdt" | "sdtContent" | "customXml" => current = tree.parent(current)?,
                _ => return None,
            }
        }
    }

    /// Whether this is the only paragraph left in its table cell or text
    /// box. Those containers must keep at least one paragraph.
    pub fn is_last_in_container(&self, tree: &XmlTree) -> bool {
        match self.required_container(tree) {
            Some(container) => container_paragraphs(tree, container) <= 1,
            None => false,
        }
    }

    /// Remove the paragraph from its parent. The last paragraph of a table
    /// cell or text box is emptied instead, keeping only its properties.
    pub fn remove(&self, tree: &mut XmlTree) {
        if self.is_last_in_container(tree) {
            let content: Vec<NodeId> = tree
                .children(self.node)
                .iter()
                .copied()
                .filter(|&c| tree.element(c).is_some() && !tree.is(c, "pPr"))
                .collect();
            for child in content {
                tree.detach(child);
            }
        } else {
            tree.detach(self.node);
        }
    }
}

/// Paragraphs belonging to `container` itself, not to a nested cell or
/// text box.
fn container_paragraphs(tree: &XmlTree, container: NodeId) -> usize {
    tree.children(container)
        .iter()
        .map(|&child| match tree.local_name(child) {
            Some("p") => 1,
            Some("tc") | Some("txbxContent") | None => 0,
            Some(_) => container_paragraphs(tree, child),
        })
        .sum()
}

fn contains_any(tree: &XmlTree, node: NodeId, names: &[&str]) -> bool {
    tree.children(node).iter().any(|&child| {
        tree.local_name(child).is_some_and(|name| names.contains(&name))
            || contains_any(tree, child, names)
    })
}
