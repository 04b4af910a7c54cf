//! Writing values into the runs a placeholder occupies.

use crate::scanner::PlaceholderMatch;
use crate::tokenizer::{logical_text, AtomKind};
use crate::xml::{NodeId, XmlTree};
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

/// Value for one placeholder key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValue {
    pub text: String,
    /// Intentionally left blank by the caller.
    pub blank: bool,
}

impl FieldValue {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            blank: false,
        }
    }

    pub fn blank() -> Self {
        Self {
            text: String::new(),
            blank: true,
        }
    }

    /// True when the value leaves nothing visible behind in the document.
    pub fn is_empty(&self) -> bool {
        self.blank || self.text.trim().is_empty()
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<Option<String>> for FieldValue {
    fn from(text: Option<String>) -> Self {
        text.map_or_else(Self::blank, Self::new)
    }
}

/// Source of placeholder values. `None` means the key is unknown.
pub trait FieldSource {
    fn lookup(&self, key: &str) -> Option<FieldValue>;
}

impl<S: BuildHasher> FieldSource for HashMap<String, String, S> {
    fn lookup(&self, key: &str) -> Option<FieldValue> {
        self.get(key).map(|v| FieldValue::new(v.as_str()))
    }
}

impl<S: BuildHasher> FieldSource for HashMap<String, FieldValue, S> {
    fn lookup(&self, key: &str) -> Option<FieldValue> {
        self.get(key).cloned()
    }
}

impl FieldSource for BTreeMap<String, String> {
    fn lookup(&self, key: &str) -> Option<FieldValue> {
        self.get(key).map(|v| FieldValue::new(v.as_str()))
    }
}

impl FieldSource for BTreeMap<String, FieldValue> {
    fn lookup(&self, key: &str) -> Option<FieldValue> {
        self.get(key).cloned()
    }
}

impl<T: FieldSource + ?Sized> FieldSource for &T {
    fn lookup(&self, key: &str) -> Option<FieldValue> {
        (**self).lookup(key)
    }
}

/// Substitute `matches` in `paragraph`, returning how many were replaced.
///
/// `resolve` maps a key to its value; `None` leaves that placeholder as
/// literal text. Matches are applied from the last to the first so that the
/// offsets of the ones still pending stay valid, and the logical text is
/// rebuilt from the tree before each one.
pub fn apply<F>(tree: &mut XmlTree, paragraph: NodeId, matches: &[PlaceholderMatch], mut resolve: F) -> usize
where
    F: FnMut(&str) -> Option<FieldValue>,
{
    let mut ordered: Vec<&PlaceholderMatch> = matches
        .iter()
        .filter(|m| m.paragraph == paragraph)
        .collect();
    ordered.sort_by(|a, b| b.start.cmp(&a.start));

    let mut replaced = 0;
    for m in ordered {
        let Some(value) = resolve(&m.key) else {
            continue;
        };
        if replace_span(tree, paragraph, m.start, m.end, &value.text) {
            log::debug!("«{}» -> {:?}", m.key, value.text);
            replaced += 1;
        }
    }
    replaced
}

/// Replace logical characters `start..end` of `paragraph` with `value`.
///
/// The value goes into the first touched run, right after whatever text of
/// that run precedes the span, so it keeps that run's `w:rPr`. Atoms fully
/// inside the span are dropped; the last touched atom keeps only its text
/// after the span. Later runs left without content are removed, which
/// collapses a placeholder fragmented over several runs into one.
fn replace_span(tree: &mut XmlTree, paragraph: NodeId, start: usize, end: usize, value: &str) -> bool {
    let view = logical_text(tree, paragraph);
    let (Some(first), Some(last)) = (view.position(start), end.checked_sub(1).and_then(|e| view.position(e))) else {
        return false;
    };

    let first_atom = view.atom(first).clone();
    let last_atom = view.atom(last).clone();
    let first_run = view.runs[first.run].node;
    let ns = tree
        .element(first_run)
        .and_then(|el| el.prefix())
        .map(str::to_string);
    let same_atom = first.run == last.run && first.atom == last.atom;

    let prefix: String = first_atom.text.chars().take(first.offset).collect();
    let suffix: String = last_atom.text.chars().skip(last.offset + 1).collect();
    let keep_first = first_atom.kind == AtomKind::Text && !prefix.is_empty();

    if keep_first {
        set_atom_text(tree, first_atom.node, &prefix);
    }
    let mut anchor = first_atom.node;
    for node in value_nodes(tree, ns.as_deref(), value) {
        tree.insert_after(anchor, node);
        anchor = node;
    }
    if same_atom && !suffix.is_empty() {
        let node = text_atom(tree, ns.as_deref(), &suffix);
        tree.insert_after(anchor, node);
    }
    if !keep_first {
        tree.detach(first_atom.node);
    }

    // atoms strictly between the first and last touched ones
    for (run_idx, run) in view.runs.iter().enumerate().take(last.run + 1).skip(first.run) {
        for (atom_idx, atom) in run.atoms.iter().enumerate() {
            let after_first = (run_idx, atom_idx) > (first.run, first.atom);
            let before_last = (run_idx, atom_idx) < (last.run, last.atom);
            if after_first && before_last {
                tree.detach(atom.node);
            }
        }
    }

    if !same_atom {
        if last_atom.kind == AtomKind::Text && !suffix.is_empty() {
            set_atom_text(tree, last_atom.node, &suffix);
        } else {
            tree.detach(last_atom.node);
        }
    }

    for run in &view.runs[first.run + 1..=last.run] {
        if run_is_empty(tree, run.node) {
            tree.detach(run.node);
        }
    }
    true
}

fn qualified(ns: Option<&str>, local: &str) -> String {
    match ns {
        Some(ns) => format!("{}:{}", ns, local),
        None => local.to_string(),
    }
}

/// Word drops leading/trailing spaces of `w:t` unless told to keep them.
fn needs_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) || text.contains("  ")
}

fn set_atom_text(tree: &mut XmlTree, node: NodeId, text: &str) {
    tree.set_text(node, text);
    if needs_preserve(text) {
        tree.set_attribute(node, "xml:space", "preserve");
    }
}

fn text_atom(tree: &mut XmlTree, ns: Option<&str>, text: &str) -> NodeId {
    let name = qualified(ns, "t");
    let attrs: &[(&str, &str)] = if needs_preserve(text) {
        &[("xml:space", "preserve")]
    } else {
        &[]
    };
    tree.create_element(&name, attrs, Some(text))
}

/// Detached run children spelling out `value`: text in `w:t`, line breaks
/// as `w:br`, tabs as `w:tab`.
fn value_nodes(tree: &mut XmlTree, ns: Option<&str>, value: &str) -> Vec<NodeId> {
    let mut nodes = Vec::new();
    let mut pending = String::new();
    for ch in value.chars() {
        let special = match ch {
            '\n' => Some("br"),
            '\t' => Some("tab"),
            '\r' => continue,
            _ => None,
        };
        match special {
            Some(local) => {
                if !pending.is_empty() {
                    nodes.push(text_atom(tree, ns, &pending));
                    pending.clear();
                }
                nodes.push(tree.create_element(&qualified(ns, local), &[], None));
            }
            None => pending.push(ch),
        }
    }
    if !pending.is_empty() {
        nodes.push(text_atom(tree, ns, &pending));
    }
    nodes
}

fn run_is_empty(tree: &XmlTree, run: NodeId) -> bool {
    tree.children(run)
        .iter()
        .all(|&c| tree.element(c).is_none() || tree.is(c, "rPr"))
}
