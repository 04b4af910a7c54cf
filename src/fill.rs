//! The per-document pipeline: open, scan, substitute, prune, write.

use crate::document::Document;
use crate::error::FillError;
use crate::prune::{prune, ListPruning, ParagraphOrigin};
use crate::scanner::{scan, PlaceholderMatch};
use crate::substitute::{apply, FieldSource, FieldValue};
use crate::tokenizer::logical_text;
use std::collections::{BTreeSet, HashMap};

/// What to do with a placeholder whose key has no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKeys {
    /// Substitute an empty value.
    #[default]
    Blank,
    /// Leave `«Key»` in the document as written.
    KeepLiteral,
}

/// Configuration for filling one document.
#[derive(Debug, Clone, Default)]
pub struct FillOptions {
    pub unknown_keys: UnknownKeys,
    /// Skip the pruning pass entirely.
    pub no_prune: bool,
    pub list_pruning: ListPruning,
}

impl FillOptions {
    /// Leave unknown placeholders untouched instead of blanking them.
    pub fn keep_unknown() -> Self {
        Self {
            unknown_keys: UnknownKeys::KeepLiteral,
            ..Self::default()
        }
    }

    pub fn without_pruning(mut self) -> Self {
        self.no_prune = true;
        self
    }

    pub fn with_list_pruning(mut self, list_pruning: ListPruning) -> Self {
        self.list_pruning = list_pruning;
        self
    }
}

/// What happened while filling one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillReport {
    pub paragraphs: usize,
    pub substitutions: usize,
    /// Keys found in the template with no value supplied.
    pub unknown_keys: BTreeSet<String>,
    /// `«` openings that never closed (left as literal text).
    pub unterminated: usize,
    pub pruned: usize,
}

/// A generated document and its report.
#[derive(Debug, Clone)]
pub struct FilledDocument {
    pub bytes: Vec<u8>,
    pub report: FillReport,
}

/// Fill `template` with `values` and return the generated DOCX.
pub fn fill(
    template: &[u8],
    values: &dyn FieldSource,
    options: &FillOptions,
) -> Result<FilledDocument, FillError> {
    let mut document = Document::open(template.to_vec())?;
    let report = fill_document(&mut document, values, options);
    let bytes = document.write()?;
    Ok(FilledDocument { bytes, report })
}

/// Run substitution and pruning over an opened document, in place.
pub fn fill_document(
    document: &mut Document,
    values: &dyn FieldSource,
    options: &FillOptions,
) -> FillReport {
    let paragraphs = document.paragraphs();
    let mut report = FillReport {
        paragraphs: paragraphs.len(),
        ..FillReport::default()
    };
    let mut origins = Vec::with_capacity(paragraphs.len());

    for paragraph in paragraphs {
        let tree = document.tree();
        let view = logical_text(tree, paragraph.node);
        let text = view.text();

        let placeholders = scan(paragraph.node, text);
        let matches: Vec<PlaceholderMatch> = placeholders.clone().collect();
        for start in placeholders.unterminated() {
            log::warn!(
                "Unterminated placeholder left as text at char {}: {:?}",
                start,
                excerpt(text, start)
            );
            report.unterminated += 1;
        }

        if matches.is_empty() {
            origins.push(ParagraphOrigin::plain(paragraph));
            continue;
        }

        let mut resolved: HashMap<&str, Option<FieldValue>> = HashMap::new();
        for m in &matches {
            resolved.entry(m.key.as_str()).or_insert_with(|| {
                match values.lookup(&m.key) {
                    Some(value) => Some(value),
                    None => {
                        report.unknown_keys.insert(m.key.clone());
                        match options.unknown_keys {
                            UnknownKeys::Blank => Some(FieldValue::default()),
                            UnknownKeys::KeepLiteral => None,
                        }
                    }
                }
            });
        }

        let origin = ParagraphOrigin {
            paragraph,
            had_placeholders: true,
            placeholder_only: outside_matches(text, &matches).trim().is_empty(),
            all_blank: matches
                .iter()
                .all(|m| resolved[m.key.as_str()].as_ref().is_some_and(FieldValue::is_empty)),
        };
        origins.push(origin);

        report.substitutions += apply(document.tree_mut(), paragraph.node, &matches, |key| {
            resolved.get(key).cloned().flatten()
        });
    }

    for key in &report.unknown_keys {
        log::debug!("No value for «{}»", key);
    }

    if !options.no_prune {
        report.pruned = prune(document.tree_mut(), &origins, options.list_pruning);
    }
    report
}

/// Every placeholder key used in a template, sorted and de-duplicated.
pub fn list_placeholders(template: &[u8]) -> Result<Vec<String>, FillError> {
    let document = Document::open(template.to_vec())?;
    let tree = document.tree();
    let mut keys = BTreeSet::new();
    for paragraph in document.paragraphs() {
        let view = logical_text(tree, paragraph.node);
        keys.extend(scan(paragraph.node, view.text()).map(|m| m.key));
    }
    Ok(keys.into_iter().collect())
}

/// Text of the paragraph with every matched span removed.
fn outside_matches(text: &str, matches: &[PlaceholderMatch]) -> String {
    text.chars()
        .enumerate()
        .filter(|(i, _)| !matches.iter().any(|m| (m.start..m.end).contains(i)))
        .map(|(_, ch)| ch)
        .collect()
}

fn excerpt(text: &str, start: usize) -> String {
    text.chars().skip(start).take(40).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outside_matches() {
        let matches: Vec<PlaceholderMatch> = scan(0, " «A» «B» ").collect();
        assert_eq!(outside_matches(" «A» «B» ", &matches), "   ");
        let matches: Vec<PlaceholderMatch> = scan(0, "Date: «D»").collect();
        assert_eq!(outside_matches("Date: «D»", &matches), "Date: ");
    }

    #[test]
    fn test_options_builders() {
        let options = FillOptions::keep_unknown()
            .without_pruning()
            .with_list_pruning(ListPruning::AllListItems);
        assert_eq!(options.unknown_keys, UnknownKeys::KeepLiteral);
        assert!(options.no_prune);
        assert_eq!(options.list_pruning, ListPruning::AllListItems);

        let defaults = FillOptions::default();
        assert_eq!(defaults.unknown_keys, UnknownKeys::Blank);
        assert!(!defaults.no_prune);
        assert_eq!(defaults.list_pruning, ListPruning::PlaceholderParagraphs);
    }
}
