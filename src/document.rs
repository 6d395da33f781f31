//! Reading scalar fields out of descriptor documents.
//!
//! Lookups go through a parsed `roxmltree` tree, while all rewriting happens
//! on the raw text (see [`crate::rewrite`]), so the tree is only ever read.

use std::path::{Path, PathBuf};

use roxmltree::{Node, ParsingOptions};
use tracing::{info, warn};

use crate::{
    encoding::{DecodedText, TextEncoding},
    error::DocumentError,
    models::VersionTag,
};

/// A descriptor file decoded into text, ready for field lookups.
#[derive(Debug, Clone)]
pub struct DescriptorDocument {
    path: PathBuf,
    text: String,
}

impl DescriptorDocument {
    /// Read and decode the file at `path`.
    pub fn load(path: &Path, default_encoding: TextEncoding) -> Result<Self, DocumentError> {
        let bytes = std::fs::read(path).map_err(|e| DocumentError::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let decoded = DecodedText::from_declared(&bytes, default_encoding);
        Ok(Self::from_text(path, decoded.text))
    }

    pub fn from_text(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    /// Text of the element at `tag`, or `None` if any step of the path is
    /// missing or the element holds no text.
    ///
    /// Each step prefers a direct child with the step's name and otherwise
    /// takes the first matching descendant in document order. Among
    /// same-named siblings the first wins.
    pub fn field(&self, tag: &VersionTag) -> Result<Option<String>, DocumentError> {
        self.with_tree(|doc| {
            let mut node = doc.root();
            for segment in tag.segments() {
                match step(node, segment) {
                    Some(next) => node = next,
                    None => return None,
                }
            }
            node.text().map(str::to_string)
        })
    }

    /// Text of the first element named `name` anywhere in the document.
    pub fn first_element_text(&self, name: &str) -> Result<Option<String>, DocumentError> {
        self.with_tree(|doc| {
            doc.descendants()
                .find(|n| is_element_named(n, name))
                .and_then(|n| n.text())
                .map(str::to_string)
        })
    }

    fn with_tree<R>(&self, f: impl FnOnce(&roxmltree::Document<'_>) -> R) -> Result<R, DocumentError> {
        let mut options = ParsingOptions::default();
        options.allow_dtd = true;

        let text = self.text.strip_prefix('\u{feff}').unwrap_or(&self.text);
        let doc = roxmltree::Document::parse_with_options(text, options).map_err(|e| {
            DocumentError::Malformed {
                path: self.path.clone(),
                message: e.to_string(),
            }
        })?;
        Ok(f(&doc))
    }
}

fn is_element_named(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn step<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| is_element_named(child, name))
        .or_else(|| {
            node.descendants()
                .skip(1)
                .find(|descendant| is_element_named(descendant, name))
        })
}

/// Read the version at `tag` from `path`.
///
/// Unreadable or malformed files are logged and reported as absent so the
/// merge can still go ahead without reconciliation.
pub fn read_version(path: &Path, tag: &VersionTag, default_encoding: TextEncoding) -> Option<String> {
    let value = DescriptorDocument::load(path, default_encoding)
        .and_then(|doc| doc.field(tag))
        .unwrap_or_else(|e| {
            warn!(error = %e, "Error while parsing descriptor, treating version as absent");
            None
        });
    info!(
        "Read version {} for {} from {}",
        value.as_deref().unwrap_or("<none>"),
        tag,
        path.display()
    );
    value
}

/// Read the first `name` element from `path`, with the same failure handling
/// as [`read_version`].
pub fn read_aux_tag(path: &Path, name: &str, default_encoding: TextEncoding) -> Option<String> {
    DescriptorDocument::load(path, default_encoding)
        .and_then(|doc| doc.first_element_text(name))
        .unwrap_or_else(|e| {
            warn!(error = %e, "Error while parsing descriptor, treating {} as absent", name);
            None
        })
}
