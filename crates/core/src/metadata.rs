//! Metadata loader: GRC-style XML block descriptions and category trees.
//!
//! A `<block>` document becomes one [`BlockMetadataRecord`] identified by its
//! file stem. A `<cat>` document is a category tree; every `<block>` leaf maps
//! a block key to the `/`-joined names of the categories enclosing it.

use roxmltree::{Document, Node, ParsingOptions};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

use crate::config::DuplicateKeyPolicy;
use crate::error::{FatalError, MetadataError};
use crate::types::{BlockMetadataRecord, MetadataParam, MetadataSet, ParamOption};

/// One parsed metadata file.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataDocument {
    Block(BlockMetadataRecord),
    /// `(block key, category path)` pairs in document order.
    Categories(Vec<(String, String)>),
}

// ---------------------------------------------------------------------------
// XML helpers
// ---------------------------------------------------------------------------

fn child<'a, 'i>(node: Node<'a, 'i>, tag: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| n.has_tag_name(tag))
}

fn children<'a, 'i: 'a>(node: Node<'a, 'i>, tag: &'a str) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    node.children().filter(move |n| n.has_tag_name(tag))
}

/// Trimmed text of a child element; `None` when absent or empty.
fn child_text(node: Node, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn file_stem(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Document parsing
// ---------------------------------------------------------------------------

fn parse_option(path: &Path, node: Node) -> Option<ParamOption> {
    let Some(key) = child_text(node, "key") else {
        warn!(file = %path.display(), element = "option", name = ?child_text(node, "name"), "Dropping element without <key>");
        return None;
    };
    Some(ParamOption {
        name: child_text(node, "name").unwrap_or_else(|| key.clone()),
        key,
        opts: children(node, "opt").filter_map(|n| n.text()).map(|t| t.trim().to_string()).collect(),
    })
}

fn parse_param(path: &Path, node: Node) -> Option<MetadataParam> {
    let Some(key) = child_text(node, "key") else {
        warn!(file = %path.display(), element = "param", name = ?child_text(node, "name"), "Dropping element without <key>");
        return None;
    };
    let mut param = MetadataParam::new(key);
    param.name = child_text(node, "name");
    param.value = child_text(node, "value");
    param.ty = child_text(node, "type");
    param.hidden = child(node, "hide").is_some();
    param.options = children(node, "option").filter_map(|n| parse_option(path, n)).collect();
    Some(param)
}

fn parse_block(path: &Path, root: Node) -> Result<BlockMetadataRecord, MetadataError> {
    let missing = |field| MetadataError::MissingField { path: path.to_path_buf(), field };
    let key = child_text(root, "key").ok_or_else(|| missing("key"))?;
    let make = child_text(root, "make").ok_or_else(|| missing("make"))?;

    Ok(BlockMetadataRecord {
        id: file_stem(path),
        name: child_text(root, "name").unwrap_or_else(|| key.clone()),
        key,
        make,
        params: children(root, "param").filter_map(|n| parse_param(path, n)).collect(),
        callbacks: children(root, "callback")
            .filter_map(|n| n.text())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        category: child_text(root, "category"),
        source: path.to_path_buf(),
    })
}

fn collect_categories(node: Node, mut names: Vec<String>, out: &mut Vec<(String, String)>) {
    if let Some(name) = child_text(node, "name") {
        names.push(name);
    }
    let path = names.join("/");
    for block in children(node, "block").filter_map(|n| n.text()) {
        let key = block.trim();
        if !key.is_empty() {
            out.push((key.to_string(), path.clone()));
        }
    }
    for cat in children(node, "cat") {
        collect_categories(cat, names.clone(), out);
    }
}

/// Parse the text of one metadata file.
pub fn parse_document(path: &Path, text: &str) -> Result<MetadataDocument, MetadataError> {
    let options = ParsingOptions { allow_dtd: true, ..ParsingOptions::default() };
    let doc = Document::parse_with_options(text, options)
        .map_err(|e| MetadataError::Xml { path: path.to_path_buf(), message: e.to_string() })?;
    let root = doc.root_element();

    match root.tag_name().name() {
        "block" => parse_block(path, root).map(MetadataDocument::Block),
        "cat" => {
            let mut entries = Vec::new();
            collect_categories(root, Vec::new(), &mut entries);
            Ok(MetadataDocument::Categories(entries))
        }
        _ => Err(MetadataError::UnknownRoot { path: path.to_path_buf() }),
    }
}

/// Read and parse one metadata file from disk.
pub fn read_document(path: &Path) -> Result<MetadataDocument, MetadataError> {
    let bytes = std::fs::read(path).map_err(|source| MetadataError::Read { path: path.to_path_buf(), source })?;
    parse_document(path, &String::from_utf8_lossy(&bytes))
}

// ---------------------------------------------------------------------------
// Loading a set
// ---------------------------------------------------------------------------

/// Outcome of loading every metadata file of a run.
#[derive(Debug, Default)]
pub struct MetadataLoad {
    pub set: MetadataSet,
    /// Files that were skipped, with the reason.
    pub skipped: Vec<MetadataError>,
    /// Records dropped as duplicates under [`DuplicateKeyPolicy::KeepFirst`].
    pub duplicates: Vec<String>,
}

/// Load metadata files in the given order. Unreadable or malformed files are
/// skipped; a duplicate identifier or block key is fatal unless the policy
/// keeps the first record.
pub fn load_metadata(files: &[PathBuf], policy: DuplicateKeyPolicy) -> Result<MetadataLoad, FatalError> {
    let mut load = MetadataLoad::default();
    // block key -> source file of the record that claimed it
    let mut key_owner: BTreeMap<String, PathBuf> = BTreeMap::new();

    for path in files {
        let doc = match read_document(path) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(file = %path.display(), reason = %e, "Skipping metadata file");
                load.skipped.push(e);
                continue;
            }
        };

        match doc {
            MetadataDocument::Categories(entries) => {
                debug!(file = %path.display(), entries = entries.len(), "Loaded category tree");
                for (key, category) in entries {
                    load.set.categories.entry(key).or_default().push(category);
                }
            }
            MetadataDocument::Block(record) => {
                let clash = load
                    .set
                    .records
                    .get(&record.id)
                    .map(|r| (record.id.clone(), r.source.clone()))
                    .or_else(|| key_owner.get(&record.key).map(|p| (record.key.clone(), p.clone())));

                if let Some((key, first)) = clash {
                    match policy {
                        DuplicateKeyPolicy::Error => {
                            return Err(FatalError::DuplicateMetadata { key, first, second: path.clone() });
                        }
                        DuplicateKeyPolicy::KeepFirst => {
                            error!(key = %key, first = %first.display(), second = %path.display(), "Duplicate metadata; keeping first");
                            load.duplicates.push(key);
                            continue;
                        }
                    }
                }

                key_owner.insert(record.key.clone(), path.clone());
                load.set.records.insert(record.id.clone(), record);
            }
        }
    }

    debug!(
        records = load.set.records.len(),
        category_keys = load.set.categories.len(),
        skipped = load.skipped.len(),
        "Metadata loaded"
    );
    Ok(load)
}
