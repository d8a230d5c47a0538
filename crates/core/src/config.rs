//! Generator configuration: blacklists, known base classes, directory names and
//! matching thresholds. Defaults reproduce the stock GNU Radio setup; a
//! `blockgen.toml` file can extend or override them.

use std::path::Path;
use tracing::{debug, warn};

use crate::types::{DEFAULT_SIMILARITY_CUTOFF, MAX_ARGS};

/// Config file looked up in the first root when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "blockgen.toml";

/// Known keys in `blockgen.toml` for config validation.
const KNOWN_CONFIG_KEYS: &[&str] = &[
    "known_bases",
    "base_prefix",
    "namespace_blacklist",
    "class_blacklist",
    "target_blacklist",
    "reserved_methods",
    "max_args",
    "include_dir",
    "metadata_dir",
    "header_extensions",
    "metadata_extensions",
    "legacy_prefix",
    "similarity_cutoff",
    "meta_fallback",
    "duplicate_keys",
    "strict_headers",
];

// ---------------------------------------------------------------------------
// Configuration types
// ---------------------------------------------------------------------------

/// What to do when two metadata records share a key or file stem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKeyPolicy {
    /// Abort the run.
    Error,
    /// Keep the first record, log the duplicate.
    KeepFirst,
}

impl DuplicateKeyPolicy {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "error" => Some(Self::Error),
            "first" => Some(Self::KeepFirst),
            _ => None,
        }
    }
}

/// Runtime configuration for one generator run.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Base class names that mark a class as a block.
    pub known_bases: Vec<String>,
    /// Namespace prefix under which `known_bases` are also accepted.
    pub base_prefix: String,
    pub namespace_blacklist: Vec<String>,
    /// Fully-qualified `ns::Class` names never treated as blocks.
    pub class_blacklist: Vec<String>,
    /// Build targets for which an empty registration is emitted.
    pub target_blacklist: Vec<String>,
    /// Runtime processing entry points, never exposed as calls.
    pub reserved_methods: Vec<String>,
    pub max_args: usize,
    pub include_dir: String,
    pub metadata_dir: String,
    pub header_extensions: Vec<String>,
    pub metadata_extensions: Vec<String>,
    /// Stripped from derived class identifiers before matching.
    pub legacy_prefix: String,
    pub similarity_cutoff: f64,
    /// Emit group members individually when meta-block synthesis fails.
    pub meta_fallback: bool,
    pub duplicate_keys: DuplicateKeyPolicy,
    /// Skip headers whose parse tree contains syntax errors.
    pub strict_headers: bool,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            known_bases: strings(&["block", "sync_block", "sync_interpolator", "sync_decimator"]),
            base_prefix: "gr::".to_string(),
            namespace_blacklist: Vec::new(),
            class_blacklist: strings(&[
                "gr::blocks::multiply_matrix_cc",
                "gr::blocks::multiply_matrix_ff",
            ]),
            target_blacklist: strings(&["gnuradio-runtime", "gnuradio-pmt", "gnuradio-qtgui"]),
            reserved_methods: strings(&["work", "general_work", "forecast"]),
            max_args: MAX_ARGS,
            include_dir: "include".to_string(),
            metadata_dir: "grc".to_string(),
            header_extensions: strings(&["h"]),
            metadata_extensions: strings(&["xml"]),
            legacy_prefix: "gr_".to_string(),
            similarity_cutoff: DEFAULT_SIMILARITY_CUTOFF,
            meta_fallback: false,
            duplicate_keys: DuplicateKeyPolicy::Error,
            strict_headers: false,
        }
    }
}

impl GeneratorConfig {
    /// Whether `name` matches a known base, bare or under `base_prefix`.
    pub fn is_known_base(&self, name: &str) -> bool {
        self.known_bases.iter().any(|b| {
            name == b
                || (!self.base_prefix.is_empty()
                    && name.strip_prefix(self.base_prefix.as_str()) == Some(b.as_str()))
        })
    }

    pub fn is_blacklisted_target(&self, target: &str) -> bool {
        self.target_blacklist.iter().any(|t| t == target)
    }

    /// Apply overrides from a parsed TOML table. List-valued blacklists and
    /// known bases extend the defaults; everything else replaces them.
    pub fn apply_table(&mut self, table: &toml::Table) {
        for key in table.keys() {
            if !KNOWN_CONFIG_KEYS.contains(&key.as_str()) {
                warn_unknown_key(key);
            }
        }

        let extend = |target: &mut Vec<String>, key: &str| {
            if let Some(items) = table.get(key).and_then(|v| v.as_array()) {
                for item in items.iter().filter_map(|v| v.as_str()) {
                    if !target.iter().any(|t| t == item) {
                        target.push(item.to_string());
                    }
                }
            }
        };
        extend(&mut self.known_bases, "known_bases");
        extend(&mut self.namespace_blacklist, "namespace_blacklist");
        extend(&mut self.class_blacklist, "class_blacklist");
        extend(&mut self.target_blacklist, "target_blacklist");
        extend(&mut self.reserved_methods, "reserved_methods");

        let replace = |target: &mut Vec<String>, key: &str| {
            if let Some(items) = table.get(key).and_then(|v| v.as_array()) {
                *target = items.iter().filter_map(|v| v.as_str().map(|s| s.to_string())).collect();
            }
        };
        replace(&mut self.header_extensions, "header_extensions");
        replace(&mut self.metadata_extensions, "metadata_extensions");

        let string = |target: &mut String, key: &str| {
            if let Some(s) = table.get(key).and_then(|v| v.as_str()) {
                *target = s.to_string();
            }
        };
        string(&mut self.base_prefix, "base_prefix");
        string(&mut self.include_dir, "include_dir");
        string(&mut self.metadata_dir, "metadata_dir");
        string(&mut self.legacy_prefix, "legacy_prefix");

        if let Some(n) = table.get("max_args").and_then(|v| v.as_integer()) {
            match usize::try_from(n) {
                Ok(n) => self.max_args = n,
                Err(_) => warn!(value = n, "Ignoring negative max_args"),
            }
        }
        if let Some(c) = table.get("similarity_cutoff").and_then(|v| v.as_float()) {
            if (0.0..=1.0).contains(&c) {
                self.similarity_cutoff = c;
            } else {
                warn!(value = c, "similarity_cutoff must be within [0, 1]; keeping default");
            }
        }
        if let Some(b) = table.get("meta_fallback").and_then(|v| v.as_bool()) {
            self.meta_fallback = b;
        }
        if let Some(b) = table.get("strict_headers").and_then(|v| v.as_bool()) {
            self.strict_headers = b;
        }
        if let Some(s) = table.get("duplicate_keys").and_then(|v| v.as_str()) {
            match DuplicateKeyPolicy::parse(s) {
                Some(p) => self.duplicate_keys = p,
                None => warn!(value = s, "duplicate_keys must be 'error' or 'first'"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Simple Levenshtein edit distance for typo suggestions.
fn edit_distance(a: &str, b: &str) -> usize {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn warn_unknown_key(key: &str) {
    let suggestion = KNOWN_CONFIG_KEYS.iter().min_by_key(|k| edit_distance(key, k));
    match suggestion {
        Some(s) if edit_distance(key, s) <= 3 => {
            warn!(key, suggestion = *s, "Unknown config key; did you mean '{s}'?");
        }
        _ => warn!(key, "Unknown config key (known keys: {})", KNOWN_CONFIG_KEYS.join(", ")),
    }
}

/// Load configuration from an explicit file, or from `blockgen.toml` in
/// `search_root` when no file is given. Missing or unparsable files fall back
/// to defaults with a warning.
pub fn load_config(explicit: Option<&Path>, search_root: Option<&Path>) -> GeneratorConfig {
    let mut config = GeneratorConfig::default();

    let path = match (explicit, search_root) {
        (Some(p), _) => p.to_path_buf(),
        (None, Some(root)) => root.join(CONFIG_FILE_NAME),
        (None, None) => return config,
    };

    if !path.exists() {
        if explicit.is_some() {
            warn!(path = %path.display(), "Config file not found; using defaults");
        }
        return config;
    }

    debug!(path = %path.display(), "Loading config");
    match std::fs::read_to_string(&path) {
        Ok(content) => match content.parse::<toml::Table>() {
            Ok(table) => config.apply_table(&table),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to parse config"),
        },
        Err(e) => warn!(path = %path.display(), error = %e, "Could not read config"),
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_base_with_prefix() {
        let cfg = GeneratorConfig::default();
        assert!(cfg.is_known_base("sync_block"));
        assert!(cfg.is_known_base("gr::sync_block"));
        assert!(!cfg.is_known_base("gr::basic_block"));
        assert!(!cfg.is_known_base("other::sync_block"));
    }

    #[test]
    fn test_apply_table_extends_lists_and_replaces_scalars() {
        let mut cfg = GeneratorConfig::default();
        let table: toml::Table = r#"
            known_bases = ["tagged_stream_block"]
            class_blacklist = ["gr::foo::bar"]
            max_args = 4
            metadata_dir = "blocks"
            duplicate_keys = "first"
            meta_fallback = true
            header_extensions = ["h", "hpp"]
        "#
        .parse()
        .unwrap();
        cfg.apply_table(&table);

        assert!(cfg.is_known_base("gr::tagged_stream_block"));
        assert!(cfg.is_known_base("sync_block"), "defaults should be kept");
        assert!(cfg.class_blacklist.contains(&"gr::foo::bar".to_string()));
        assert!(cfg.class_blacklist.contains(&"gr::blocks::multiply_matrix_cc".to_string()));
        assert_eq!(cfg.max_args, 4);
        assert_eq!(cfg.metadata_dir, "blocks");
        assert_eq!(cfg.duplicate_keys, DuplicateKeyPolicy::KeepFirst);
        assert!(cfg.meta_fallback);
        assert_eq!(cfg.header_extensions, vec!["h", "hpp"]);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let mut cfg = GeneratorConfig::default();
        let table: toml::Table =
            "similarity_cutoff = 4.0\nduplicate_keys = \"last\"\nmax_args = -1".parse().unwrap();
        cfg.apply_table(&table);
        assert_eq!(cfg.similarity_cutoff, DEFAULT_SIMILARITY_CUTOFF);
        assert_eq!(cfg.duplicate_keys, DuplicateKeyPolicy::Error);
        assert_eq!(cfg.max_args, MAX_ARGS);
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("max_arg", "max_args"), 1);
        assert_eq!(edit_distance("", "abc"), 3);
    }

    #[test]
    fn test_load_config_from_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "target_blacklist = [\"my-target\"]\n")
            .unwrap();
        let cfg = load_config(None, Some(dir.path()));
        assert!(cfg.is_blacklisted_target("my-target"));
        assert!(cfg.is_blacklisted_target("gnuradio-pmt"));
    }

    #[test]
    fn test_load_config_unparsable_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "max_args = [").unwrap();
        let cfg = load_config(Some(&path), None);
        assert_eq!(cfg.max_args, MAX_ARGS);
    }
}
