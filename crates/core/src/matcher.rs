//! Class-to-metadata matching.
//!
//! A class is matched by its namespace-qualified identifier
//! (`gr::blocks::add_ff` → `blocks_add_ff` once the legacy `gr_` prefix is
//! gone) against metadata file stems: exact first, then by ignoring a short
//! trailing data-type suffix on both sides, then by comparing the
//! suffix-stripped candidate against a type-generic identifier.

use std::collections::BTreeSet;

use crate::error::SkipReason;
use crate::types::ParsedClass;

/// The identifier a class is expected to appear under in the metadata set.
pub fn candidate_name(class: &ParsedClass, legacy_prefix: &str) -> String {
    let qualified = format!("{}_{}", class.namespace.replace("::", "_"), class.name);
    match qualified.strip_prefix(legacy_prefix) {
        Some(rest) if !legacy_prefix.is_empty() => rest.to_string(),
        _ => qualified,
    }
}

/// Split `<stem>_<suffix>` where the suffix is 1-3 ASCII alphanumerics.
pub fn split_dtype(name: &str) -> Option<(&str, &str)> {
    let (stem, suffix) = name.rsplit_once('_')?;
    let is_dtype = !suffix.is_empty() && suffix.len() <= 3 && suffix.chars().all(|c| c.is_ascii_alphanumeric());
    is_dtype.then_some((stem, suffix))
}

/// Find the metadata identifier for a class.
pub fn match_class(
    class: &ParsedClass,
    ids: &BTreeSet<String>,
    legacy_prefix: &str,
) -> Result<String, SkipReason> {
    let candidate = candidate_name(class, legacy_prefix);
    if ids.contains(&candidate) {
        return Ok(candidate);
    }

    if let Some((stem, _)) = split_dtype(&candidate) {
        let same_stem = ids.iter().find(|id| split_dtype(id).is_some_and(|(s, _)| s == stem));
        if let Some(id) = same_stem {
            return Ok(id.clone());
        }
        if ids.contains(stem) {
            return Ok(stem.to_string());
        }
    }

    Err(SkipReason::NoMetadataMatch { class: class.qualified_name(), candidate })
}
