//! Block classification: which parsed classes are pluggable blocks.

use tracing::{debug, info};

use crate::config::GeneratorConfig;
use crate::types::{Access, ParsedClass};

/// Accept a class when it is not blacklisted and publicly inherits one of the
/// configured known bases directly. Bases of bases are never examined.
pub fn is_block(class: &ParsedClass, config: &GeneratorConfig) -> bool {
    if config.namespace_blacklist.iter().any(|ns| *ns == class.namespace) {
        info!(class = %class.qualified_name(), "Namespace blacklisted");
        return false;
    }

    let qualified = class.qualified_name();
    if config.class_blacklist.iter().any(|c| *c == qualified) {
        info!(class = %qualified, "Class blacklisted");
        return false;
    }

    let base = class
        .bases
        .iter()
        .find(|b| b.access == Access::Public && config.is_known_base(&b.name));
    match base {
        Some(b) => {
            debug!(class = %qualified, base = %b.name, "Accepted block");
            true
        }
        None => false,
    }
}

/// Filter a header's classes down to blocks, preserving declaration order.
pub fn blocks<'a>(
    classes: &'a [ParsedClass],
    config: &'a GeneratorConfig,
) -> impl Iterator<Item = &'a ParsedClass> + 'a {
    classes.iter().filter(move |c| is_block(c, config))
}
