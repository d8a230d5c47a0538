//! Signature extraction: a block's factory function and the instance methods
//! that can be driven from its metadata ("calls").

use tracing::{info, warn};

use crate::config::GeneratorConfig;
use crate::error::SkipReason;
use crate::types::{BlockMetadataRecord, ParsedClass, ParsedMethod};

/// Factory and calls of one matched class.
#[derive(Debug, Clone)]
pub struct Signature<'a> {
    pub factory: &'a ParsedMethod,
    /// Fully-qualified callable for the factory.
    pub factory_path: String,
    /// Names of the class's non-getter block methods.
    pub block_methods: Vec<String>,
    /// Methods referenced by the metadata, in declaration order.
    pub calls: Vec<&'a ParsedMethod>,
    /// Methods dropped for exceeding the arity cap.
    pub dropped: Vec<String>,
    /// Methods with parameters that the metadata never mentions.
    pub unused: Vec<String>,
}

/// First public static member containing "make", else the first free function
/// of the header containing "make".
pub fn find_factory<'a>(class: &'a ParsedClass, functions: &'a [ParsedMethod]) -> Option<&'a ParsedMethod> {
    class
        .public_methods()
        .find(|m| m.is_static && m.name.contains("make"))
        .or_else(|| functions.iter().find(|f| f.name.contains("make")))
}

/// Callable path for a factory: `ns::Class::make` for static members,
/// `ns::make_x` for free functions.
pub fn factory_path(class: &ParsedClass, factory: &ParsedMethod) -> String {
    let scope = match factory.parent {
        Some(_) => class.qualified_name(),
        None => factory.namespace.clone(),
    };
    if scope.is_empty() {
        factory.name.clone()
    } else {
        format!("{}::{}", scope, factory.name)
    }
}

/// Public instance methods that are not lifecycle or runtime entry points.
/// Methods over the arity cap are returned separately.
pub fn block_methods<'a>(
    class: &'a ParsedClass,
    config: &GeneratorConfig,
) -> (Vec<&'a ParsedMethod>, Vec<String>) {
    let mut kept = Vec::new();
    let mut dropped = Vec::new();
    for method in class.public_methods() {
        if method.is_static || method.is_constructor || method.is_destructor {
            continue;
        }
        if config.reserved_methods.iter().any(|r| *r == method.name) {
            continue;
        }
        if method.arity() > config.max_args {
            warn!(class = %class.name, method = %method.name, params = method.arity(), "Too many parameters; method ignored");
            dropped.push(format!("{}::{}", class.name, method.name));
            continue;
        }
        kept.push(method);
    }
    (kept, dropped)
}

/// Split non-getter methods into those the metadata references (by name, in
/// the make template or any callback) and those it does not.
pub fn select_calls<'a>(
    class: &ParsedClass,
    methods: &[&'a ParsedMethod],
    record: &BlockMetadataRecord,
) -> (Vec<&'a ParsedMethod>, Vec<String>) {
    let callbacks = record.callbacks_text();
    let mut calls = Vec::new();
    let mut unused = Vec::new();
    for &method in methods.iter().filter(|m| m.arity() > 0) {
        if record.make.contains(&method.name) || callbacks.contains(&method.name) {
            calls.push(method);
        } else {
            info!(class = %class.name, method = %method.name, metadata = %record.key, "Method not used in metadata");
            unused.push(format!("{}::{}", class.name, method.name));
        }
    }
    (calls, unused)
}

/// Extract the full signature of a matched class.
pub fn extract<'a>(
    class: &'a ParsedClass,
    functions: &'a [ParsedMethod],
    record: &BlockMetadataRecord,
    config: &GeneratorConfig,
) -> Result<Signature<'a>, SkipReason> {
    let factory = find_factory(class, functions)
        .ok_or_else(|| SkipReason::NoFactory { class: class.qualified_name() })?;

    let (methods, dropped) = block_methods(class, config);
    let (calls, unused) = select_calls(class, &methods, record);

    Ok(Signature {
        factory,
        factory_path: factory_path(class, factory),
        block_methods: methods.iter().filter(|m| m.arity() > 0).map(|m| m.name.clone()).collect(),
        calls,
        dropped,
        unused,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Access, ParsedParameter};
    use std::path::PathBuf;

    fn method(name: &str, params: &[(&str, &str)]) -> ParsedMethod {
        ParsedMethod {
            name: name.into(),
            access: Access::Public,
            is_static: false,
            is_constructor: false,
            is_destructor: false,
            parameters: params.iter().map(|(n, t)| ParsedParameter::new(*n, *t)).collect(),
            namespace: "gr::blocks".into(),
            parent: Some("delay".into()),
        }
    }

    fn static_method(name: &str) -> ParsedMethod {
        ParsedMethod { is_static: true, ..method(name, &[("n", "int")]) }
    }

    fn class(methods: Vec<ParsedMethod>) -> ParsedClass {
        ParsedClass {
            name: "delay".into(),
            namespace: "gr::blocks".into(),
            bases: vec![],
            doxygen: String::new(),
            methods,
        }
    }

    fn record(make: &str, callbacks: &[&str]) -> BlockMetadataRecord {
        BlockMetadataRecord {
            id: "blocks_delay".into(),
            key: "blocks_delay".into(),
            name: "Delay".into(),
            make: make.into(),
            params: vec![],
            callbacks: callbacks.iter().map(|s| s.to_string()).collect(),
            category: None,
            source: PathBuf::new(),
        }
    }

    #[test]
    fn test_static_factory_preferred() {
        let c = class(vec![method("make_thing", &[]), static_method("make")]);
        let free = vec![ParsedMethod { parent: None, ..method("make_delay", &[]) }];
        let factory = find_factory(&c, &free).unwrap();
        assert_eq!(factory.name, "make");
        assert_eq!(factory_path(&c, factory), "gr::blocks::delay::make");
    }

    #[test]
    fn test_free_function_factory_fallback() {
        let c = class(vec![method("set_dly", &[("d", "int")])]);
        let free = vec![
            ParsedMethod { parent: None, ..method("helper", &[]) },
            ParsedMethod { parent: None, ..method("make_delay", &[]) },
        ];
        let factory = find_factory(&c, &free).unwrap();
        assert_eq!(factory.name, "make_delay");
        assert_eq!(factory_path(&c, factory), "gr::blocks::make_delay");
    }

    #[test]
    fn test_missing_factory_skips_class() {
        let c = class(vec![method("set_dly", &[("d", "int")])]);
        let err = extract(&c, &[], &record("", &[]), &GeneratorConfig::default()).unwrap_err();
        assert_eq!(err, SkipReason::NoFactory { class: "gr::blocks::delay".into() });
    }

    #[test]
    fn test_block_methods_filters() {
        let mut ctor = method("delay", &[("d", "int")]);
        ctor.is_constructor = true;
        let mut private = method("secret", &[("x", "int")]);
        private.access = Access::Private;
        let wide: Vec<(&str, &str)> = (0..9).map(|_| ("a", "int")).collect();
        let c = class(vec![
            static_method("make"),
            ctor,
            private,
            method("work", &[("n", "int")]),
            method("dly", &[]),
            method("set_dly", &[("d", "int")]),
            method("too_wide", &wide),
        ]);
        let (kept, dropped) = block_methods(&c, &GeneratorConfig::default());
        let names: Vec<_> = kept.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["dly", "set_dly"]);
        assert_eq!(dropped, vec!["delay::too_wide"]);
    }

    #[test]
    fn test_calls_must_be_referenced_by_metadata() {
        let c = class(vec![
            static_method("make"),
            method("dly", &[]),
            method("set_dly", &[("d", "int")]),
            method("set_tag_mode", &[("m", "int")]),
            method("reset", &[("hard", "bool")]),
        ]);
        let r = record("blocks.delay($type.size, $delay)\nself.$(id).reset(True)", &["set_dly($delay)"]);
        let sig = extract(&c, &[], &r, &GeneratorConfig::default()).unwrap();
        let calls: Vec<_> = sig.calls.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(calls, vec!["set_dly", "reset"]);
        assert_eq!(sig.unused, vec!["delay::set_tag_mode"]);
        assert_eq!(sig.block_methods, vec!["set_dly", "set_tag_mode", "reset"]);
    }
}
