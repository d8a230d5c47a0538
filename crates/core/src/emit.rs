//! Registration emitter: descriptor JSON and the generated C++ source.
//!
//! The registration model is flattened into a render context (argument lists
//! joined, symbols computed) and substituted into an embedded tera template.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tera::{Context, Tera, Value};

use crate::error::FatalError;
use crate::types::*;

const TEMPLATE_NAME: &str = "registration.cpp";
const TEMPLATE: &str = include_str!("../templates/registration.cpp.tera");

// ---------------------------------------------------------------------------
// JSON escaping
// ---------------------------------------------------------------------------

/// Replace every non-ASCII character with `\uXXXX` escapes (UTF-16, so
/// characters outside the BMP become surrogate pairs).
pub fn ascii_only(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut units = [0u16; 2];
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

/// Double the backslash of every `\u` escape so it survives the downstream
/// string library.
pub fn escape_unicode_escapes(json: &str) -> String {
    json.replace("\\u", "\\\\u")
}

/// Inverse of [`escape_unicode_escapes`].
pub fn unescape_unicode_escapes(text: &str) -> String {
    text.replace("\\\\u", "\\u")
}

/// Serialize a block descriptor the way the registration expects it.
pub fn descriptor_json(desc: &BlockDescriptor) -> Result<String, FatalError> {
    let json = serde_json::to_string(desc)?;
    Ok(escape_unicode_escapes(&ascii_only(&json)))
}

/// Every character as a `\xNN` C++ escape.
pub fn hex_escape(s: &str) -> String {
    s.chars().map(|c| format!("\\x{:x}", c as u32)).collect()
}

fn cpp_hex(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = tera::try_get_value!("cpp_hex", "value", String, value);
    Ok(Value::String(hex_escape(&s)))
}

// ---------------------------------------------------------------------------
// Render context
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct FactoryView<'a> {
    symbol: String,
    namespace: &'a str,
    class_name: &'a str,
    factory_path: &'a str,
    exported_args: String,
    internal_args: String,
    block_methods: &'a [String],
}

#[derive(Serialize)]
struct SubFactoryView<'a> {
    name: &'a str,
    symbol: &'a str,
    args: String,
}

#[derive(Serialize)]
struct MetaFactoryView<'a> {
    symbol: String,
    type_key: &'a str,
    args: String,
    sub_factories: Vec<SubFactoryView<'a>>,
}

#[derive(Serialize)]
struct RenderView<'a> {
    target: Option<&'a str>,
    docs_suffix: String,
    headers: Vec<&'a str>,
    factories: Vec<FactoryView<'a>>,
    meta_factories: Vec<MetaFactoryView<'a>>,
    registrations: &'a [Registration],
    block_docs: &'a BTreeMap<String, String>,
}

fn render_view<'a>(model: &'a RegistrationModel, target: Option<&'a str>) -> RenderView<'a> {
    RenderView {
        target,
        docs_suffix: target.map(sanitize_identifier).unwrap_or_default(),
        headers: model.headers.iter().map(String::as_str).collect(),
        factories: model
            .factories
            .iter()
            .map(|f| FactoryView {
                symbol: f.symbol(),
                namespace: &f.namespace,
                class_name: &f.class_name,
                factory_path: &f.factory_path,
                exported_args: f.exported_params.iter().map(|p| p.declaration()).collect::<Vec<_>>().join(", "),
                internal_args: f.internal_args.join(", "),
                block_methods: &f.block_methods,
            })
            .collect(),
        meta_factories: model
            .meta_factories
            .iter()
            .map(|m| MetaFactoryView {
                symbol: m.symbol(),
                type_key: &m.type_key,
                args: m.args.join(", "),
                sub_factories: m
                    .sub_factories
                    .iter()
                    .map(|s| SubFactoryView { name: &s.name, symbol: &s.symbol, args: s.args.join(", ") })
                    .collect(),
            })
            .collect(),
        registrations: &model.registrations,
        block_docs: &model.block_docs,
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Template engine with the registration template and its filters loaded.
pub fn engine() -> Result<Tera, FatalError> {
    let mut tera = Tera::default();
    tera.add_raw_template(TEMPLATE_NAME, TEMPLATE)?;
    tera.register_filter("cpp_hex", cpp_hex);
    Ok(tera)
}

/// Render the generated C++ source for a registration model.
pub fn render(model: &RegistrationModel, target: Option<&str>) -> Result<String, FatalError> {
    let tera = engine()?;
    let context = Context::from_serialize(render_view(model, target))?;
    Ok(tera.render(TEMPLATE_NAME, &context)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(name: &str) -> BlockDescriptor {
        BlockDescriptor {
            path: "/gr/blocks/add_ff".into(),
            keywords: vec!["add_ff".into(), "gr::blocks".into(), "blocks_add_xx".into()],
            name: name.into(),
            categories: vec!["/Math".into()],
            calls: vec![CallDescriptor { name: "set_k".into(), args: vec!["k".into()], kind: CallKind::Setter }],
            params: vec![ParamDescriptor::bare("k")],
            args: vec![],
            docs: vec!["Ångström \u{1F600} \\u0041".into()],
        }
    }

    #[test]
    fn test_ascii_only_escapes() {
        assert_eq!(ascii_only("a\u{e9}b"), "a\\u00e9b");
        assert_eq!(ascii_only("\u{1F600}"), "\\ud83d\\ude00");
        assert_eq!(ascii_only("plain"), "plain");
    }

    #[test]
    fn test_descriptor_json_round_trip() {
        let d = desc("Add \u{3b1}");
        let escaped = descriptor_json(&d).unwrap();
        assert!(escaped.is_ascii());
        assert!(escaped.contains("\\\\u03b1"), "unicode escapes should be doubled: {escaped}");

        let restored: serde_json::Value = serde_json::from_str(&unescape_unicode_escapes(&escaped)).unwrap();
        assert_eq!(restored, serde_json::to_value(&d).unwrap());
    }

    #[test]
    fn test_descriptor_json_field_names() {
        let value: serde_json::Value = serde_json::from_str(&descriptor_json(&desc("Add")).unwrap()).unwrap();
        assert_eq!(value["calls"][0]["type"], "setter");
        assert_eq!(value["params"][0], serde_json::json!({ "key": "k" }));
    }

    #[test]
    fn test_hex_escape() {
        assert_eq!(hex_escape("{\"a"), "\\x7b\\x22\\x61");
        assert_eq!(hex_escape(""), "");
    }

    fn model() -> RegistrationModel {
        let factory = FactoryDescriptor {
            namespace: "gr::blocks".into(),
            class_name: "add_const_ff".into(),
            path: "/gr/blocks/add_const_ff".into(),
            factory_path: "gr::blocks::add_const_ff::make".into(),
            exported_params: vec![ParsedParameter::new("vlen", "size_t")],
            internal_args: vec!["float()".into(), "vlen".into()],
            block_methods: vec!["set_k".into()],
        };
        let mut model = RegistrationModel::default();
        model.headers.insert("gnuradio/blocks/add_const_ff.h".into());
        model.registrations.push(Registration { path: factory.path.clone(), symbol: factory.symbol() });
        model.block_docs.insert(factory.path.clone(), "{}".into());
        model.factories.push(factory);
        model.meta_factories.push(MetaFactoryDescriptor {
            type_key: "type".into(),
            name: "blocks_add_const_vxx".into(),
            path: "/gr/blocks/add_const".into(),
            args: vec!["const std::string &type".into(), "const Pothos::Object &a0".into()],
            sub_factories: vec![SubFactory {
                name: "add_const_ff".into(),
                symbol: "factory__gr_blocks_add_const_ff".into(),
                args: vec!["a0.convert<size_t>()".into()],
            }],
        });
        model
    }

    #[test]
    fn test_render_registration() {
        let out = render(&model(), Some("gnuradio-blocks")).unwrap();
        assert!(out.contains("#include <gnuradio/blocks/add_const_ff.h>"));
        assert!(out.contains("factory__gr_blocks_add_const_ff(size_t vlen)"));
        assert!(out.contains("using namespace gr::blocks;"));
        assert!(out.contains("gr::blocks::add_const_ff::make(float(), vlen)"));
        assert!(out.contains("\"set_k\""));
        assert!(out.contains("meta_factory__blocks_add_const_vxx(const std::string &type, const Pothos::Object &a0)"));
        assert!(out.contains("if (type == \"add_const_ff\") return factory__gr_blocks_add_const_ff(a0.convert<size_t>());"));
        assert!(out.contains("register__factory__gr_blocks_add_const_ff(\"/gr/blocks/add_const_ff\""));
        assert!(out.contains("registerBlockgenBlockDocsgnuradio_blocks"));
        assert!(out.contains("\"/blocks/docs/gr/blocks/add_const_ff\", std::string(\"\\x7b\\x7d\")"));
    }

    #[test]
    fn test_render_empty_model() {
        let out = render(&RegistrationModel::default(), None).unwrap();
        assert!(!out.contains("#include <gnuradio"));
        assert!(!out.contains("BlockRegistry register__"));
        assert!(out.contains("pothos_static_block(registerBlockgenBlockDocs)"));
    }
}
