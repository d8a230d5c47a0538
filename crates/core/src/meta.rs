//! Meta-block synthesis.
//!
//! Type-specialized variants that share one metadata record (`add_ff`,
//! `add_cc`, ...) are merged into a single block with a leading type selector.
//! The generated meta factory dispatches on the selector string to the
//! concrete factories, converting its opaque arguments per variant.

use std::collections::BTreeMap;

use crate::error::SkipReason;
use crate::fuzzy::SimilarityScorer;
use crate::types::*;

/// Python-style title casing: the first letter of every alphabetic run is
/// uppercased, the rest lowercased.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
        } else {
            out.push(c);
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}

/// The metadata parameter acting as type selector: the last one whose key
/// mentions "type".
pub fn type_param(record: &BlockMetadataRecord) -> Option<&MetadataParam> {
    record.params.iter().rev().find(|p| p.key.to_lowercase().contains("type"))
}

/// `fcn:<suffix>` annotations of the selector's options → option display name.
fn suffix_names(param: &MetadataParam) -> BTreeMap<&str, &str> {
    param
        .options
        .iter()
        .flat_map(|o| o.opts.iter().filter_map(move |opt| opt.strip_prefix("fcn:").map(|s| (s, o.name.as_str()))))
        .collect()
}

/// Display name of one variant in the type selector.
fn variant_name(class_name: &str, suffixes: &BTreeMap<&str, &str>, scorer: &dyn SimilarityScorer) -> String {
    let last = class_name.rsplit('_').next().unwrap_or(class_name);
    let keys: Vec<&str> = suffixes.keys().copied().collect();
    match scorer.closest(last, &keys).and_then(|k| suffixes.get(k)) {
        Some(name) => name.to_string(),
        None => title_case(&class_name.replace('_', " ")),
    }
}

/// Merge a group of variants into one meta factory and block descriptor.
pub fn synthesize(
    group: &str,
    record: &BlockMetadataRecord,
    members: &[DescribedBlock],
    scorer: &dyn SimilarityScorer,
) -> Result<(MetaFactoryDescriptor, BlockDescriptor), SkipReason> {
    let first = members.first().ok_or_else(|| SkipReason::EmptyGroup { group: group.to_string() })?;
    let selector = type_param(record).ok_or_else(|| SkipReason::MissingTypeParam { group: group.to_string() })?;
    let suffixes = suffix_names(selector);

    let mut type_desc = ParamDescriptor::bare(&selector.key);
    type_desc.name = selector.name.clone();
    type_desc.preview = Some("disable".to_string());
    type_desc.options = Some(
        members
            .iter()
            .map(|m| {
                let class_name = &m.factory.class_name;
                OptionDescriptor::quoted(variant_name(class_name, &suffixes, scorer), class_name)
            })
            .collect(),
    );

    let mut desc = first.desc.clone();
    let path = match desc.path.rsplit_once('_') {
        Some((stem, _)) => stem.to_string(),
        None => {
            return Err(SkipReason::NonGeneralizablePath { group: group.to_string(), path: desc.path.clone() });
        }
    };
    desc.path = path.clone();
    desc.args.insert(0, selector.key.clone());
    desc.params.insert(0, type_desc);

    let sub_factories = members
        .iter()
        .map(|m| SubFactory {
            name: m.factory.class_name.clone(),
            symbol: m.factory.symbol(),
            args: m
                .factory
                .exported_params
                .iter()
                .enumerate()
                .map(|(i, p)| format!("a{}.convert<{}>()", i, p.ty))
                .collect(),
        })
        .collect();

    let args = std::iter::once(format!("const std::string &{}", selector.key))
        .chain((0..desc.args.len() - 1).map(|i| format!("const Pothos::Object &a{i}")))
        .collect();

    let meta = MetaFactoryDescriptor {
        type_key: selector.key.clone(),
        name: group.to_string(),
        path,
        args,
        sub_factories,
    };
    Ok((meta, desc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuzzy::GestaltScorer;
    use std::path::PathBuf;

    fn member(class_name: &str, params: &[(&str, &str)]) -> DescribedBlock {
        let path = format!("/dsp/{class_name}");
        DescribedBlock {
            group: "low_pass_filter_xxx".into(),
            factory: FactoryDescriptor {
                namespace: "dsp".into(),
                class_name: class_name.into(),
                path: path.clone(),
                factory_path: format!("dsp::{class_name}::make"),
                exported_params: params.iter().map(|(n, t)| ParsedParameter::new(*n, *t)).collect(),
                internal_args: params.iter().map(|(n, _)| n.to_string()).collect(),
                block_methods: vec![],
            },
            desc: BlockDescriptor {
                path,
                keywords: vec![class_name.into(), "dsp".into(), "low_pass_filter_xxx".into()],
                name: "Low Pass Filter".into(),
                categories: vec!["/Filters".into()],
                calls: vec![],
                params: params.iter().map(|(n, _)| ParamDescriptor::bare(*n)).collect(),
                args: params.iter().map(|(n, _)| n.to_string()).collect(),
                docs: vec![],
            },
        }
    }

    fn option(name: &str, key: &str, fcn: &str) -> ParamOption {
        ParamOption { name: name.into(), key: key.into(), opts: vec![format!("fcn:{fcn}")] }
    }

    fn record(params: Vec<MetadataParam>) -> BlockMetadataRecord {
        BlockMetadataRecord {
            id: "low_pass_filter_xxx".into(),
            key: "low_pass_filter_xxx".into(),
            name: "Low Pass Filter".into(),
            make: String::new(),
            params,
            callbacks: vec![],
            category: None,
            source: PathBuf::new(),
        }
    }

    fn type_selector() -> MetadataParam {
        MetadataParam {
            name: Some("Type".into()),
            options: vec![option("Float", "float", "ff"), option("Complex", "complex", "cc"), option("Int", "int", "ii")],
            ..MetadataParam::new("type")
        }
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("low pass filter ff"), "Low Pass Filter Ff");
        assert_eq!(title_case("fir filter ccf2x"), "Fir Filter Ccf2X");
    }

    #[test]
    fn test_low_pass_filter_group() {
        let params = [("gain", "double"), ("cutoff", "double")];
        let members: Vec<_> =
            ["low_pass_filter_ff", "low_pass_filter_cc", "low_pass_filter_ii"].iter().map(|n| member(n, &params)).collect();
        let r = record(vec![type_selector(), MetadataParam::new("gain")]);

        let (meta, desc) = synthesize("low_pass_filter_xxx", &r, &members, &GestaltScorer::default()).unwrap();

        assert_eq!(meta.path, "/dsp/low_pass_filter");
        assert_eq!(desc.path, "/dsp/low_pass_filter");
        assert_eq!(meta.name, "low_pass_filter_xxx");
        assert_eq!(meta.type_key, "type");

        let selector = &desc.params[0];
        assert_eq!(selector.key, "type");
        assert_eq!(selector.preview.as_deref(), Some("disable"));
        let options = selector.options.as_ref().unwrap();
        let names: Vec<_> = options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["Float", "Complex", "Int"]);
        assert_eq!(options[0].value, "\"low_pass_filter_ff\"");

        assert_eq!(meta.sub_factories.len(), 3);
        assert_eq!(meta.sub_factories[1].name, "low_pass_filter_cc");
        assert_eq!(meta.sub_factories[1].symbol, "factory__dsp_low_pass_filter_cc");
        assert_eq!(meta.sub_factories[0].args, vec!["a0.convert<double>()", "a1.convert<double>()"]);

        assert_eq!(desc.args, vec!["type", "gain", "cutoff"]);
        assert_eq!(
            meta.args,
            vec!["const std::string &type", "const Pothos::Object &a0", "const Pothos::Object &a1"]
        );
    }

    #[test]
    fn test_unannotated_variant_uses_title_case() {
        let members = vec![member("add_ff", &[]), member("add_vcc", &[])];
        let mut selector = type_selector();
        selector.options.truncate(1);
        let r = record(vec![selector]);
        let (_, desc) = synthesize("add_xx", &r, &members, &GestaltScorer::default()).unwrap();
        let names: Vec<_> = desc.params[0].options.as_ref().unwrap().iter().map(|o| o.name.clone()).collect();
        assert_eq!(names, vec!["Float", "Add Vcc"]);
        assert_eq!(desc.path, "/dsp/add");
    }

    #[test]
    fn test_structural_failures() {
        let members = vec![member("low_pass_filter_ff", &[]), member("low_pass_filter_cc", &[])];
        let err = synthesize("g", &record(vec![MetadataParam::new("gain")]), &members, &GestaltScorer::default());
        assert_eq!(err.unwrap_err(), SkipReason::MissingTypeParam { group: "g".into() });

        let mut flat = member("lpf", &[]);
        flat.desc.path = "/dsp/lpf".into();
        let err = synthesize("g", &record(vec![type_selector()]), &[flat.clone(), flat], &GestaltScorer::default());
        assert_eq!(err.unwrap_err(), SkipReason::NonGeneralizablePath { group: "g".into(), path: "/dsp/lpf".into() });

        let err = synthesize("g", &record(vec![type_selector()]), &[], &GestaltScorer::default());
        assert_eq!(err.unwrap_err(), SkipReason::EmptyGroup { group: "g".into() });
    }
}
