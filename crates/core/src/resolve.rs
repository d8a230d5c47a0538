//! Parameter identity resolution and descriptor assembly.
//!
//! Every parameter of the factory and of each retained call is given a key.
//! Call parameters are first looked up positionally in the callback template
//! that names the call (`set_taps($taps)` → `taps`); anything else falls back
//! to the closest declared metadata key, then to the parameter's own name.
//! Factory parameters whose key is shared with a call are default-constructed
//! inside the generated factory and set through the call instead.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::config::GeneratorConfig;
use crate::doxygen;
use crate::error::SkipReason;
use crate::fuzzy::SimilarityScorer;
use crate::signature::Signature;
use crate::types::*;

// ---------------------------------------------------------------------------
// Key resolution
// ---------------------------------------------------------------------------

/// Leading run of alphanumerics and underscores.
fn leading_identifier(s: &str) -> &str {
    let end = s.find(|c: char| !(c.is_alphanumeric() || c == '_')).unwrap_or(s.len());
    &s[..end]
}

/// Argument keys a callback template passes to `function`, e.g.
/// `set_taps($taps, $gain)` → `["taps", "gain"]`.
pub fn callback_args<'a>(callback: &'a str, function: &str) -> Option<Vec<&'a str>> {
    let idx = callback.find(function)?;
    let guts = &callback[idx + function.len()..];
    let mut args: Vec<&str> = guts.split('$').map(leading_identifier).collect();
    if args.first().is_some_and(|a| a.is_empty()) {
        args.remove(0);
    }
    Some(args)
}

/// Resolve the key of parameter `argno` of `function`.
pub fn resolve_key(
    function: &ParsedMethod,
    argno: usize,
    record: &BlockMetadataRecord,
    scorer: &dyn SimilarityScorer,
    is_factory: bool,
) -> String {
    let param = &function.parameters[argno];

    if !is_factory {
        for callback in &record.callbacks {
            if let Some(args) = callback_args(callback, &function.name) {
                if args.len() == function.arity() {
                    return args[argno].to_string();
                }
            }
        }
    }

    let keys = record.param_keys();
    scorer.closest(&param.name, &keys).unwrap_or(param.name.as_str()).to_string()
}

/// Keys for every parameter of the factory (index 0) and each call.
#[derive(Debug, Clone, Default)]
pub struct ResolvedKeys {
    pub per_function: Vec<Vec<String>>,
    /// Distinct keys in first-appearance order.
    pub ordered: Vec<String>,
    /// Key → C++ type of the last parameter resolved to it.
    pub types: BTreeMap<String, String>,
}

impl ResolvedKeys {
    pub fn factory(&self) -> &[String] {
        self.per_function.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn calls(&self) -> &[Vec<String>] {
        self.per_function.get(1..).unwrap_or(&[])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.ordered.iter().any(|k| k == key)
    }

    fn used_by_call(&self, key: &str) -> bool {
        self.calls().iter().flatten().any(|k| k == key)
    }
}

pub fn resolve_keys(
    factory: &ParsedMethod,
    calls: &[&ParsedMethod],
    record: &BlockMetadataRecord,
    scorer: &dyn SimilarityScorer,
) -> ResolvedKeys {
    let mut resolved = ResolvedKeys::default();
    let functions = std::iter::once((factory, true)).chain(calls.iter().map(|&c| (c, false)));
    for (function, is_factory) in functions {
        let mut keys = Vec::with_capacity(function.arity());
        for (i, param) in function.parameters.iter().enumerate() {
            let key = resolve_key(function, i, record, scorer, is_factory);
            if !resolved.contains(&key) {
                resolved.ordered.push(key.clone());
            }
            resolved.types.insert(key.clone(), param.ty.clone());
            keys.push(key);
        }
        resolved.per_function.push(keys);
    }
    resolved
}

// ---------------------------------------------------------------------------
// Exported / internal split
// ---------------------------------------------------------------------------

/// Zero-argument construction of a parameter's base type: reference and
/// `const` qualifiers removed, `unsigned int` reduced to `int`.
pub fn default_construct(ty: &str) -> String {
    let no_ref = ty.replace('&', " ");
    let tokens: Vec<&str> = no_ref.split_whitespace().filter(|t| *t != "const").collect();
    let base = match tokens.first() {
        Some(&"unsigned") | Some(&"signed") if tokens.len() > 1 => tokens[tokens.len() - 1].to_string(),
        _ => tokens.join(" "),
    };
    format!("{base}()")
}

/// Result of splitting factory parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactorySplit {
    pub exported: Vec<ParsedParameter>,
    /// Keys of the exported parameters, in order.
    pub exported_keys: Vec<String>,
    /// One expression per original factory parameter.
    pub internal: Vec<String>,
}

pub fn split_factory(factory: &ParsedMethod, keys: &ResolvedKeys) -> FactorySplit {
    let mut split = FactorySplit::default();
    for (param, key) in factory.parameters.iter().zip(keys.factory()) {
        let reused = keys.used_by_call(key) && !key.to_lowercase().contains("file");
        if reused {
            split.internal.push(default_construct(&param.ty));
        } else {
            split.exported.push(param.clone());
            split.exported_keys.push(key.clone());
            split.internal.push(param.name.clone());
        }
    }
    split
}

// ---------------------------------------------------------------------------
// Parameter descriptors
// ---------------------------------------------------------------------------

fn describe_param(param: &MetadataParam) -> ParamDescriptor {
    let mut desc = ParamDescriptor::bare(&param.key);
    desc.name = param.name.clone();
    desc.default = param.value.clone();
    if param.hidden {
        desc.preview = Some("disable".to_string());
    }
    desc.widget_type = match param.ty.as_deref() {
        Some("string") => Some("StringEntry".to_string()),
        Some("int") => Some("SpinBox".to_string()),
        _ => None,
    };
    if !param.options.is_empty() {
        desc.options = Some(param.options.iter().map(|o| OptionDescriptor::quoted(&o.name, &o.key)).collect());
        desc.widget_type = Some("ComboBox".to_string());
        desc.widget_kwargs = Some(WidgetKwargs { editable: param.ty.as_deref() != Some("enum") });
    }
    desc
}

/// Descriptors for all resolved keys: metadata-declared ones in metadata
/// order, then undeclared ones in first-appearance order. Enum-typed
/// parameters take their options from the enum declaration.
pub fn describe_params(record: &BlockMetadataRecord, keys: &ResolvedKeys, enums: &EnumTable) -> Vec<ParamDescriptor> {
    let mut params: Vec<ParamDescriptor> = record
        .params
        .iter()
        .filter(|p| keys.contains(&p.key))
        .map(describe_param)
        .collect();
    params.extend(
        keys.ordered
            .iter()
            .filter(|k| record.param(k).is_none())
            .map(ParamDescriptor::bare),
    );

    for param in &mut params {
        let Some(ty) = keys.types.get(&param.key) else { continue };
        if let Some(decl) = enums.find_in_type(ty) {
            debug!(key = %param.key, enum_name = %decl.name, "Options from enum");
            param.options = Some(decl.values.iter().map(|v| OptionDescriptor::quoted(v, v)).collect());
        }
    }
    params
}

// ---------------------------------------------------------------------------
// Descriptor assembly
// ---------------------------------------------------------------------------

/// Everything the resolver reads besides the class itself.
pub struct ResolveContext<'a> {
    pub metadata: &'a MetadataSet,
    pub enums: &'a EnumTable,
    pub scorer: &'a dyn SimilarityScorer,
    pub config: &'a GeneratorConfig,
}

/// Build the factory and block descriptors of one matched class.
pub fn describe_block(
    class: &ParsedClass,
    signature: &Signature,
    record: &BlockMetadataRecord,
    ctx: &ResolveContext,
) -> Result<DescribedBlock, SkipReason> {
    let keys = resolve_keys(signature.factory, &signature.calls, record, ctx.scorer);
    let split = split_factory(signature.factory, &keys);
    debug!(class = %class.name, keys = ?keys.ordered, shared = ?shared_keys(&keys), "Resolved parameter keys");

    if split.exported_keys.len() > ctx.config.max_args {
        return Err(SkipReason::TooManyFactoryArgs {
            class: class.qualified_name(),
            count: split.exported_keys.len(),
            max: ctx.config.max_args,
        });
    }

    let callbacks = record.callbacks_text();
    let calls = signature
        .calls
        .iter()
        .zip(keys.calls())
        .map(|(method, args)| CallDescriptor {
            name: method.name.clone(),
            args: args.clone(),
            kind: if callbacks.contains(&method.name) { CallKind::Setter } else { CallKind::Initializer },
        })
        .collect();

    let categories = ctx.metadata.categories_for(record);
    if categories.is_empty() {
        warn!(class = %class.name, "No block categories found");
    }

    let path = class.registration_path();
    let factory = FactoryDescriptor {
        namespace: class.namespace.clone(),
        class_name: class.name.clone(),
        path: path.clone(),
        factory_path: signature.factory_path.clone(),
        exported_params: split.exported,
        internal_args: split.internal,
        block_methods: signature.block_methods.clone(),
    };

    let desc = BlockDescriptor {
        path,
        keywords: vec![class.name.clone(), class.namespace.clone(), record.key.clone()],
        name: record.name.clone(),
        categories,
        calls,
        params: describe_params(record, &keys, ctx.enums),
        args: split.exported_keys,
        docs: doxygen::doc_lines(&class.doxygen),
    };

    Ok(DescribedBlock { group: record.id.clone(), factory, desc })
}

/// Keys shared between call arguments and factory arguments, for diagnostics.
pub fn shared_keys(keys: &ResolvedKeys) -> BTreeSet<&str> {
    keys.factory()
        .iter()
        .filter(|k| keys.used_by_call(k))
        .map(String::as_str)
        .collect()
}
