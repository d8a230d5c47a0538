use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default cap on the number of parameters a factory or call may take.
pub const MAX_ARGS: usize = 8;

/// Default similarity threshold for approximate name matching.
pub const DEFAULT_SIMILARITY_CUTOFF: f64 = 0.6;

// ---------------------------------------------------------------------------
// Header model
// ---------------------------------------------------------------------------

/// C++ member/base access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Public,
    Protected,
    Private,
}

impl Access {
    /// Parse an access keyword, tolerating a trailing `:` as written in class bodies.
    pub fn parse(text: &str) -> Option<Access> {
        match text.trim().trim_end_matches(':').trim() {
            "public" => Some(Access::Public),
            "protected" => Some(Access::Protected),
            "private" => Some(Access::Private),
            _ => None,
        }
    }
}

/// A direct base class as written in the class head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaseClass {
    pub name: String,
    pub access: Access,
}

/// One function parameter. `ty` is the raw type text with the parameter name removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl ParsedParameter {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self { name: name.into(), ty: ty.into() }
    }

    /// `type name` as it would appear in a C++ parameter list.
    pub fn declaration(&self) -> String {
        format!("{} {}", self.ty, self.name)
    }
}

/// A member function or free function discovered in a header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedMethod {
    pub name: String,
    pub access: Access,
    pub is_static: bool,
    pub is_constructor: bool,
    pub is_destructor: bool,
    pub parameters: Vec<ParsedParameter>,
    /// Namespace the function (or its enclosing class) was declared in.
    pub namespace: String,
    /// Enclosing class for member functions, `None` for free functions.
    pub parent: Option<String>,
}

impl ParsedMethod {
    pub fn is_public(&self) -> bool {
        self.access == Access::Public
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

/// A class or struct with a body, as produced by the header adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedClass {
    pub name: String,
    pub namespace: String,
    pub bases: Vec<BaseClass>,
    /// Raw doxygen comment preceding the class, empty when absent.
    pub doxygen: String,
    pub methods: Vec<ParsedMethod>,
}

impl ParsedClass {
    /// `namespace::Name`, or the bare name at global scope.
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.namespace, self.name)
        }
    }

    /// Plugin registration path: `/ns/sub/ClassName`.
    pub fn registration_path(&self) -> String {
        if self.namespace.is_empty() {
            format!("/{}", self.name)
        } else {
            format!("/{}/{}", self.namespace.replace("::", "/"), self.name)
        }
    }

    pub fn public_methods(&self) -> impl Iterator<Item = &ParsedMethod> {
        self.methods.iter().filter(|m| m.is_public())
    }
}

/// An enum declaration with its enumerator names in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumDecl {
    pub name: String,
    pub namespace: String,
    pub values: Vec<String>,
}

/// Everything extracted from one header.
#[derive(Debug, Clone, Default)]
pub struct HeaderModel {
    pub path: PathBuf,
    /// Path relative to the include directory it was found under.
    pub include_path: String,
    pub classes: Vec<ParsedClass>,
    pub functions: Vec<ParsedMethod>,
    pub enums: Vec<EnumDecl>,
    pub has_syntax_errors: bool,
}

/// Immutable table of every enum found while parsing all headers.
///
/// Built once after the header pass completes so option inference does not
/// depend on the order headers were visited in.
#[derive(Debug, Clone, Default)]
pub struct EnumTable {
    enums: Vec<EnumDecl>,
}

impl EnumTable {
    pub fn new(enums: Vec<EnumDecl>) -> Self {
        Self { enums: enums.into_iter().filter(|e| !e.name.is_empty()).collect() }
    }

    pub fn from_headers<'a>(headers: impl IntoIterator<Item = &'a HeaderModel>) -> Self {
        Self::new(headers.into_iter().flat_map(|h| h.enums.iter().cloned()).collect())
    }

    /// The enum whose name appears in `type_text`. Later declarations win.
    pub fn find_in_type(&self, type_text: &str) -> Option<&EnumDecl> {
        self.enums.iter().rev().find(|e| type_text.contains(&e.name))
    }

    pub fn len(&self) -> usize {
        self.enums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enums.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Metadata records
// ---------------------------------------------------------------------------

/// One selectable option of a metadata parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamOption {
    pub name: String,
    pub key: String,
    /// Free-form `<opt>` annotations, e.g. `fcn:ff`.
    pub opts: Vec<String>,
}

/// A parameter declared by a metadata record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataParam {
    pub key: String,
    pub name: Option<String>,
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub ty: Option<String>,
    pub hidden: bool,
    pub options: Vec<ParamOption>,
}

impl MetadataParam {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), name: None, value: None, ty: None, hidden: false, options: Vec::new() }
    }
}

/// Declarative description of one block, loaded from a metadata file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockMetadataRecord {
    /// Source-group identifier: the metadata file stem.
    pub id: String,
    pub key: String,
    pub name: String,
    /// Factory-call template with `$key` placeholders.
    pub make: String,
    pub params: Vec<MetadataParam>,
    pub callbacks: Vec<String>,
    pub category: Option<String>,
    pub source: PathBuf,
}

impl BlockMetadataRecord {
    pub fn param(&self, key: &str) -> Option<&MetadataParam> {
        self.params.iter().find(|p| p.key == key)
    }

    pub fn param_keys(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.key.as_str()).collect()
    }

    /// All callback templates joined into one searchable string.
    pub fn callbacks_text(&self) -> String {
        self.callbacks.join(", ")
    }
}

/// All metadata for a run: block records keyed by file stem plus the
/// category paths collected from category-tree files.
#[derive(Debug, Clone, Default)]
pub struct MetadataSet {
    pub records: BTreeMap<String, BlockMetadataRecord>,
    /// Block key → category paths (`A/B/C`) from category trees.
    pub categories: BTreeMap<String, Vec<String>>,
}

impl MetadataSet {
    pub fn ids(&self) -> BTreeSet<String> {
        self.records.keys().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<&BlockMetadataRecord> {
        self.records.get(id)
    }

    /// Category paths for a record: its own category first, then tree entries,
    /// each with a leading `/`.
    pub fn categories_for(&self, record: &BlockMetadataRecord) -> Vec<String> {
        record
            .category
            .iter()
            .cloned()
            .chain(self.categories.get(&record.key).into_iter().flatten().cloned())
            .map(|c| if c.starts_with('/') { c } else { format!("/{c}") })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Everything the emitter needs to generate one concrete factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactoryDescriptor {
    pub namespace: String,
    pub class_name: String,
    /// Registration path, `/ns/ClassName`.
    pub path: String,
    /// Fully-qualified callable used to construct the block.
    pub factory_path: String,
    /// Parameters that remain in the generated factory signature.
    pub exported_params: Vec<ParsedParameter>,
    /// One argument expression per original factory parameter.
    pub internal_args: Vec<String>,
    /// Public instance methods that take at least one argument.
    pub block_methods: Vec<String>,
}

impl FactoryDescriptor {
    /// C identifier of the generated factory function.
    pub fn symbol(&self) -> String {
        format!("factory__{}", symbol_stem(&self.namespace, &self.class_name))
    }
}

/// Whether a call is driven at runtime or only once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Setter,
    Initializer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallDescriptor {
    pub name: String,
    pub args: Vec<String>,
    #[serde(rename = "type")]
    pub kind: CallKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionDescriptor {
    pub name: String,
    pub value: String,
}

impl OptionDescriptor {
    /// An option whose value is the quoted literal `"value"`.
    pub fn quoted(name: impl Into<String>, value: &str) -> Self {
        Self { name: name.into(), value: format!("\"{value}\"") }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetKwargs {
    pub editable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamDescriptor {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(rename = "widgetType", skip_serializing_if = "Option::is_none")]
    pub widget_type: Option<String>,
    #[serde(rename = "widgetKwargs", skip_serializing_if = "Option::is_none")]
    pub widget_kwargs: Option<WidgetKwargs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<OptionDescriptor>>,
}

impl ParamDescriptor {
    pub fn bare(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: None,
            default: None,
            preview: None,
            widget_type: None,
            widget_kwargs: None,
            options: None,
        }
    }
}

/// The GUI-facing description of one block, serialized to JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockDescriptor {
    pub path: String,
    pub keywords: Vec<String>,
    pub name: String,
    pub categories: Vec<String>,
    pub calls: Vec<CallDescriptor>,
    pub params: Vec<ParamDescriptor>,
    /// Parameter keys of the exported factory arguments, in order.
    pub args: Vec<String>,
    pub docs: Vec<String>,
}

/// A concrete factory reachable from a meta factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubFactory {
    /// Class name; also the value of the type selector that picks it.
    pub name: String,
    pub symbol: String,
    /// Conversion expression per exported argument of the concrete factory.
    pub args: Vec<String>,
}

/// A factory that dispatches to type-specialized variants on a string selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetaFactoryDescriptor {
    pub type_key: String,
    /// Metadata group identifier.
    pub name: String,
    pub path: String,
    /// Declared parameters: the selector followed by opaque values.
    pub args: Vec<String>,
    pub sub_factories: Vec<SubFactory>,
}

impl MetaFactoryDescriptor {
    pub fn symbol(&self) -> String {
        format!("meta_factory__{}", sanitize_identifier(&self.name))
    }
}

/// A factory function registered under a plugin path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub path: String,
    pub symbol: String,
}

/// A matched class after signature extraction and parameter resolution.
#[derive(Debug, Clone)]
pub struct DescribedBlock {
    /// Metadata group identifier the class matched.
    pub group: String,
    pub factory: FactoryDescriptor,
    pub desc: BlockDescriptor,
}

/// The final record set handed to the template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationModel {
    pub headers: BTreeSet<String>,
    pub factories: Vec<FactoryDescriptor>,
    pub meta_factories: Vec<MetaFactoryDescriptor>,
    pub registrations: Vec<Registration>,
    /// Registration path → escaped descriptor JSON.
    pub block_docs: BTreeMap<String, String>,
}

impl RegistrationModel {
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty() && self.block_docs.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Identifier helpers
// ---------------------------------------------------------------------------

fn symbol_stem(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        sanitize_identifier(name)
    } else {
        sanitize_identifier(&format!("{}_{}", namespace.replace("::", "_"), name))
    }
}

/// Replace anything that cannot appear in a C identifier with `_`.
pub fn sanitize_identifier(s: &str) -> String {
    s.chars().map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' }).collect()
}
