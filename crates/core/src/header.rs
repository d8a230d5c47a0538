//! tree-sitter C++ header adapter.
//!
//! Turns raw header text into a [`HeaderModel`]: namespace-qualified classes
//! with their direct bases and member functions, free functions, and enum
//! declarations. Export macros (`BLOCKS_API` and friends) are removed before
//! parsing so the class head reads as plain C++.

use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;
use tree_sitter::{Language, Node, Parser};

use crate::error::HeaderError;
use crate::types::*;

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Python-style `isupper`: at least one cased character and no lowercase ones.
fn is_upper_token(s: &str) -> bool {
    s.chars().any(|c| c.is_alphabetic()) && !s.chars().any(|c| c.is_lowercase())
}

/// Export/visibility macros, detected as an all-uppercase second token on a
/// line starting with `class`.
pub fn export_macros(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("class"))
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter(|tok| is_upper_token(tok))
        .map(|tok| tok.to_string())
        .collect()
}

/// Remove every export macro token from the header text.
pub fn strip_export_macros(content: &str) -> String {
    let mut out = content.to_string();
    for token in export_macros(content) {
        match Regex::new(&format!(r"\b{}\b", regex::escape(&token))) {
            Ok(re) => out = re.replace_all(&out, "").into_owned(),
            Err(_) => out = out.replace(&token, ""),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Node helpers
// ---------------------------------------------------------------------------

fn cpp_language() -> Language {
    tree_sitter_cpp::LANGUAGE.into()
}

fn text<'a>(node: &Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("").trim()
}

/// Collapse runs of whitespace to single spaces.
fn squash(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_doxygen(comment: &str) -> bool {
    ["/*!", "/**", "//!", "///"].iter().any(|p| comment.starts_with(p))
}

/// Doxygen comments immediately preceding a declaration.
fn leading_doxygen(node: &Node, source: &[u8]) -> String {
    let mut anchor = *node;
    while let Some(parent) = anchor.parent() {
        if matches!(parent.kind(), "declaration" | "template_declaration" | "type_definition") {
            anchor = parent;
        } else {
            break;
        }
    }

    let mut comments = Vec::new();
    let mut prev = anchor.prev_sibling();
    while let Some(p) = prev {
        if p.kind() != "comment" {
            break;
        }
        let body = text(&p, source);
        if !is_doxygen(body) {
            break;
        }
        comments.push(body.to_string());
        prev = p.prev_sibling();
    }
    comments.reverse();
    comments.join("\n")
}

/// Unwrap pointer/reference declarators until a function declarator is found.
fn function_declarator<'t>(node: Node<'t>) -> Option<Node<'t>> {
    let mut current = node;
    loop {
        match current.kind() {
            "function_declarator" => return Some(current),
            "pointer_declarator" | "reference_declarator" | "attributed_declarator" => {
                let inner = current.child_by_field_name("declarator").or_else(|| {
                    let count = current.named_child_count();
                    if count == 0 {
                        None
                    } else {
                        current.named_child(count - 1)
                    }
                })?;
                current = inner;
            }
            _ => return None,
        }
    }
}

/// The identifier a (possibly decorated) declarator names, if any.
fn declarator_identifier<'t>(node: Node<'t>) -> Option<Node<'t>> {
    let mut current = node;
    loop {
        if matches!(current.kind(), "identifier" | "field_identifier") {
            return Some(current);
        }
        let next = current.child_by_field_name("declarator").or_else(|| {
            let mut cursor = current.walk();
            let children: Vec<Node<'t>> = current.named_children(&mut cursor).collect();
            children
                .into_iter()
                .rev()
                .find(|n| n.kind().ends_with("declarator") || n.kind() == "identifier")
        })?;
        current = next;
    }
}

fn has_static_specifier(node: &Node, source: &[u8]) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| c.kind() == "storage_class_specifier" && text(&c, source) == "static");
    found
}

// ---------------------------------------------------------------------------
// Parameters and functions
// ---------------------------------------------------------------------------

fn parse_parameter(node: &Node, source: &[u8]) -> Option<ParsedParameter> {
    let declarator = node.child_by_field_name("declarator");
    let type_end = declarator
        .or_else(|| node.child_by_field_name("type"))
        .map(|n| n.end_byte())
        .unwrap_or(node.end_byte());
    let start = node.start_byte();

    let slice = |from: usize, to: usize| -> String {
        source.get(from..to).map(|b| String::from_utf8_lossy(b).into_owned()).unwrap_or_default()
    };

    match declarator.and_then(declarator_identifier) {
        Some(ident) => {
            let ty = format!("{}{}", slice(start, ident.start_byte()), slice(ident.end_byte(), type_end));
            Some(ParsedParameter::new(text(&ident, source), squash(&ty)))
        }
        None => {
            let ty = squash(&slice(start, type_end));
            if ty == "void" || ty.is_empty() {
                None
            } else {
                Some(ParsedParameter::new("", ty))
            }
        }
    }
}

fn parse_parameters(list: Option<Node>, source: &[u8]) -> Vec<ParsedParameter> {
    let Some(list) = list else { return Vec::new() };
    let mut cursor = list.walk();
    let params: Vec<ParsedParameter> = list
        .named_children(&mut cursor)
        .filter(|c| matches!(c.kind(), "parameter_declaration" | "optional_parameter_declaration"))
        .filter_map(|c| parse_parameter(&c, source))
        .collect();
    params
}

/// Build a method from a declaration-like node, if it declares a function.
fn parse_function(
    node: &Node,
    source: &[u8],
    namespace: &str,
    parent: Option<&str>,
    access: Access,
) -> Option<ParsedMethod> {
    let declarator = function_declarator(node.child_by_field_name("declarator")?)?;
    let name_node = declarator.child_by_field_name("declarator")?;
    let raw_name = text(&name_node, source);
    let name = raw_name.rsplit("::").next().unwrap_or(raw_name).to_string();
    if name.is_empty() {
        return None;
    }

    let is_destructor = name_node.kind() == "destructor_name" || name.starts_with('~');
    let is_constructor = !is_destructor && parent.is_some_and(|p| p == name);

    Some(ParsedMethod {
        name,
        access,
        is_static: has_static_specifier(node, source),
        is_constructor,
        is_destructor,
        parameters: parse_parameters(declarator.child_by_field_name("parameters"), source),
        namespace: namespace.to_string(),
        parent: parent.map(|p| p.to_string()),
    })
}

// ---------------------------------------------------------------------------
// Enums and classes
// ---------------------------------------------------------------------------

fn parse_enum(node: &Node, source: &[u8], namespace: &str, fallback_name: Option<&str>) -> Option<EnumDecl> {
    let body = node.child_by_field_name("body")?;
    let name = node
        .child_by_field_name("name")
        .map(|n| text(&n, source).to_string())
        .or_else(|| fallback_name.map(|s| s.to_string()))
        .unwrap_or_default();

    let mut cursor = body.walk();
    let values = body
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "enumerator")
        .filter_map(|c| c.child_by_field_name("name").map(|n| text(&n, source).to_string()))
        .collect();

    Some(EnumDecl { name, namespace: namespace.to_string(), values })
}

fn class_name(node: &Node, source: &[u8]) -> Option<String> {
    let name_node = node.child_by_field_name("name")?;
    let raw = text(&name_node, source);
    let raw = raw.split('<').next().unwrap_or(raw).trim();
    let name = raw.rsplit("::").next().unwrap_or(raw);
    (!name.is_empty()).then(|| name.to_string())
}

fn parse_bases(node: &Node, source: &[u8], default_access: Access) -> Vec<BaseClass> {
    let mut bases = Vec::new();
    let mut cursor = node.walk();
    for clause in node.children(&mut cursor).filter(|c| c.kind() == "base_class_clause") {
        let mut access = None;
        let mut inner = clause.walk();
        for child in clause.children(&mut inner) {
            match child.kind() {
                "access_specifier" | "public" | "protected" | "private" => {
                    access = Access::parse(text(&child, source));
                }
                "," => access = None,
                "virtual" | ":" | "..." | "attribute_declaration" | "comment" => {}
                _ if child.is_named() => {
                    let name: String = text(&child, source).split_whitespace().collect();
                    bases.push(BaseClass { name, access: access.unwrap_or(default_access) });
                    access = None;
                }
                _ => {}
            }
        }
    }
    bases
}

// ---------------------------------------------------------------------------
// Tree walk
// ---------------------------------------------------------------------------

struct Walker<'s> {
    source: &'s [u8],
    namespaces: Vec<String>,
    model: HeaderModel,
}

impl<'s> Walker<'s> {
    fn namespace(&self) -> String {
        self.namespaces.join("::")
    }

    fn walk_scope(&mut self, scope: &Node) {
        let mut cursor = scope.walk();
        let children: Vec<Node> = scope.children(&mut cursor).collect();
        for child in children {
            self.visit(&child);
        }
    }

    fn visit(&mut self, node: &Node) {
        match node.kind() {
            "namespace_definition" => {
                let name = node.child_by_field_name("name").map(|n| text(&n, self.source).to_string());
                let pushed = name.filter(|n| !n.is_empty()).map(|n| self.namespaces.push(n)).is_some();
                if let Some(body) = node.child_by_field_name("body") {
                    self.walk_scope(&body);
                }
                if pushed {
                    self.namespaces.pop();
                }
            }
            "class_specifier" | "struct_specifier" => self.visit_class(node),
            "enum_specifier" => {
                if let Some(e) = parse_enum(node, self.source, &self.namespace(), None) {
                    self.model.enums.push(e);
                }
            }
            "type_definition" => {
                if let Some(ty) = node.child_by_field_name("type") {
                    match ty.kind() {
                        "enum_specifier" => {
                            let alias = node.child_by_field_name("declarator").map(|d| text(&d, self.source).to_string());
                            if let Some(e) = parse_enum(&ty, self.source, &self.namespace(), alias.as_deref()) {
                                self.model.enums.push(e);
                            }
                        }
                        "class_specifier" | "struct_specifier" => self.visit_class(&ty),
                        _ => {}
                    }
                }
            }
            "declaration" | "function_definition" => {
                if let Some(ty) = node.child_by_field_name("type") {
                    if matches!(ty.kind(), "class_specifier" | "struct_specifier" | "enum_specifier") {
                        self.visit(&ty);
                    }
                }
                let ns = self.namespace();
                if let Some(f) = parse_function(node, self.source, &ns, None, Access::Public) {
                    self.model.functions.push(f);
                }
            }
            "template_declaration" | "linkage_specification" | "declaration_list" | "ERROR" => {
                match node.child_by_field_name("body") {
                    Some(body) => self.walk_scope(&body),
                    None => self.walk_scope(node),
                }
            }
            kind if kind.starts_with("preproc_if") || kind.starts_with("preproc_el") => {
                self.walk_scope(node)
            }
            _ => {}
        }
    }

    fn visit_class(&mut self, node: &Node) {
        let Some(body) = node.child_by_field_name("body") else { return };
        let Some(name) = class_name(node, self.source) else { return };

        let default_access = if node.kind() == "struct_specifier" { Access::Public } else { Access::Private };
        let namespace = self.namespace();
        let mut class = ParsedClass {
            name: name.clone(),
            namespace: namespace.clone(),
            bases: parse_bases(node, self.source, default_access),
            doxygen: leading_doxygen(node, self.source),
            methods: Vec::new(),
        };

        let mut access = default_access;
        self.visit_members(&body, &name, &namespace, &mut access, &mut class);
        self.model.classes.push(class);
    }

    fn visit_members(
        &mut self,
        body: &Node,
        class_name: &str,
        namespace: &str,
        access: &mut Access,
        class: &mut ParsedClass,
    ) {
        let scoped = format!("{}::{}", namespace, class_name);
        let scoped = scoped.trim_start_matches("::");

        let mut cursor = body.walk();
        let members: Vec<Node> = body.children(&mut cursor).collect();
        for member in members {
            match member.kind() {
                "access_specifier" => {
                    if let Some(a) = Access::parse(text(&member, self.source)) {
                        *access = a;
                    }
                }
                "field_declaration" | "declaration" | "function_definition" => {
                    if let Some(ty) = member.child_by_field_name("type") {
                        if ty.kind() == "enum_specifier" {
                            if let Some(e) = parse_enum(&ty, self.source, scoped, None) {
                                self.model.enums.push(e);
                            }
                        }
                    }
                    if let Some(m) = parse_function(&member, self.source, namespace, Some(class_name), *access) {
                        class.methods.push(m);
                    }
                }
                "enum_specifier" => {
                    if let Some(e) = parse_enum(&member, self.source, scoped, None) {
                        self.model.enums.push(e);
                    }
                }
                "template_declaration" => {
                    let mut inner = member.walk();
                    let decls: Vec<Node> = member
                        .named_children(&mut inner)
                        .filter(|c| matches!(c.kind(), "declaration" | "field_declaration" | "function_definition"))
                        .collect();
                    for decl in decls {
                        if let Some(m) = parse_function(&decl, self.source, namespace, Some(class_name), *access) {
                            class.methods.push(m);
                        }
                    }
                }
                kind if kind.starts_with("preproc_if") || kind.starts_with("preproc_el") => {
                    self.visit_members(&member, class_name, namespace, access, class);
                }
                _ => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Parse header text into a [`HeaderModel`]. `strict` turns syntax errors in
/// the tree into a header-level failure.
pub fn parse_header(path: &Path, content: &str, strict: bool) -> Result<HeaderModel, HeaderError> {
    let cleaned = strip_export_macros(content);

    let mut parser = Parser::new();
    parser
        .set_language(&cpp_language())
        .map_err(|_| HeaderError::Parse { path: path.to_path_buf() })?;
    let tree = parser
        .parse(&cleaned, None)
        .ok_or_else(|| HeaderError::Parse { path: path.to_path_buf() })?;
    let root = tree.root_node();

    if root.has_error() {
        if strict {
            return Err(HeaderError::Syntax { path: path.to_path_buf() });
        }
        debug!(header = %path.display(), "Header has syntax errors; extracting what parsed");
    }

    let mut walker = Walker {
        source: cleaned.as_bytes(),
        namespaces: Vec::new(),
        model: HeaderModel {
            path: path.to_path_buf(),
            has_syntax_errors: root.has_error(),
            ..HeaderModel::default()
        },
    };
    walker.walk_scope(&root);

    let model = walker.model;
    debug!(
        header = %path.display(),
        classes = model.classes.len(),
        functions = model.functions.len(),
        enums = model.enums.len(),
        "Header parsed"
    );
    Ok(model)
}

/// Read and parse one header from disk.
pub fn read_header(path: &Path, include_root: &Path, strict: bool) -> Result<HeaderModel, HeaderError> {
    let bytes = std::fs::read(path).map_err(|source| HeaderError::Read { path: path.to_path_buf(), source })?;
    let content = String::from_utf8_lossy(&bytes);
    let mut model = parse_header(path, &content, strict)?;
    model.include_path = path
        .strip_prefix(include_root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    Ok(model)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
