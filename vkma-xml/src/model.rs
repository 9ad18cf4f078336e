//! Intermediate model types: the bridge between Doxygen extraction and
//! registry xml emission.
//!
//! These types know nothing about either xml dialect.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::diagnostics::{Diagnostics, Stage};

/// Qualifier tokens stripped from the front of a raw type string.
pub const PREFIX_TOKENS: &[&str] = &["const ", "struct ", "enum ", "union ", " "];
/// Qualifier tokens stripped from the back of a raw type string.
pub const POSTFIX_TOKENS: &[&str] = &["*", "&", " const", " "];

/// Collapse every whitespace run (newlines included) into a single space and
/// trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A type reference split into qualifiers and the bare identifier, e.g.
/// `const VmaAllocationInfo *` → (`const `, `VmaAllocationInfo`, ` *`).
///
/// `prefix + name + postfix` always reproduces the normalized input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecoratedName {
    pub prefix: String,
    pub name: String,
    pub postfix: String,
}

impl DecoratedName {
    pub fn parse(raw: &str) -> Self {
        let normalized = normalize_whitespace(raw);
        let mut rest = normalized.as_str();

        let mut prefix = String::new();
        while let Some(token) = PREFIX_TOKENS.iter().find(|t| rest.starts_with(**t)) {
            prefix.push_str(token);
            rest = &rest[token.len()..];
        }

        let mut postfix = String::new();
        while let Some(token) = POSTFIX_TOKENS.iter().find(|t| rest.ends_with(**t)) {
            postfix.insert_str(0, token);
            rest = &rest[..rest.len() - token.len()];
        }

        Self {
            prefix,
            name: rest.to_string(),
            postfix,
        }
    }

    /// A bare identifier with no qualifiers.
    pub fn plain(name: &str) -> Self {
        Self {
            prefix: String::new(),
            name: name.to_string(),
            postfix: String::new(),
        }
    }

    /// True when neither prefix nor postfix carry anything.
    pub fn is_plain(&self) -> bool {
        self.prefix.is_empty() && self.postfix.is_empty()
    }

    /// Reassemble the normalized type string.
    pub fn full(&self) -> String {
        format!("{}{}{}", self.prefix, self.name, self.postfix)
    }
}

/// Which api surface a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Primary api, emitted as full definitions.
    Core,
    /// Supporting api, only used to resolve names. Emitted as stubs.
    Helper,
}

/// A struct member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub ty: DecoratedName,
    /// Array length text from an `[N]` args string, brackets removed.
    pub array_len: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Structure {
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    pub dispatchable: bool,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    pub value: String,
}

/// A named enumeration constant with its literal value text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumConstant {
    pub name: String,
    pub value: String,
}

impl EnumConstant {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enumeration {
    pub underlying: Option<DecoratedName>,
    pub values: Vec<EnumConstant>,
    /// Constants that repeat an earlier value instead of adding a new one.
    pub aliases: Vec<EnumConstant>,
}

impl Enumeration {
    pub fn new(underlying: Option<DecoratedName>) -> Self {
        Self {
            underlying,
            ..Self::default()
        }
    }

    /// Append a constant in encounter order. A constant whose value equals
    /// the value (or the name) of an earlier primary constant becomes an
    /// alias of it; the first one seen stays primary.
    pub fn push(&mut self, constant: EnumConstant) {
        if self.alias_target(&constant).is_some() {
            trace!(name = %constant.name, value = %constant.value, "enum alias constant");
            self.aliases.push(constant);
        } else {
            self.values.push(constant);
        }
    }

    /// The primary constant `constant` duplicates, if any.
    pub fn alias_target(&self, constant: &EnumConstant) -> Option<&EnumConstant> {
        self.values
            .iter()
            .find(|v| v.value == constant.value || v.name == constant.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: DecoratedName,
}

/// Shared shape of functions and function pointers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub return_type: DecoratedName,
    pub params: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub target: DecoratedName,
}

/// Payload of a registry record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    /// Referenced but not (yet) defined.
    Undefined,
    Structure(Structure),
    Handle(Handle),
    Macro(Macro),
    Enumeration(Enumeration),
    Function(Function),
    FunctionPointer(Function),
    Alias(Alias),
    /// Intrinsic scalar type.
    Base,
}

impl TypeKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TypeKind::Undefined => "undefined",
            TypeKind::Structure(_) => "structure",
            TypeKind::Handle(_) => "handle",
            TypeKind::Macro(_) => "macro",
            TypeKind::Enumeration(_) => "enumeration",
            TypeKind::Function(_) => "function",
            TypeKind::FunctionPointer(_) => "function pointer",
            TypeKind::Alias(_) => "alias",
            TypeKind::Base => "base",
        }
    }

    /// Bare names of every type this record refers to directly (one level).
    pub fn references(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = match self {
            TypeKind::Undefined | TypeKind::Macro(_) | TypeKind::Base => Vec::new(),
            TypeKind::Structure(s) => s.members.iter().map(|m| m.ty.name.as_str()).collect(),
            TypeKind::Handle(h) => h.parent.iter().map(String::as_str).collect(),
            TypeKind::Enumeration(e) => e.underlying.iter().map(|u| u.name.as_str()).collect(),
            TypeKind::Function(f) | TypeKind::FunctionPointer(f) => {
                std::iter::once(f.return_type.name.as_str())
                    .chain(f.params.iter().map(|p| p.ty.name.as_str()))
                    .collect()
            }
            TypeKind::Alias(a) => vec![a.target.name.as_str()],
        };
        refs.retain(|r| !r.is_empty());
        refs
    }
}

/// A registry entry: payload plus the api surface it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRecord {
    pub kind: TypeKind,
    pub tag: Tag,
}

impl TypeRecord {
    pub fn new(kind: TypeKind, tag: Tag) -> Self {
        Self { kind, tag }
    }

    /// Forward-declaration placeholder inserted when a name is referenced.
    pub fn undefined() -> Self {
        Self::new(TypeKind::Undefined, Tag::Helper)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self.kind, TypeKind::Undefined)
    }

    pub fn is_core(&self) -> bool {
        self.tag == Tag::Core
    }
}

/// Global type registry: every identifier of every loaded api, flattened
/// into one namespace.
///
/// Write-append-merge only: records are inserted or completed, never
/// removed. Iteration is in name order.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, TypeRecord>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the record for `name`, inserting an undefined helper
    /// placeholder if it is not known yet.
    pub fn get(&mut self, name: &str) -> &TypeRecord {
        if !self.types.contains_key(name) {
            trace!(name, "forward declaration by reference");
            self.types.insert(name.to_string(), TypeRecord::undefined());
        }
        &self.types[name]
    }

    /// Insert or merge `record` under `name`.
    ///
    /// - absent or undefined: the new record is stored as is;
    /// - structure vs handle (either order): the handle wins, and the result
    ///   is core if either side was core;
    /// - anything else: the first definition is kept and a diagnostic is
    ///   recorded.
    ///
    /// After a successful store, every name the record refers to is touched
    /// through [`get`](Self::get) so it exists in the registry.
    pub fn add(
        &mut self,
        name: &str,
        record: TypeRecord,
        diagnostics: &mut Diagnostics,
    ) -> &TypeRecord {
        let merged = match self.types.get(name) {
            None => Some(record),
            Some(existing) if existing.is_undefined() => Some(record),
            Some(existing) => merge_conflicting(existing, record, name, diagnostics),
        };

        if let Some(merged) = merged {
            debug!(name, kind = merged.kind.kind_name(), tag = ?merged.tag, "registered");
            let refs: Vec<String> = merged
                .kind
                .references()
                .into_iter()
                .map(str::to_string)
                .collect();
            self.types.insert(name.to_string(), merged);
            for r in refs {
                self.get(&r);
            }
        }
        &self.types[name]
    }

    /// Read-only lookup.
    pub fn lookup(&self, name: &str) -> Option<&TypeRecord> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeRecord)> {
        self.types.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Names still holding an undefined placeholder.
    pub fn undefined_names(&self) -> Vec<String> {
        self.types
            .iter()
            .filter(|(_, r)| r.is_undefined())
            .map(|(k, _)| k.clone())
            .collect()
    }
}

/// Resolve a collision between two defined records. Returns the record to
/// store, or `None` when the new one is rejected.
fn merge_conflicting(
    existing: &TypeRecord,
    new: TypeRecord,
    name: &str,
    diagnostics: &mut Diagnostics,
) -> Option<TypeRecord> {
    let tag = if existing.is_core() || new.is_core() {
        Tag::Core
    } else {
        Tag::Helper
    };
    match (&existing.kind, new.kind) {
        (TypeKind::Structure(_), TypeKind::Handle(h)) => {
            debug!(name, "handle definition replaces struct declaration");
            Some(TypeRecord::new(TypeKind::Handle(h), tag))
        }
        (TypeKind::Handle(h), TypeKind::Structure(_)) => {
            debug!(name, "keeping handle over struct declaration");
            Some(TypeRecord::new(TypeKind::Handle(h.clone()), tag))
        }
        (old, new_kind) => {
            diagnostics.warn(
                Stage::Registry,
                Some(name),
                format!(
                    "conflicting redefinition as {} (already defined as {}), keeping the first",
                    new_kind.kind_name(),
                    old.kind_name()
                ),
            );
            None
        }
    }
}
