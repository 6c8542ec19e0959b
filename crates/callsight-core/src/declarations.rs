use crate::scope::ScopeId;
use crate::types::Type;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeclId(pub u32);

impl std::fmt::Display for DeclId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "decl{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventParam {
    pub name: String,
    pub ty: Type,
    pub indexed: bool,
}

/// Structure members keyed by name, with the declaration order kept alongside.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureElems {
    map: HashMap<String, Type>,
    order: Vec<String>,
}

impl StructureElems {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a member; re-inserting an existing name replaces its type in place.
    pub fn insert(&mut self, name: impl Into<String>, ty: Type) {
        let name = name.into();
        if self.map.insert(name.clone(), ty).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.map.get(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Type)> {
        self.order
            .iter()
            .filter_map(move |name| self.map.get(name).map(|ty| (name.as_str(), ty)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsingForEntry {
    pub library: String,
    /// `None` for `using L for *`.
    pub for_type: Option<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopLevelKind {
    CustomError { parameters: Vec<(String, Type)> },
    Enum { values: Vec<String> },
    Event { elems: Vec<EventParam>, anonymous: bool },
    Structure { elements: StructureElems },
    UsingFor { table: Vec<UsingForEntry> },
}

impl TopLevelKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TopLevelKind::CustomError { .. } => "error",
            TopLevelKind::Enum { .. } => "enum",
            TopLevelKind::Event { .. } => "event",
            TopLevelKind::Structure { .. } => "struct",
            TopLevelKind::UsingFor { .. } => "using-for",
        }
    }
}

/// A named declaration owned by a file scope, and optionally by a contract.
///
/// Declarations are built in two phases: the front end registers the name and the raw AST children,
/// then [`TopLevel::analyze`] consumes the raw buffer once to fill `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopLevel {
    pub id: DeclId,
    pub scope: ScopeId,
    pub owner: Option<String>,
    pub name: String,
    pub canonical_name: String,
    pub kind: TopLevelKind,
    pub raw: Vec<serde_json::Value>,
}

impl TopLevel {
    pub fn new(
        id: DeclId,
        scope: ScopeId,
        name: impl Into<String>,
        kind: TopLevelKind,
        raw: Vec<serde_json::Value>,
    ) -> Self {
        let name = name.into();
        Self {
            id,
            scope,
            owner: None,
            canonical_name: name.clone(),
            name,
            kind,
            raw,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        let owner = owner.into();
        self.canonical_name = format!("{}.{}", owner, self.name);
        self.owner = Some(owner);
        self
    }

    pub fn is_pending(&self) -> bool {
        !self.raw.is_empty()
    }

    /// Consumes the raw buffer. A declaration with an empty buffer is left untouched.
    pub fn analyze<E>(
        &mut self,
        build: impl FnOnce(&mut TopLevelKind, &[serde_json::Value]) -> Result<(), E>,
    ) -> Result<(), E> {
        if self.raw.is_empty() {
            return Ok(());
        }
        let raw = std::mem::take(&mut self.raw);
        build(&mut self.kind, &raw)
    }

    pub fn event_elems(&self) -> Option<&[EventParam]> {
        match &self.kind {
            TopLevelKind::Event { elems, .. } => Some(elems),
            _ => None,
        }
    }

    pub fn structure_elems(&self) -> Option<&StructureElems> {
        match &self.kind {
            TopLevelKind::Structure { elements } => Some(elements),
            _ => None,
        }
    }
}
