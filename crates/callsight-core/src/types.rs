use serde::{Deserialize, Serialize};
use std::fmt;

/// Source-level type attached to operands and declarations.
///
/// Both compilers describe types as strings (`typeDescriptions.typeString` for solc, annotation
/// nodes for Vyper), so the model stays close to that surface form rather than modelling layouts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Elementary(String),
    Struct(String),
    Enum(String),
    Contract(String),
    Array(Box<Type>, Option<usize>),
    Mapping(Box<Type>, Box<Type>),
    Tuple(Vec<Type>),
    Function(String),
    TypeOf(Box<Type>),
    Unknown,
}

const LOCATION_SUFFIXES: &[&str] = &[
    " storage ref",
    " storage pointer",
    " memory",
    " calldata",
    " storage",
    " pointer",
    " ref",
];

impl Type {
    pub fn elementary(name: impl Into<String>) -> Self {
        Type::Elementary(name.into())
    }

    pub fn uint256() -> Self {
        Type::Elementary("uint256".to_string())
    }

    pub fn address() -> Self {
        Type::Elementary("address".to_string())
    }

    pub fn bool() -> Self {
        Type::Elementary("bool".to_string())
    }

    /// Parses a solc `typeString` such as `mapping(address => uint256)`,
    /// `struct Vault.Position storage ref` or `tuple(uint256,bool)`.
    pub fn from_type_string(raw: &str) -> Self {
        let mut s = raw.trim();
        if s.is_empty() {
            return Type::Unknown;
        }

        loop {
            let before = s;
            for suffix in LOCATION_SUFFIXES {
                if let Some(stripped) = s.strip_suffix(suffix) {
                    s = stripped.trim_end();
                }
            }
            if before == s {
                break;
            }
        }

        if let Some(inner) = strip_wrapped(s, "type(", ")") {
            return Type::TypeOf(Box::new(Type::from_type_string(inner)));
        }
        if let Some(inner) = strip_wrapped(s, "mapping(", ")") {
            return match split_top_level(inner, "=>").as_slice() {
                [key, value] => Type::Mapping(
                    Box::new(Type::from_type_string(key)),
                    Box::new(Type::from_type_string(value)),
                ),
                _ => Type::Unknown,
            };
        }
        if let Some(inner) = strip_wrapped(s, "tuple(", ")") {
            if inner.trim().is_empty() {
                return Type::Tuple(Vec::new());
            }
            return Type::Tuple(
                split_top_level(inner, ",")
                    .into_iter()
                    .map(Type::from_type_string)
                    .collect(),
            );
        }
        if s.starts_with("function") {
            return Type::Function(s.to_string());
        }
        if s.ends_with(']') {
            if let Some(open) = matching_open_bracket(s) {
                let element = Type::from_type_string(&s[..open]);
                let size = s[open + 1..s.len() - 1].trim().parse::<usize>().ok();
                return Type::Array(Box::new(element), size);
            }
        }
        if let Some(name) = s.strip_prefix("struct ") {
            return Type::Struct(name.trim().to_string());
        }
        if let Some(name) = s.strip_prefix("enum ") {
            return Type::Enum(name.trim().to_string());
        }
        if let Some(name) = s
            .strip_prefix("contract ")
            .or_else(|| s.strip_prefix("library "))
            .or_else(|| s.strip_prefix("interface "))
        {
            return Type::Contract(name.trim().to_string());
        }
        if let Some(value) = s.strip_prefix("int_const ") {
            let signed = value.trim_start().starts_with('-');
            return Type::Elementary(if signed { "int256" } else { "uint256" }.to_string());
        }
        if s.starts_with("rational_const ") {
            return Type::Elementary("uint256".to_string());
        }
        if s.starts_with("literal_string") {
            return Type::Elementary("string".to_string());
        }
        if s.starts_with("literal_hex") || s.starts_with("hex_string") {
            return Type::Elementary("bytes".to_string());
        }

        Type::Elementary(s.to_string())
    }

    /// Components of a multi-value type; a single-value type is its own only component.
    pub fn components(&self) -> Vec<&Type> {
        match self {
            Type::Tuple(items) => items.iter().collect(),
            other => vec![other],
        }
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, Type::Tuple(_))
    }

    pub fn contract_name(&self) -> Option<&str> {
        match self {
            Type::Contract(name) => Some(name),
            Type::TypeOf(inner) => inner.contract_name(),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Elementary(name)
            | Type::Struct(name)
            | Type::Enum(name)
            | Type::Contract(name) => write!(f, "{}", name),
            Type::Array(elem, Some(size)) => write!(f, "{}[{}]", elem, size),
            Type::Array(elem, None) => write!(f, "{}[]", elem),
            Type::Mapping(key, value) => write!(f, "mapping({} => {})", key, value),
            Type::Tuple(items) => {
                let items = items
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, "tuple({})", items)
            }
            Type::Function(raw) => write!(f, "{}", raw),
            Type::TypeOf(inner) => write!(f, "type({})", inner),
            Type::Unknown => write!(f, "?"),
        }
    }
}

fn strip_wrapped<'a>(s: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    s.strip_prefix(prefix)?.strip_suffix(suffix)
}

fn split_top_level<'a>(s: &'a str, separator: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let bytes = s.as_bytes();
    let sep = separator.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth -= 1,
            _ => {}
        }
        if depth == 0 && bytes[i..].starts_with(sep) {
            parts.push(s[start..i].trim());
            i += sep.len();
            start = i;
            continue;
        }
        i += 1;
    }
    parts.push(s[start..].trim());
    parts
}

fn matching_open_bracket(s: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (idx, ch) in s.char_indices().rev() {
        match ch {
            ']' => depth += 1,
            '[' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}
