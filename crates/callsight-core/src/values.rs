use crate::types::Type;
use crate::unit::IrCounters;
use crate::{IrError, Result};
use num_bigint::{BigInt, BigUint};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperandId(pub u32);

impl std::fmt::Display for OperandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constant {
    Bool(bool),
    Uint(BigUint),
    Int(BigInt),
    Address(String),
    String(String),
    Bytes(Vec<u8>),
}

impl Constant {
    /// Parses an integer literal as written in source: decimal, `0x` hex or scientific (`2.5e3`).
    pub fn parse_number(literal: &str) -> Option<Self> {
        let cleaned: String = literal.chars().filter(|c| *c != '_').collect();
        let (negative, digits) = match cleaned.strip_prefix('-') {
            Some(rest) => (true, rest.to_string()),
            None => (false, cleaned),
        };
        let magnitude = if let Some(hex) = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
        {
            BigUint::parse_bytes(hex.as_bytes(), 16)?
        } else if let Some((mantissa, exponent)) = digits.split_once(['e', 'E']) {
            let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
            let exponent = exponent.parse::<i64>().ok()? - fraction.len() as i64;
            if exponent < 0 {
                return None;
            }
            let base = BigUint::parse_bytes(format!("{}{}", whole, fraction).as_bytes(), 10)?;
            base * BigUint::from(10u32).pow(exponent as u32)
        } else {
            BigUint::parse_bytes(digits.as_bytes(), 10)?
        };
        if negative {
            Some(Constant::Int(-BigInt::from(magnitude)))
        } else {
            Some(Constant::Uint(magnitude))
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Constant::Uint(val) => val.to_u64(),
            Constant::Int(val) => val.to_u64(),
            Constant::Bool(b) => Some(u64::from(*b)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Uint(val) => write!(f, "{}", val),
            Constant::Int(val) => write!(f, "{}", val),
            Constant::Address(addr) => write!(f, "{}", addr),
            Constant::String(s) => write!(f, "\"{}\"", s),
            Constant::Bytes(bytes) => {
                write!(f, "0x")?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperandKind {
    State { name: String },
    Local { name: String },
    Temporary { index: u32 },
    Reference { index: u32, points_to: Option<OperandId> },
    Tuple { index: u32 },
    Constant(Constant),
    Builtin { name: String },
}

impl OperandKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            OperandKind::State { .. } => "state",
            OperandKind::Local { .. } => "local",
            OperandKind::Temporary { .. } => "temporary",
            OperandKind::Reference { .. } => "reference",
            OperandKind::Tuple { .. } => "tuple",
            OperandKind::Constant(_) => "constant",
            OperandKind::Builtin { .. } => "builtin",
        }
    }

    pub fn is_ir_introduced(&self) -> bool {
        matches!(
            self,
            OperandKind::Temporary { .. }
                | OperandKind::Reference { .. }
                | OperandKind::Tuple { .. }
        )
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, OperandKind::State { .. } | OperandKind::Local { .. })
    }
}

/// Link from an SSA operand back to the operand it renames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SsaLink {
    /// SSA identity of a temporary, reference or tuple. Exactly one per non-SSA operand.
    Variant { non_ssa_version: OperandId },
    /// Numbered version of a state or local variable. Index 0 is the entry value.
    Version { base: OperandId, index: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operand {
    pub kind: OperandKind,
    pub ty: Type,
    pub ssa: Option<SsaLink>,
}

impl Operand {
    pub fn new(kind: OperandKind, ty: Type) -> Self {
        Self { kind, ty, ssa: None }
    }

    pub fn is_valid_lvalue(&self) -> bool {
        matches!(
            self.kind,
            OperandKind::State { .. }
                | OperandKind::Local { .. }
                | OperandKind::Temporary { .. }
                | OperandKind::Reference { .. }
                | OperandKind::Tuple { .. }
        )
    }

    pub fn is_valid_rvalue(&self) -> bool {
        self.is_valid_lvalue()
            || matches!(self.kind, OperandKind::Constant(_) | OperandKind::Builtin { .. })
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, OperandKind::Reference { .. })
    }

    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            OperandKind::State { name }
            | OperandKind::Local { name }
            | OperandKind::Builtin { name } => Some(name),
            _ => None,
        }
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            OperandKind::State { name } | OperandKind::Local { name } => match self.ssa {
                Some(SsaLink::Version { index, .. }) => write!(f, "{}_{}", name, index),
                _ => write!(f, "{}", name),
            },
            OperandKind::Temporary { index } => write!(f, "TMP_{}", index),
            OperandKind::Reference { index, .. } => write!(f, "REF_{}", index),
            OperandKind::Tuple { index } => write!(f, "TUPLE_{}", index),
            OperandKind::Constant(c) => write!(f, "{}", c),
            OperandKind::Builtin { name } => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Slot {
    operand: Operand,
    variant: Option<OperandId>,
    entry_version: Option<OperandId>,
    versions: u32,
}

/// Per-function operand storage.
///
/// Operands are addressed by [`OperandId`] and never removed. Besides construction, the only
/// mutations are setting a reference's `points_to` once and [`OperandArena::reindex`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperandArena {
    slots: Vec<Slot>,
    reference_count: usize,
}

impl OperandArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn add(&mut self, operand: Operand) -> OperandId {
        if operand.is_reference() {
            self.reference_count += 1;
        }
        let id = OperandId(self.slots.len() as u32);
        self.slots.push(Slot {
            operand,
            variant: None,
            entry_version: None,
            versions: 0,
        });
        id
    }

    pub fn state(&mut self, name: impl Into<String>, ty: Type) -> OperandId {
        self.add(Operand::new(OperandKind::State { name: name.into() }, ty))
    }

    pub fn local(&mut self, name: impl Into<String>, ty: Type) -> OperandId {
        self.add(Operand::new(OperandKind::Local { name: name.into() }, ty))
    }

    pub fn constant(&mut self, value: Constant, ty: Type) -> OperandId {
        self.add(Operand::new(OperandKind::Constant(value), ty))
    }

    pub fn builtin(&mut self, name: impl Into<String>, ty: Type) -> OperandId {
        self.add(Operand::new(OperandKind::Builtin { name: name.into() }, ty))
    }

    pub fn temporary(&mut self, counters: &mut IrCounters, ty: Type) -> OperandId {
        let index = counters.next_temporary();
        self.add(Operand::new(OperandKind::Temporary { index }, ty))
    }

    pub fn reference(&mut self, counters: &mut IrCounters, ty: Type) -> OperandId {
        let index = counters.next_reference();
        self.add(Operand::new(
            OperandKind::Reference {
                index,
                points_to: None,
            },
            ty,
        ))
    }

    pub fn tuple(&mut self, counters: &mut IrCounters, ty: Type) -> OperandId {
        let index = counters.next_tuple();
        self.add(Operand::new(OperandKind::Tuple { index }, ty))
    }

    pub fn get(&self, id: OperandId) -> Result<&Operand> {
        self.slots
            .get(id.0 as usize)
            .map(|slot| &slot.operand)
            .ok_or(IrError::UnknownOperand(id.0))
    }

    pub fn iter(&self) -> impl Iterator<Item = (OperandId, &Operand)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(idx, slot)| (OperandId(idx as u32), &slot.operand))
    }

    pub fn reference_count(&self) -> usize {
        self.reference_count
    }

    pub fn display(&self, id: OperandId) -> String {
        match self.get(id) {
            Ok(op) => op.to_string(),
            Err(_) => id.to_string(),
        }
    }

    /// Binds a reference to the operand it aliases. A reference is bound at most once.
    pub fn set_points_to(&mut self, reference: OperandId, target: OperandId) -> Result<()> {
        self.get(target)?;
        let operand = self.operand_mut(reference)?;
        let label = operand.to_string();
        match &mut operand.kind {
            OperandKind::Reference { points_to, .. } => {
                if points_to.is_some() {
                    return Err(IrError::Sequencing(format!(
                        "{} is already bound to an operand",
                        label
                    )));
                }
                *points_to = Some(target);
                Ok(())
            }
            other => Err(IrError::InvalidLvalue {
                operand: label,
                kind: other.kind_name(),
            }),
        }
    }

    /// Follows a reference chain to the first non-reference operand.
    ///
    /// An unbound reference resolves to itself. The walk is bounded by the number of references
    /// in the arena; revisiting an operand or exceeding the bound is a [`IrError::ReferenceCycle`].
    pub fn resolve_points_to(&self, id: OperandId) -> Result<OperandId> {
        let bound = self.reference_count;
        let mut visited = HashSet::new();
        let mut current = id;
        loop {
            let operand = self.get(current)?;
            match operand.kind {
                OperandKind::Reference {
                    points_to: Some(next),
                    ..
                } => {
                    if !visited.insert(current) || visited.len() > bound {
                        return Err(IrError::ReferenceCycle {
                            operand: self.display(id),
                            bound,
                        });
                    }
                    current = next;
                }
                _ => return Ok(current),
            }
        }
    }

    /// Returns the SSA variant of a temporary, reference or tuple, creating it on first use.
    pub fn ssa_variant(&mut self, id: OperandId) -> Result<OperandId> {
        let slot = self.slot(id)?;
        if let Some(existing) = slot.variant {
            return Ok(existing);
        }
        if slot.operand.ssa.is_some() {
            return Ok(id);
        }
        let kind = match &slot.operand.kind {
            OperandKind::Temporary { index } => OperandKind::Temporary { index: *index },
            OperandKind::Tuple { index } => OperandKind::Tuple { index: *index },
            OperandKind::Reference { index, .. } => OperandKind::Reference {
                index: *index,
                points_to: None,
            },
            other => {
                return Err(IrError::InvalidLvalue {
                    operand: slot.operand.to_string(),
                    kind: other.kind_name(),
                })
            }
        };
        let ty = slot.operand.ty.clone();
        let variant = self.add(Operand {
            kind,
            ty,
            ssa: Some(SsaLink::Variant {
                non_ssa_version: id,
            }),
        });
        self.slot_mut(id)?.variant = Some(variant);
        Ok(variant)
    }

    /// Version 0 of a state or local variable: its value on function entry.
    pub fn entry_version(&mut self, base: OperandId) -> Result<OperandId> {
        if let Some(existing) = self.slot(base)?.entry_version {
            return Ok(existing);
        }
        let version = self.make_version(base, 0)?;
        self.slot_mut(base)?.entry_version = Some(version);
        Ok(version)
    }

    /// A fresh version of a state or local variable, numbered from 1.
    pub fn new_version(&mut self, base: OperandId) -> Result<OperandId> {
        let index = self.slot(base)?.versions + 1;
        let version = self.make_version(base, index)?;
        self.slot_mut(base)?.versions = index;
        Ok(version)
    }

    fn make_version(&mut self, base: OperandId, index: u32) -> Result<OperandId> {
        let operand = self.get(base)?;
        if !operand.kind.is_variable() || operand.ssa.is_some() {
            return Err(IrError::InvalidLvalue {
                operand: operand.to_string(),
                kind: operand.kind.kind_name(),
            });
        }
        let versioned = Operand {
            kind: operand.kind.clone(),
            ty: operand.ty.clone(),
            ssa: Some(SsaLink::Version { base, index }),
        };
        Ok(self.add(versioned))
    }

    /// The operand an SSA operand renames, or the operand itself.
    pub fn non_ssa(&self, id: OperandId) -> OperandId {
        match self.get(id).map(|op| op.ssa) {
            Ok(Some(SsaLink::Variant { non_ssa_version })) => non_ssa_version,
            Ok(Some(SsaLink::Version { base, .. })) => base,
            _ => id,
        }
    }

    /// Renumbers an IR-introduced operand.
    pub fn reindex(&mut self, id: OperandId, new_index: u32) -> Result<()> {
        let operand = self.operand_mut(id)?;
        match &mut operand.kind {
            OperandKind::Temporary { index }
            | OperandKind::Reference { index, .. }
            | OperandKind::Tuple { index } => {
                *index = new_index;
                Ok(())
            }
            other => {
                let kind = other.kind_name();
                Err(IrError::InvalidLvalue {
                    operand: operand.to_string(),
                    kind,
                })
            }
        }
    }

    pub fn ensure_lvalue(&self, id: OperandId) -> Result<()> {
        let operand = self.get(id)?;
        if operand.is_valid_lvalue() {
            Ok(())
        } else {
            Err(IrError::InvalidLvalue {
                operand: operand.to_string(),
                kind: operand.kind.kind_name(),
            })
        }
    }

    pub fn ensure_rvalue(&self, id: OperandId) -> Result<()> {
        let operand = self.get(id)?;
        if operand.is_valid_rvalue() {
            Ok(())
        } else {
            Err(IrError::InvalidRvalue {
                operand: operand.to_string(),
                kind: operand.kind.kind_name(),
            })
        }
    }

    fn slot(&self, id: OperandId) -> Result<&Slot> {
        self.slots
            .get(id.0 as usize)
            .ok_or(IrError::UnknownOperand(id.0))
    }

    fn slot_mut(&mut self, id: OperandId) -> Result<&mut Slot> {
        self.slots
            .get_mut(id.0 as usize)
            .ok_or(IrError::UnknownOperand(id.0))
    }

    fn operand_mut(&mut self, id: OperandId) -> Result<&mut Operand> {
        self.slot_mut(id).map(|slot| &mut slot.operand)
    }
}
