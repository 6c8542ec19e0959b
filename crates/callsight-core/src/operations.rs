use crate::function::FunctionId;
use crate::types::Type;
use crate::values::{OperandArena, OperandId, OperandKind};
use crate::{IrError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    BitNot,
}

impl UnaryOp {
    pub fn from_token(token: &str) -> Result<Self> {
        match token {
            "!" => Ok(UnaryOp::Not),
            "~" => Ok(UnaryOp::BitNot),
            other => Err(IrError::UnknownUnaryOperator(other.to_string())),
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallArgs {
    pub names: Option<Vec<String>>,
    pub arguments: Vec<OperandId>,
}

impl CallArgs {
    pub fn positional(arguments: Vec<OperandId>) -> Self {
        Self {
            names: None,
            arguments,
        }
    }

    pub fn named(names: Vec<String>, arguments: Vec<OperandId>) -> Self {
        Self {
            names: Some(names),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HighLevelTarget {
    Function(FunctionId),
    /// Public state variable read through its generated getter.
    Variable(String),
    Unresolved(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnresolvedEdge {
    Internal,
    Library,
}

/// Expression forms that have no dedicated operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intrinsic {
    Binary(String),
    Index,
    Member(String),
    Conversion,
    Emit(String),
    LowLevel(String),
    Creation(String),
    TupleComponent(usize),
    Initializer,
}

impl fmt::Display for Intrinsic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intrinsic::Binary(op) => write!(f, "BINARY {}", op),
            Intrinsic::Index => write!(f, "INDEX"),
            Intrinsic::Member(member) => write!(f, "MEMBER .{}", member),
            Intrinsic::Conversion => write!(f, "CONVERT"),
            Intrinsic::Emit(event) => write!(f, "EMIT {}", event),
            Intrinsic::LowLevel(kind) => write!(f, "LOW_LEVEL {}", kind),
            Intrinsic::Creation(contract) => write!(f, "NEW_CONTRACT {}", contract),
            Intrinsic::TupleComponent(idx) => write!(f, "UNPACK[{}]", idx),
            Intrinsic::Initializer => write!(f, "INIT_LIST"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Callee {
    Internal(FunctionId),
    Library(FunctionId),
    HighLevel {
        contract: Option<String>,
        target: HighLevelTarget,
    },
    Builtin(String),
    Unresolved { edge: UnresolvedEdge, label: String },
    Intrinsic(Intrinsic),
}

impl Callee {
    pub fn is_intrinsic(&self) -> bool {
        matches!(self, Callee::Intrinsic(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOperation {
    pub args: CallArgs,
    pub lvalue: Option<OperandId>,
    pub callee: Callee,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Assignment {
        lvalue: OperandId,
        rvalue: OperandId,
        declared_type: Type,
    },
    Call(CallOperation),
    NewElementaryType {
        args: CallArgs,
        ty: Type,
        lvalue: OperandId,
    },
    NewStructure {
        args: CallArgs,
        structure: String,
        lvalue: OperandId,
    },
    Delete {
        lvalue: OperandId,
        operand: OperandId,
    },
    Unary {
        lvalue: OperandId,
        operand: OperandId,
        op: UnaryOp,
    },
    Nop,
}

impl Operation {
    pub fn assignment(
        arena: &OperandArena,
        lvalue: OperandId,
        rvalue: OperandId,
        declared_type: Type,
    ) -> Result<Self> {
        arena.ensure_lvalue(lvalue)?;
        arena.ensure_rvalue(rvalue)?;
        Ok(Operation::Assignment {
            lvalue,
            rvalue,
            declared_type,
        })
    }

    pub fn call(
        arena: &OperandArena,
        callee: Callee,
        args: CallArgs,
        lvalue: Option<OperandId>,
    ) -> Result<Self> {
        if let Some(lv) = lvalue {
            arena.ensure_lvalue(lv)?;
        }
        check_args(arena, &args)?;
        Ok(Operation::Call(CallOperation {
            args,
            lvalue,
            callee,
        }))
    }

    pub fn new_elementary_type(
        arena: &OperandArena,
        ty: Type,
        args: CallArgs,
        lvalue: OperandId,
    ) -> Result<Self> {
        arena.ensure_lvalue(lvalue)?;
        check_args(arena, &args)?;
        Ok(Operation::NewElementaryType { args, ty, lvalue })
    }

    pub fn new_structure(
        arena: &OperandArena,
        structure: impl Into<String>,
        args: CallArgs,
        lvalue: OperandId,
    ) -> Result<Self> {
        arena.ensure_lvalue(lvalue)?;
        check_args(arena, &args)?;
        Ok(Operation::NewStructure {
            args,
            structure: structure.into(),
            lvalue,
        })
    }

    pub fn delete(arena: &OperandArena, lvalue: OperandId, operand: OperandId) -> Result<Self> {
        arena.ensure_lvalue(lvalue)?;
        arena.ensure_rvalue(operand)?;
        Ok(Operation::Delete { lvalue, operand })
    }

    pub fn unary(
        arena: &OperandArena,
        lvalue: OperandId,
        operand: OperandId,
        token: &str,
    ) -> Result<Self> {
        let op = UnaryOp::from_token(token)?;
        arena.ensure_lvalue(lvalue)?;
        arena.ensure_rvalue(operand)?;
        Ok(Operation::Unary {
            lvalue,
            operand,
            op,
        })
    }

    /// Operands consumed by the operation, in argument order.
    pub fn read(&self) -> Vec<OperandId> {
        match self {
            Operation::Assignment { rvalue, .. } => vec![*rvalue],
            Operation::Call(call) => call.args.arguments.clone(),
            Operation::NewElementaryType { args, .. } | Operation::NewStructure { args, .. } => {
                args.arguments.clone()
            }
            Operation::Delete { operand, .. } | Operation::Unary { operand, .. } => vec![*operand],
            Operation::Nop => Vec::new(),
        }
    }

    pub fn lvalue(&self) -> Option<OperandId> {
        match self {
            Operation::Assignment { lvalue, .. }
            | Operation::NewElementaryType { lvalue, .. }
            | Operation::NewStructure { lvalue, .. }
            | Operation::Delete { lvalue, .. }
            | Operation::Unary { lvalue, .. } => Some(*lvalue),
            Operation::Call(call) => call.lvalue,
            Operation::Nop => None,
        }
    }

    pub fn callee(&self) -> Option<&Callee> {
        match self {
            Operation::Call(call) => Some(&call.callee),
            _ => None,
        }
    }

    pub fn map_reads(&mut self, mut f: impl FnMut(OperandId) -> OperandId) {
        match self {
            Operation::Assignment { rvalue, .. } => *rvalue = f(*rvalue),
            Operation::Call(CallOperation { args, .. })
            | Operation::NewElementaryType { args, .. }
            | Operation::NewStructure { args, .. } => {
                for arg in args.arguments.iter_mut() {
                    *arg = f(*arg);
                }
            }
            Operation::Delete { operand, .. } | Operation::Unary { operand, .. } => {
                *operand = f(*operand)
            }
            Operation::Nop => {}
        }
    }

    pub fn map_lvalue(&mut self, f: impl FnOnce(OperandId) -> OperandId) {
        match self {
            Operation::Assignment { lvalue, .. }
            | Operation::NewElementaryType { lvalue, .. }
            | Operation::NewStructure { lvalue, .. }
            | Operation::Delete { lvalue, .. }
            | Operation::Unary { lvalue, .. } => *lvalue = f(*lvalue),
            Operation::Call(call) => {
                if let Some(lv) = call.lvalue.as_mut() {
                    *lv = f(*lv);
                }
            }
            Operation::Nop => {}
        }
    }

    pub fn display<'a>(
        &'a self,
        arena: &'a OperandArena,
        names: &'a dyn FunctionNames,
    ) -> OperationDisplay<'a> {
        OperationDisplay {
            op: self,
            arena,
            names,
        }
    }
}

fn check_args(arena: &OperandArena, args: &CallArgs) -> Result<()> {
    for arg in &args.arguments {
        arena.ensure_rvalue(*arg)?;
    }
    Ok(())
}

/// Resolves function ids to printable labels when rendering calls.
pub trait FunctionNames {
    fn function_label(&self, id: FunctionId) -> String;
}

impl FunctionNames for () {
    fn function_label(&self, id: FunctionId) -> String {
        id.to_string()
    }
}

pub struct OperationDisplay<'a> {
    op: &'a Operation,
    arena: &'a OperandArena,
    names: &'a dyn FunctionNames,
}

impl OperationDisplay<'_> {
    fn typed(&self, id: OperandId) -> String {
        match self.arena.get(id) {
            Ok(operand) => format!("{}({})", operand, operand.ty),
            Err(_) => id.to_string(),
        }
    }

    fn plain(&self, id: OperandId) -> String {
        self.arena.display(id)
    }

    fn rvalue_typed(&self, id: OperandId) -> String {
        match self.arena.get(id) {
            Ok(operand) => {
                let ty = operand
                    .ty
                    .components()
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}({})", operand, ty)
            }
            Err(_) => id.to_string(),
        }
    }

    fn args(&self, args: &CallArgs) -> String {
        let values = args.arguments.iter().map(|a| self.plain(*a));
        match &args.names {
            Some(names) => names
                .iter()
                .zip(values)
                .map(|(n, v)| format!("{}={}", n, v))
                .collect::<Vec<_>>()
                .join(","),
            None => values.collect::<Vec<_>>().join(","),
        }
    }

    fn callee(&self, callee: &Callee) -> String {
        match callee {
            Callee::Internal(id) => format!("INTERNAL {}", self.names.function_label(*id)),
            Callee::Library(id) => format!("LIBRARY {}", self.names.function_label(*id)),
            Callee::HighLevel { contract, target } => {
                let receiver = contract.as_deref().unwrap_or("?");
                let label = match target {
                    HighLevelTarget::Function(id) => self.names.function_label(*id),
                    HighLevelTarget::Variable(name) => name.clone(),
                    HighLevelTarget::Unresolved(label) => label.clone(),
                };
                format!("HIGH_LEVEL {}::{}", receiver, label)
            }
            Callee::Builtin(name) => format!("SOLIDITY {}", name),
            Callee::Unresolved { label, .. } => format!("UNRESOLVED {}", label),
            Callee::Intrinsic(intrinsic) => intrinsic.to_string(),
        }
    }
}

impl fmt::Display for OperationDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Operation::Assignment { lvalue, rvalue, .. } => {
                let target = match self.arena.get(*lvalue).map(|op| &op.kind) {
                    Ok(OperandKind::Reference { .. }) => self
                        .arena
                        .resolve_points_to(*lvalue)
                        .ok()
                        .filter(|t| t != lvalue),
                    _ => None,
                };
                match target {
                    Some(target) => write!(
                        f,
                        "{} (->{}) := {}",
                        self.typed(*lvalue),
                        self.plain(target),
                        self.rvalue_typed(*rvalue)
                    ),
                    None => write!(
                        f,
                        "{} := {}",
                        self.typed(*lvalue),
                        self.rvalue_typed(*rvalue)
                    ),
                }
            }
            Operation::Call(call) => {
                let invocation = format!(
                    "CALL {}({})",
                    self.callee(&call.callee),
                    self.args(&call.args)
                );
                match call.lvalue {
                    Some(lv) => write!(f, "{} = {}", self.typed(lv), invocation),
                    None => write!(f, "{}", invocation),
                }
            }
            Operation::NewElementaryType { args, ty, lvalue } => {
                write!(f, "{} = new {}({})", self.plain(*lvalue), ty, self.args(args))
            }
            Operation::NewStructure {
                args,
                structure,
                lvalue,
            } => write!(
                f,
                "{} = new {}({})",
                self.typed(*lvalue),
                structure,
                self.args(args)
            ),
            Operation::Delete { lvalue, operand } => {
                write!(f, "{} = delete {}", self.plain(*lvalue), self.plain(*operand))
            }
            Operation::Unary {
                lvalue,
                operand,
                op,
            } => write!(
                f,
                "{} = {} {}",
                self.plain(*lvalue),
                op.token(),
                self.plain(*operand)
            ),
            Operation::Nop => write!(f, "NOP"),
        }
    }
}
