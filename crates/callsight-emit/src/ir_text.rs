use crate::emitter::{EmitContext, EmitHelper, EmitResult, Emitter, Tone};
use anyhow::Result;
use callsight_core::{CompilationUnit, Function, FunctionBody, Node, OperandArena, Phi, Terminator};
use std::io::Write;

/// Textual listing of every lowered function in a unit, node by node.
pub struct IrTextEmitter {
    pub use_colors: bool,
}

impl IrTextEmitter {
    pub fn new() -> Self {
        Self { use_colors: false }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    pub fn render(&self, unit: &CompilationUnit) -> Result<String> {
        let mut buffer = Vec::new();
        let mut context = EmitContext {
            use_colors: self.use_colors,
            ..EmitContext::new()
        };
        self.emit(unit, &mut buffer, &mut context)?;
        Ok(String::from_utf8(buffer)?)
    }

    fn emit_function<W: Write>(
        &self,
        unit: &CompilationUnit,
        function: &Function,
        writer: &mut W,
        context: &mut EmitContext,
    ) -> EmitResult {
        let header = format!("function {} {}", function.display_name(), function.visibility);
        let Some(body) = &function.body else {
            return EmitHelper::write_comment(writer, context, &format!("{}: no body", header));
        };
        EmitHelper::write_block(writer, context, &header, |w, c| {
            for node in &body.nodes {
                emit_node(unit, body, node, w, c)?;
            }
            Ok(())
        })
    }
}

impl Default for IrTextEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Emitter for IrTextEmitter {
    type Item = CompilationUnit;

    fn emit<W: Write>(
        &self,
        unit: &CompilationUnit,
        writer: &mut W,
        context: &mut EmitContext,
    ) -> EmitResult {
        for contract in &unit.contracts {
            let header = format!("{} {}", contract.kind.as_str(), contract.name);
            EmitHelper::write_block(writer, context, &header, |w, c| {
                for function in unit.functions_of(contract) {
                    self.emit_function(unit, function, w, c)?;
                }
                Ok(())
            })?;
        }
        Ok(())
    }
}

fn phi_text(arena: &OperandArena, phi: &Phi) -> String {
    let incoming = phi
        .incoming
        .iter()
        .map(|(node, value)| format!("{}: {}", node, arena.display(*value)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{} := phi({})", arena.display(phi.lvalue), incoming)
}

fn terminator_text(arena: &OperandArena, terminator: &Terminator) -> String {
    match terminator {
        Terminator::Goto(target) => format!("goto {}", target),
        Terminator::Branch {
            condition,
            then_node,
            else_node,
        } => format!(
            "branch {} ? {} : {}",
            arena.display(*condition),
            then_node,
            else_node
        ),
        Terminator::Return(values) if values.is_empty() => "return".to_string(),
        Terminator::Return(values) => format!(
            "return {}",
            values
                .iter()
                .map(|v| arena.display(*v))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Terminator::Revert => "revert".to_string(),
        Terminator::Open => "open".to_string(),
    }
}

fn emit_node<W: Write>(
    unit: &CompilationUnit,
    body: &FunctionBody,
    node: &Node,
    writer: &mut W,
    context: &mut EmitContext,
) -> EmitResult {
    EmitHelper::write_toned_line(writer, context, &format!("{}:", node.id), Tone::Label)?;
    context.indent();
    for phi in &node.phis {
        EmitHelper::write_line(writer, context, &phi_text(&body.arena, phi))?;
    }
    for op in &node.operations {
        let text = op.display(&body.arena, unit).to_string();
        match op.callee() {
            Some(_) => EmitHelper::write_toned_line(writer, context, &text, Tone::Call)?,
            None => EmitHelper::write_line(writer, context, &text)?,
        }
    }
    EmitHelper::write_toned_line(
        writer,
        context,
        &terminator_text(&body.arena, &node.terminator),
        Tone::Terminator,
    )?;
    context.dedent();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use callsight_core::{
        ContractKind, FunctionId, FunctionKind, Language, Operation, Type, Visibility,
    };

    fn counter_unit() -> CompilationUnit {
        let mut unit = CompilationUnit::new("Counter.sol", Language::Solidity);
        let scope = unit.add_scope("Counter.sol");
        let contract = unit.add_contract("Counter", ContractKind::Contract, scope);

        let mut body = FunctionBody::new();
        let count = body.arena.state("count", Type::uint256());
        let entry = body.add_node();
        let exit = body.add_node();
        if let Some(node) = body.node_mut(entry) {
            node.push(Operation::Nop);
            node.terminator = Terminator::Goto(exit);
        }
        if let Some(node) = body.node_mut(exit) {
            node.terminator = Terminator::Return(vec![count]);
        }

        let mut bump = Function::new(FunctionId(0), "bump", FunctionKind::Function);
        bump.contract_context = Some("Counter".to_string());
        bump.visibility = Visibility::External;
        bump.is_implemented = true;
        bump.body = Some(body);

        let mut hook = Function::new(FunctionId(0), "hook", FunctionKind::Function);
        hook.contract_context = Some("Counter".to_string());
        hook.visibility = Visibility::Internal;

        let ids = [unit.add_function(bump), unit.add_function(hook)];
        if let Some(counter) = unit.contract_mut(contract) {
            counter.functions.extend(ids);
        }
        unit
    }

    #[test]
    fn test_render_counter() {
        let text = IrTextEmitter::new().render(&counter_unit()).unwrap();
        insta::assert_snapshot!(text, @r###"
        contract Counter {
            function Counter.bump() external {
                node0:
                    NOP
                    goto node1
                node1:
                    return count
            }
            // function Counter.hook() internal: no body
        }
        "###);
    }
}
