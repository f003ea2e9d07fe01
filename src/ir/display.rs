//! Displaying IR, in the same syntax the text front-end reads.

use super::{Block, FunctionBody, Module, Operand, Terminator};
use crate::entity::EntityRef;

use std::fmt::{Display, Formatter, Result as FmtResult};

pub struct FunctionBodyDisplay<'a>(pub(crate) &'a FunctionBody, pub(crate) &'a str);

impl<'a> FunctionBodyDisplay<'a> {
    fn operand(&self, op: &Operand) -> String {
        let name = self.0.var_name(op.var);
        match op.version {
            Some(version) => format!("{}_{}", name, version.index()),
            None => name.to_owned(),
        }
    }

    fn operands<'b, I: Iterator<Item = &'b Operand>>(&self, ops: I) -> String {
        ops.map(|op| self.operand(op))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl<'a> Display for FunctionBodyDisplay<'a> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let body = self.0;
        let indent = self.1;
        writeln!(f, "{}func {}", indent, body.name)?;
        if body.exit.is_valid() {
            writeln!(f, "{}exit {}", indent, body.exit)?;
        }

        // The entry block is printed first so the text re-parses with
        // the same entry.
        let order = std::iter::once(body.entry)
            .chain(body.blocks.iter().filter(|&block| block != body.entry))
            .collect::<Vec<Block>>();

        for block in order {
            let def = &body.blocks[block];
            writeln!(f, "{}{}:", indent, block)?;
            if !def.preds.is_empty() {
                let preds = def
                    .preds
                    .iter()
                    .map(|pred| format!("{}", pred))
                    .collect::<Vec<_>>();
                writeln!(f, "{}  # preds: {}", indent, preds.join(", "))?;
            }
            for phi in &def.phis {
                if body.is_renamed() {
                    let args = phi
                        .args
                        .iter()
                        .map(|arg| match arg {
                            Some(version) => {
                                format!("{}_{}", body.var_name(phi.def.var), version.index())
                            }
                            None => "undef".to_owned(),
                        })
                        .collect::<Vec<_>>();
                    writeln!(
                        f,
                        "{}  phi {}  # [{}]",
                        indent,
                        self.operand(&phi.def),
                        args.join(", ")
                    )?;
                } else {
                    writeln!(f, "{}  phi {}", indent, self.operand(&phi.def))?;
                }
            }
            for stmt in &def.stmts {
                let mut args = stmt
                    .uses
                    .iter()
                    .map(|op| self.operand(op))
                    .collect::<Vec<_>>();
                args.extend(stmt.imms.iter().map(|imm| format!("{}", imm)));
                let rhs = if args.is_empty() {
                    stmt.op.clone()
                } else {
                    format!("{} {}", stmt.op, args.join(", "))
                };
                if stmt.defs.is_empty() {
                    writeln!(f, "{}  {}", indent, rhs)?;
                } else {
                    writeln!(
                        f,
                        "{}  {} = {}",
                        indent,
                        self.operands(stmt.defs.iter()),
                        rhs
                    )?;
                }
            }
            match &def.terminator {
                Terminator::None => {}
                Terminator::Br { target } => writeln!(f, "{}  br {}", indent, target)?,
                Terminator::CondBr {
                    cond,
                    if_true,
                    if_false,
                } => writeln!(
                    f,
                    "{}  if {}, {}, {}",
                    indent,
                    self.operand(cond),
                    if_true,
                    if_false
                )?,
                Terminator::Select {
                    value,
                    targets,
                    default,
                } => writeln!(
                    f,
                    "{}  switch {}, [{}], {}",
                    indent,
                    self.operand(value),
                    targets
                        .iter()
                        .map(|target| format!("{}", target))
                        .collect::<Vec<_>>()
                        .join(", "),
                    default
                )?,
                Terminator::Return { values } if values.is_empty() => {
                    writeln!(f, "{}  return", indent)?
                }
                Terminator::Return { values } => writeln!(
                    f,
                    "{}  return {}",
                    indent,
                    self.operands(values.iter())
                )?,
                Terminator::Unreachable => writeln!(f, "{}  unreachable", indent)?,
            }
        }

        Ok(())
    }
}

pub struct ModuleDisplay<'a>(pub(crate) &'a Module);

impl<'a> Display for ModuleDisplay<'a> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        for (i, body) in self.0.funcs.values().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", body.display(""))?;
        }
        Ok(())
    }
}
