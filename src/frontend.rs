//! Text front-end: reads functions written in the same syntax that
//! `FunctionBody::display` prints.
//!
//! ```plain
//! func max
//! exit done
//! top:
//!   a, b = args
//!   c = lt a, b
//!   if c, left, right
//! left:
//!   m = copy b
//!   br done
//! right:
//!   m = copy a
//!   br done
//! done:
//!   phi m
//!   return m
//! ```
//!
//! The first label of a function is its entry block. `#` starts a
//! comment. Phis must be written out explicitly; nothing here decides
//! where they go.

use crate::ir::{Block, FunctionBody, Module, Operand, Stmt, Terminator, Var};
use anyhow::{bail, Result};
use fxhash::{FxHashMap, FxHashSet};

const KEYWORDS: &[&str] = &[
    "func",
    "exit",
    "phi",
    "br",
    "if",
    "switch",
    "return",
    "unreachable",
];

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.')
}

fn split_list(s: &str) -> Vec<&str> {
    let s = s.trim();
    if s.is_empty() {
        vec![]
    } else {
        s.split(',').map(|item| item.trim()).collect()
    }
}

/// Per-function parser state.
struct FuncBuilder {
    body: FunctionBody,
    labels: FxHashMap<String, Block>,
    defined: FxHashSet<Block>,
    entry_claimed: bool,
    current: Option<Block>,
    terminated: bool,
    exit_label: Option<(String, usize)>,
    first_ref: FxHashMap<Block, usize>,
}

impl FuncBuilder {
    /// `labels` are the block labels the function defines, in order;
    /// blocks are numbered in that order, so text printed from a body
    /// parses back to the same numbering.
    fn new(name: &str, labels: &[&str]) -> FuncBuilder {
        let mut builder = FuncBuilder {
            body: FunctionBody::new(name),
            labels: FxHashMap::default(),
            defined: FxHashSet::default(),
            entry_claimed: false,
            current: None,
            terminated: false,
            exit_label: None,
            first_ref: FxHashMap::default(),
        };
        for &label in labels {
            let block = if builder.entry_claimed {
                builder.body.add_block()
            } else {
                builder.entry_claimed = true;
                builder.body.entry
            };
            builder.labels.insert(label.to_owned(), block);
        }
        builder
    }

    fn block(&mut self, label: &str, line: usize) -> Result<Block> {
        if !is_ident(label) {
            bail!("line {}: bad block label `{}`", line, label);
        }
        if let Some(&block) = self.labels.get(label) {
            return Ok(block);
        }
        // Every defined label was numbered up front, so this is a
        // reference to a block that does not exist; `finish` reports it.
        let block = if self.entry_claimed {
            self.body.add_block()
        } else {
            self.entry_claimed = true;
            self.body.entry
        };
        self.labels.insert(label.to_owned(), block);
        self.first_ref.insert(block, line);
        Ok(block)
    }

    fn var(&mut self, name: &str, line: usize) -> Result<Var> {
        if !is_ident(name) || KEYWORDS.contains(&name) {
            bail!("line {}: bad variable name `{}`", line, name);
        }
        Ok(self.body.intern_var(name))
    }

    fn operand(&mut self, name: &str, line: usize) -> Result<Operand> {
        Ok(Operand::new(self.var(name, line)?))
    }

    fn current(&self, line: usize) -> Result<Block> {
        match self.current {
            Some(_) if self.terminated => {
                bail!("line {}: instruction after the block's terminator", line)
            }
            Some(block) => Ok(block),
            None => bail!("line {}: instruction outside of any block", line),
        }
    }

    fn terminate(&mut self, terminator: Terminator, line: usize) -> Result<()> {
        let block = self.current(line)?;
        self.body.set_terminator(block, terminator);
        self.terminated = true;
        Ok(())
    }

    fn line(&mut self, text: &str, line: usize) -> Result<()> {
        if let Some(label) = text.strip_suffix(':') {
            let block = self.block(label.trim(), line)?;
            if !self.defined.insert(block) {
                bail!("line {}: block `{}` defined twice", line, label.trim());
            }
            self.current = Some(block);
            self.terminated = false;
            return Ok(());
        }

        let (keyword, rest) = match text.find(char::is_whitespace) {
            Some(pos) => (&text[..pos], text[pos..].trim()),
            None => (text, ""),
        };

        match keyword {
            "exit" => {
                if !is_ident(rest) {
                    bail!("line {}: bad exit label `{}`", line, rest);
                }
                self.exit_label = Some((rest.to_owned(), line));
            }
            "phi" => {
                let block = self.current(line)?;
                if !self.body.blocks[block].stmts.is_empty() {
                    bail!("line {}: phi after a statement", line);
                }
                let var = self.var(rest, line)?;
                self.body.add_phi(block, var);
            }
            "br" => {
                let target = self.block(rest, line)?;
                self.terminate(Terminator::Br { target }, line)?;
            }
            "if" => {
                let parts = split_list(rest);
                if parts.len() != 3 {
                    bail!("line {}: expected `if cond, then, else`", line);
                }
                let cond = self.operand(parts[0], line)?;
                let if_true = self.block(parts[1], line)?;
                let if_false = self.block(parts[2], line)?;
                self.terminate(
                    Terminator::CondBr {
                        cond,
                        if_true,
                        if_false,
                    },
                    line,
                )?;
            }
            "switch" => {
                let (open, close) = match (rest.find('['), rest.find(']')) {
                    (Some(open), Some(close)) if open < close => (open, close),
                    _ => bail!("line {}: expected `switch value, [targets], default`", line),
                };
                let value = rest[..open].trim().trim_end_matches(',').trim();
                let default = rest[close + 1..].trim().trim_start_matches(',').trim();
                let value = self.operand(value, line)?;
                let mut targets = vec![];
                for label in split_list(&rest[open + 1..close]) {
                    targets.push(self.block(label, line)?);
                }
                let default = self.block(default, line)?;
                self.terminate(
                    Terminator::Select {
                        value,
                        targets,
                        default,
                    },
                    line,
                )?;
            }
            "return" => {
                let mut values = vec![];
                for name in split_list(rest) {
                    values.push(self.operand(name, line)?);
                }
                self.terminate(Terminator::Return { values }, line)?;
            }
            "unreachable" => {
                if !rest.is_empty() {
                    bail!("line {}: `unreachable` takes no operands", line);
                }
                self.terminate(Terminator::Unreachable, line)?;
            }
            _ => self.stmt(text, line)?,
        }
        Ok(())
    }

    fn stmt(&mut self, text: &str, line: usize) -> Result<()> {
        let block = self.current(line)?;
        let (lhs, rhs) = match text.find('=') {
            Some(pos) => (&text[..pos], text[pos + 1..].trim()),
            None => ("", text),
        };

        let mut stmt = Stmt::default();
        for name in split_list(lhs) {
            stmt.defs.push(self.operand(name, line)?);
        }
        let (op, args) = match rhs.find(char::is_whitespace) {
            Some(pos) => (&rhs[..pos], &rhs[pos..]),
            None => (rhs, ""),
        };
        if op.is_empty() || op.contains(',') || KEYWORDS.contains(&op) {
            bail!("line {}: bad operator `{}`", line, op);
        }
        stmt.op = op.to_owned();
        for arg in split_list(args) {
            match arg.parse::<i64>() {
                Ok(imm) => stmt.imms.push(imm),
                Err(_) => stmt.uses.push(self.operand(arg, line)?),
            }
        }
        self.body.push_stmt(block, stmt);
        Ok(())
    }

    fn finish(mut self) -> Result<FunctionBody> {
        if !self.entry_claimed {
            bail!("function `{}` has no blocks", self.body.name);
        }
        for (label, &block) in &self.labels {
            if !self.defined.contains(&block) {
                bail!(
                    "line {}: reference to undefined block `{}`",
                    self.first_ref[&block],
                    label
                );
            }
        }
        if let Some((label, line)) = &self.exit_label {
            match self.labels.get(label) {
                Some(&exit) => self.body.set_exit(exit),
                None => bail!("line {}: exit block `{}` is not defined", line, label),
            }
        }
        self.body.validate()?;
        log::debug!(
            "parsed {}: {} blocks, {} variables",
            self.body.name,
            self.body.blocks.len(),
            self.body.vars.len()
        );
        Ok(self.body)
    }
}

/// Non-blank lines with comments stripped, with 1-based line numbers.
fn lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines().enumerate().filter_map(|(index, raw)| {
        let text = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        }
        .trim();
        if text.is_empty() {
            None
        } else {
            Some((index + 1, text))
        }
    })
}

/// The labels each function defines, in definition order, one list
/// per function in the same order `parse_module` creates them.
fn label_definitions(text: &str) -> Vec<Vec<&str>> {
    let mut funcs: Vec<Vec<&str>> = vec![];
    for (_, text) in lines(text) {
        if text.starts_with("func ") {
            funcs.push(vec![]);
            continue;
        }
        if funcs.is_empty() {
            funcs.push(vec![]);
        }
        if let Some(label) = text.strip_suffix(':') {
            let label = label.trim();
            if let Some(labels) = funcs.last_mut() {
                if !labels.contains(&label) {
                    labels.push(label);
                }
            }
        }
    }
    funcs
}

/// Parse any number of functions, each introduced by `func NAME`. Text
/// before the first `func` line belongs to an implicit function named
/// `main`.
pub fn parse_module(text: &str) -> Result<Module> {
    let labels = label_definitions(text);
    let mut module = Module::default();
    let mut builder: Option<FuncBuilder> = None;
    let mut next_func = 0;
    let mut start = |name: &str| {
        let defs = labels.get(next_func).map(|defs| &defs[..]).unwrap_or(&[]);
        next_func += 1;
        FuncBuilder::new(name, defs)
    };

    for (line, text) in lines(text) {
        if let Some(name) = text.strip_prefix("func ") {
            let name = name.trim();
            if !is_ident(name) {
                bail!("line {}: bad function name `{}`", line, name);
            }
            if let Some(done) = builder.take() {
                module.funcs.push(done.finish()?);
            }
            builder = Some(start(name));
            continue;
        }

        if builder.is_none() {
            builder = Some(start("main"));
        }
        if let Some(builder) = builder.as_mut() {
            builder.line(text, line)?;
        }
    }

    if let Some(done) = builder.take() {
        module.funcs.push(done.finish()?);
    }
    Ok(module)
}

/// Parse text holding exactly one function.
pub fn parse_function(text: &str) -> Result<FunctionBody> {
    let module = parse_module(text)?;
    let mut funcs = module.funcs.into_vec();
    if funcs.len() != 1 {
        bail!("expected one function, found {}", funcs.len());
    }
    Ok(funcs.remove(0))
}
