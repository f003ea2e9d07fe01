use super::{Block, FunctionBodyDisplay, Var, Version};
use crate::entity::{EntityRef, EntityVec};
use anyhow::{bail, ensure, Result};
use fxhash::FxHashMap;
use smallvec::{smallvec, SmallVec};

/// A reference to a source variable, optionally carrying the SSA
/// version assigned to it by renaming.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Operand {
    pub var: Var,
    pub version: Option<Version>,
}

impl Operand {
    pub fn new(var: Var) -> Operand {
        Operand { var, version: None }
    }
}

/// A statement. The operator is opaque to this crate; only its
/// definitions and uses matter.
#[derive(Clone, Debug, Default)]
pub struct Stmt {
    pub op: String,
    /// Variables written, in order.
    pub defs: SmallVec<[Operand; 2]>,
    /// Variables read, in order. All uses are read before any def is
    /// written, so `x = add x, 1` reads the previous `x`.
    pub uses: SmallVec<[Operand; 4]>,
    /// Immediate operands.
    pub imms: SmallVec<[i64; 2]>,
}

/// A merge of the values of one variable along each incoming edge.
#[derive(Clone, Debug)]
pub struct Phi {
    pub def: Operand,
    /// One slot per predecessor: `args[i]` is the version flowing in
    /// from `preds[i]`. `None` means undefined along that edge (or not
    /// yet renamed).
    pub args: SmallVec<[Option<Version>; 4]>,
}

/// Where a version was defined within its block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DefSite {
    /// Synthesized at the root for a variable read without any
    /// dominating definition.
    Implicit,
    /// The `def` of the phi at this index.
    Phi(usize),
    /// Definition `.1` of the statement at index `.0`.
    Stmt(usize, usize),
}

/// Definition record for one SSA version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VersionDef {
    pub var: Var,
    pub block: Block,
    pub site: DefSite,
}

#[derive(Clone, Debug, Default)]
pub struct FunctionBody {
    pub name: String,
    /// Entry block.
    pub entry: Block,
    /// Designated exit block, used as the root of reverse
    /// dominance. `Block::invalid()` if there is none.
    pub exit: Block,
    /// Block bodies.
    pub blocks: EntityVec<Block, BlockDef>,
    /// Original variable names, interned.
    pub vars: EntityVec<Var, String>,
    var_dedup: FxHashMap<String, Var>,
    /// Definition site of each SSA version. Empty until renamed; the
    /// next version number is always `versions.len()`.
    pub versions: EntityVec<Version, VersionDef>,
}

impl FunctionBody {
    pub fn new(name: &str) -> FunctionBody {
        let mut blocks = EntityVec::default();
        let entry = blocks.push(BlockDef::default());
        FunctionBody {
            name: name.to_owned(),
            entry,
            exit: Block::invalid(),
            blocks,
            vars: EntityVec::default(),
            var_dedup: FxHashMap::default(),
            versions: EntityVec::default(),
        }
    }

    pub fn add_block(&mut self) -> Block {
        let id = self.blocks.push(BlockDef::default());
        log::trace!("add_block: block {}", id);
        id
    }

    pub fn set_exit(&mut self, block: Block) {
        self.exit = block;
    }

    pub fn intern_var(&mut self, name: &str) -> Var {
        if let Some(&var) = self.var_dedup.get(name) {
            return var;
        }
        let var = self.vars.push(name.to_owned());
        self.var_dedup.insert(name.to_owned(), var);
        var
    }

    pub fn lookup_var(&self, name: &str) -> Option<Var> {
        self.var_dedup.get(name).copied()
    }

    pub fn var_name(&self, var: Var) -> &str {
        &self.vars[var][..]
    }

    pub fn add_phi(&mut self, block: Block, var: Var) -> usize {
        let n_preds = self.blocks[block].preds.len();
        let phis = &mut self.blocks[block].phis;
        phis.push(Phi {
            def: Operand::new(var),
            args: smallvec![None; n_preds],
        });
        phis.len() - 1
    }

    pub fn add_stmt(&mut self, block: Block, op: &str, defs: &[Var], uses: &[Var]) -> usize {
        self.push_stmt(
            block,
            Stmt {
                op: op.to_owned(),
                defs: defs.iter().map(|&var| Operand::new(var)).collect(),
                uses: uses.iter().map(|&var| Operand::new(var)).collect(),
                imms: smallvec![],
            },
        )
    }

    pub fn push_stmt(&mut self, block: Block, stmt: Stmt) -> usize {
        let stmts = &mut self.blocks[block].stmts;
        stmts.push(stmt);
        stmts.len() - 1
    }

    fn add_edge(&mut self, from: Block, to: Block) {
        let succ_pos = self.blocks[from].succs.len();
        let pred_pos = self.blocks[to].preds.len();
        self.blocks[from].succs.push(to);
        self.blocks[to].preds.push(from);
        self.blocks[from].pos_in_succ_pred.push(pred_pos);
        self.blocks[to].pos_in_pred_succ.push(succ_pos);
        for phi in &mut self.blocks[to].phis {
            phi.args.push(None);
        }
        log::trace!("add_edge: from {} to {}", from, to);
    }

    /// Set a block's terminator and add its outgoing edges. Replacing
    /// a terminator that already had successors rebuilds all edges.
    pub fn set_terminator(&mut self, block: Block, terminator: Terminator) {
        let had_succs = !self.blocks[block].succs.is_empty();
        let mut succs: SmallVec<[Block; 4]> = smallvec![];
        terminator.visit_successors(|succ| succs.push(succ));
        self.blocks[block].terminator = terminator;
        if had_succs {
            self.recompute_edges();
        } else {
            for succ in succs {
                self.add_edge(block, succ);
            }
        }
    }

    /// Rebuild pred/succ lists from terminators. Phi argument lists
    /// are resized to match and reset to undefined, since slot order
    /// follows pred order.
    pub fn recompute_edges(&mut self) {
        for block in self.blocks.values_mut() {
            block.preds.clear();
            block.pos_in_pred_succ.clear();
            block.succs.clear();
            block.pos_in_succ_pred.clear();
            for phi in &mut block.phis {
                phi.args.clear();
            }
        }

        for block in 0..self.blocks.len() {
            let block = Block::new(block);
            let mut succs: SmallVec<[Block; 4]> = smallvec![];
            self.blocks[block]
                .terminator
                .visit_successors(|succ| succs.push(succ));
            for succ in succs {
                self.add_edge(block, succ);
            }
        }
    }

    /// Whether this body has been through renaming.
    pub fn is_renamed(&self) -> bool {
        !self.versions.is_empty()
    }

    /// Structural sanity checks: indices in range, edge lists
    /// consistent with terminators, one phi slot per predecessor.
    pub fn validate(&self) -> Result<()> {
        let n_blocks = self.blocks.len();
        ensure!(
            self.entry.is_valid() && self.entry.index() < n_blocks,
            "{}: entry block {} out of range",
            self.name,
            self.entry
        );
        if self.exit.is_valid() {
            ensure!(
                self.exit.index() < n_blocks,
                "{}: exit block {} out of range",
                self.name,
                self.exit
            );
        }

        let check_var = |block: Block, op: &Operand| -> Result<()> {
            if op.var.index() >= self.vars.len() {
                bail!(
                    "{}: block {} refers to unknown variable {}",
                    self.name,
                    block,
                    op.var
                );
            }
            Ok(())
        };

        for (block, def) in self.blocks.entries() {
            let mut targets: SmallVec<[Block; 4]> = smallvec![];
            def.terminator.visit_successors(|succ| targets.push(succ));
            for &succ in &targets {
                ensure!(
                    succ.is_valid() && succ.index() < n_blocks,
                    "{}: block {} branches to nonexistent block {}",
                    self.name,
                    block,
                    succ
                );
            }
            ensure!(
                &targets[..] == &def.succs[..],
                "{}: succs of block {} are stale ({:?} vs terminator {:?})",
                self.name,
                block,
                def.succs,
                targets
            );

            for (i, (&succ, &pos)) in def.succs.iter().zip(def.pos_in_succ_pred.iter()).enumerate() {
                let succ_def = &self.blocks[succ];
                ensure!(
                    succ_def.preds.get(pos) == Some(&block)
                        && succ_def.pos_in_pred_succ.get(pos) == Some(&i),
                    "{}: edge {} -> {} has inconsistent positions",
                    self.name,
                    block,
                    succ
                );
            }

            for (i, phi) in def.phis.iter().enumerate() {
                check_var(block, &phi.def)?;
                ensure!(
                    phi.args.len() == def.preds.len(),
                    "{}: phi {} in block {} has {} args but the block has {} preds",
                    self.name,
                    i,
                    block,
                    phi.args.len(),
                    def.preds.len()
                );
            }
            for stmt in &def.stmts {
                for op in stmt.defs.iter().chain(stmt.uses.iter()) {
                    check_var(block, op)?;
                }
            }
            let mut result = Ok(());
            def.terminator.visit_uses(|op| {
                if result.is_ok() {
                    result = check_var(block, op);
                }
            });
            result?;
        }

        Ok(())
    }

    pub fn display<'a>(&'a self, indent: &'a str) -> FunctionBodyDisplay<'a> {
        FunctionBodyDisplay(self, indent)
    }
}

#[derive(Clone, Debug, Default)]
pub struct BlockDef {
    /// Phis, evaluated on entry to the block, before any statement.
    pub phis: Vec<Phi>,
    /// Statements in program order.
    pub stmts: Vec<Stmt>,
    /// Terminator: branch or return.
    pub terminator: Terminator,
    /// Successor blocks.
    pub succs: SmallVec<[Block; 4]>,
    /// For each successor block, our index in its `preds` array.
    pub pos_in_succ_pred: SmallVec<[usize; 4]>,
    /// Predecessor blocks.
    pub preds: SmallVec<[Block; 4]>,
    /// For each predecessor block, our index in its `succs` array.
    pub pos_in_pred_succ: SmallVec<[usize; 4]>,
}

impl BlockDef {
    /// All definitions in the block, in the order renaming visits them:
    /// phis first, then statement defs in program order.
    pub fn defs<'a>(&'a self) -> impl Iterator<Item = &'a Operand> + 'a {
        self.phis
            .iter()
            .map(|phi| &phi.def)
            .chain(self.stmts.iter().flat_map(|stmt| stmt.defs.iter()))
    }

    /// All non-phi uses in the block: statement uses, then terminator
    /// uses.
    pub fn visit_uses<F: FnMut(&Operand)>(&self, mut f: F) {
        for stmt in &self.stmts {
            for op in &stmt.uses {
                f(op);
            }
        }
        self.terminator.visit_uses(f);
    }
}

#[derive(Clone, Debug)]
pub enum Terminator {
    Br {
        target: Block,
    },
    CondBr {
        cond: Operand,
        if_true: Block,
        if_false: Block,
    },
    Select {
        value: Operand,
        targets: Vec<Block>,
        default: Block,
    },
    Return {
        values: Vec<Operand>,
    },
    Unreachable,
    None,
}

impl std::default::Default for Terminator {
    fn default() -> Self {
        Terminator::None
    }
}

impl Terminator {
    /// Visit successors in edge order: the order in which edges are
    /// added to `succs`, and hence the order of predecessor slots.
    pub fn visit_successors<F: FnMut(Block)>(&self, mut f: F) {
        match self {
            Terminator::Br { target } => f(*target),
            Terminator::CondBr {
                if_true, if_false, ..
            } => {
                f(*if_true);
                f(*if_false);
            }
            Terminator::Select {
                targets, default, ..
            } => {
                for &target in targets {
                    f(target);
                }
                f(*default);
            }
            Terminator::Return { .. } | Terminator::Unreachable | Terminator::None => {}
        }
    }

    pub fn visit_uses<F: FnMut(&Operand)>(&self, mut f: F) {
        match self {
            Terminator::CondBr { cond, .. } => f(cond),
            Terminator::Select { value, .. } => f(value),
            Terminator::Return { values } => {
                for value in values {
                    f(value);
                }
            }
            _ => {}
        }
    }

    pub fn update_uses<F: FnMut(&mut Operand)>(&mut self, mut f: F) {
        match self {
            Terminator::CondBr { cond, .. } => f(cond),
            Terminator::Select { value, .. } => f(value),
            Terminator::Return { values } => {
                for value in values {
                    f(value);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn edges_follow_terminators() {
        let mut body = FunctionBody::new("f");
        let b0 = body.entry;
        let b1 = body.add_block();
        let b2 = body.add_block();
        let x = body.intern_var("x");
        body.add_phi(b2, x);
        body.set_terminator(
            b0,
            Terminator::CondBr {
                cond: Operand::new(x),
                if_true: b1,
                if_false: b2,
            },
        );
        body.set_terminator(b1, Terminator::Br { target: b2 });
        body.set_terminator(b2, Terminator::Return { values: vec![] });

        assert_eq!(&body.blocks[b0].succs[..], &[b1, b2]);
        assert_eq!(&body.blocks[b2].preds[..], &[b0, b1]);
        assert_eq!(body.blocks[b2].phis[0].args.len(), 2);
        body.validate().unwrap();

        // Retargeting rebuilds every edge list.
        body.set_terminator(b0, Terminator::Br { target: b2 });
        assert_eq!(&body.blocks[b1].preds[..], &[] as &[Block]);
        assert_eq!(&body.blocks[b2].preds[..], &[b0, b1]);
        body.validate().unwrap();
    }

    #[test]
    fn interning_is_stable() {
        let mut body = FunctionBody::new("f");
        let x = body.intern_var("x");
        let y = body.intern_var("y");
        assert_ne!(x, y);
        assert_eq!(body.intern_var("x"), x);
        assert_eq!(body.var_name(y), "y");
        assert_eq!(body.lookup_var("z"), None);
    }
}
