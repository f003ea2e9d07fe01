//! SSA renaming (Cooper/Torczon, section 9.3.4).
//!
//! Walks the dominator tree keeping, for every source variable, a
//! stack of the versions visible at the current point: the top is the
//! version from the nearest dominating definition. Each definition
//! gets a fresh version from a single counter shared by all variables
//! (so `x_0, y_1, x_2` rather than `x_0, y_0, x_1`); versions are thus
//! dense indices usable as bit-vector positions. On the way back up,
//! each block pops what it pushed, so its definitions are never seen
//! by siblings.
//!
//! Phis must already be in place. They are treated as definitions at
//! the very top of their block, and their argument for the edge from
//! block `b` is filled in once `b`'s statements have been renamed.

use super::dom_pass::{dom_pass, DomtreePass};
use crate::cfg::Dominance;
use crate::entity::{EntityRef, PerEntity};
use crate::errors::{SsaError, UseSite};
use crate::ir::{Block, DefSite, FunctionBody, Operand, Var, Version, VersionDef};
use smallvec::SmallVec;
use std::collections::BTreeSet;

/// What to do with a read of a variable that has no dominating
/// definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UndefinedUse {
    /// Fail with `SsaError::UndefinedUse`.
    Error,
    /// Give every variable that is read anywhere an implicit
    /// definition at the root (a parameter or global, say). Implicit
    /// versions are numbered first, in variable order.
    ImplicitEntry,
}

impl Default for UndefinedUse {
    fn default() -> Self {
        UndefinedUse::Error
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenameStats {
    /// Versions assigned, implicit ones included. Versions are
    /// numbered from zero, so this is also the next free version.
    pub versions: usize,
    /// Implicit root definitions made under `UndefinedUse::ImplicitEntry`.
    pub implicit: usize,
    /// Phi arguments left undefined because no definition reaches the
    /// end of the corresponding predecessor.
    pub undef_phi_args: usize,
}

struct Renamer {
    policy: UndefinedUse,
    var_stacks: PerEntity<Var, SmallVec<[Version; 4]>>,
    undef_phi_args: usize,
}

impl Renamer {
    fn new(policy: UndefinedUse) -> Renamer {
        Renamer {
            policy,
            var_stacks: PerEntity::default(),
            undef_phi_args: 0,
        }
    }

    fn rename(&mut self, body: &mut FunctionBody, dom: &Dominance) -> Result<RenameStats, SsaError> {
        if body.is_renamed() {
            return Err(SsaError::AlreadyRenamed {
                func: body.name.clone(),
            });
        }
        debug_assert_eq!(dom.root(), body.entry, "renaming needs forward dominance");
        check_phi_arity(body)?;

        let implicit = match self.policy {
            UndefinedUse::Error => vec![],
            UndefinedUse::ImplicitEntry => self.define_implicit(body, dom),
        };

        dom_pass(body, dom, self)?;

        for var in implicit.iter().rev() {
            self.var_stacks[*var].pop();
        }
        debug_assert!(self.stacks_empty());

        let stats = RenameStats {
            versions: body.versions.len(),
            implicit: implicit.len(),
            undef_phi_args: self.undef_phi_args,
        };
        log::debug!(
            "rename {}: {} versions ({} implicit), {} undefined phi args",
            body.name,
            stats.versions,
            stats.implicit,
            stats.undef_phi_args
        );
        Ok(stats)
    }

    /// Define every variable read in a reachable block at the root.
    fn define_implicit(&mut self, body: &mut FunctionBody, dom: &Dominance) -> Vec<Var> {
        let mut read = BTreeSet::new();
        for &block in dom.rpo() {
            let def = &body.blocks[block];
            for phi in &def.phis {
                read.insert(phi.def.var);
            }
            def.visit_uses(|op| {
                read.insert(op.var);
            });
        }

        let root = dom.root();
        let vars = read.into_iter().collect::<Vec<_>>();
        for &var in &vars {
            self.new_version(body, var, root, DefSite::Implicit);
        }
        vars
    }

    fn new_version(&mut self, body: &mut FunctionBody, var: Var, block: Block, site: DefSite) -> Version {
        let version = body.versions.push(VersionDef { var, block, site });
        log::trace!(
            "rename: {} defines {}_{} at {:?}",
            block,
            body.var_name(var),
            version.index(),
            site
        );
        self.var_stacks[var].push(version);
        version
    }

    fn read(&self, var: Var) -> Option<Version> {
        self.var_stacks[var].last().copied()
    }

    fn lookup(
        &self,
        body: &FunctionBody,
        block: Block,
        site: UseSite,
        var: Var,
    ) -> Result<Version, SsaError> {
        self.read(var).ok_or_else(|| SsaError::UndefinedUse {
            func: body.name.clone(),
            block,
            site,
            var: body.var_name(var).to_owned(),
        })
    }

    fn stacks_empty(&self) -> bool {
        self.var_stacks.values().all(|stack| stack.is_empty())
    }

    fn debug_var_stacks(&self, body: &FunctionBody, block: Block) {
        if !log::log_enabled!(log::Level::Trace) {
            return;
        }
        log::trace!("rename: stacks after {}:", block);
        for (var, stack) in self.var_stacks.entries() {
            if !stack.is_empty() {
                let versions = stack
                    .iter()
                    .map(|version| format!("{}", version.index()))
                    .collect::<Vec<_>>();
                log::trace!("  {}: [{}]", body.var_name(var), versions.join(", "));
            }
        }
    }
}

impl DomtreePass for Renamer {
    type Error = SsaError;

    fn enter(&mut self, block: Block, body: &mut FunctionBody) -> Result<(), SsaError> {
        for i in 0..body.blocks[block].phis.len() {
            let var = body.blocks[block].phis[i].def.var;
            let version = self.new_version(body, var, block, DefSite::Phi(i));
            body.blocks[block].phis[i].def.version = Some(version);
        }

        for i in 0..body.blocks[block].stmts.len() {
            for j in 0..body.blocks[block].stmts[i].uses.len() {
                let var = body.blocks[block].stmts[i].uses[j].var;
                let version = self.lookup(body, block, UseSite::Stmt(i), var)?;
                body.blocks[block].stmts[i].uses[j].version = Some(version);
            }
            for j in 0..body.blocks[block].stmts[i].defs.len() {
                let var = body.blocks[block].stmts[i].defs[j].var;
                let version = self.new_version(body, var, block, DefSite::Stmt(i, j));
                body.blocks[block].stmts[i].defs[j].version = Some(version);
            }
        }

        let mut terminator = std::mem::take(&mut body.blocks[block].terminator);
        let mut result = Ok(());
        {
            let body: &FunctionBody = body;
            terminator.update_uses(|op| {
                if result.is_ok() {
                    match self.lookup(body, block, UseSite::Terminator, op.var) {
                        Ok(version) => op.version = Some(version),
                        Err(e) => result = Err(e),
                    }
                }
            });
        }
        body.blocks[block].terminator = terminator;
        result?;

        // Fill in this edge's slot of every phi in each successor.
        let edges = body.blocks[block]
            .succs
            .iter()
            .copied()
            .zip(body.blocks[block].pos_in_succ_pred.iter().copied())
            .collect::<SmallVec<[(Block, usize); 4]>>();
        for (succ, slot) in edges {
            for phi in &mut body.blocks[succ].phis {
                let arg = self.read(phi.def.var);
                if arg.is_none() {
                    log::trace!(
                        "rename: phi for {} in {} undefined along edge from {}",
                        phi.def.var,
                        succ,
                        block
                    );
                    self.undef_phi_args += 1;
                }
                phi.args[slot] = arg;
            }
        }

        self.debug_var_stacks(body, block);
        Ok(())
    }

    fn leave(&mut self, block: Block, body: &mut FunctionBody) -> Result<(), SsaError> {
        let defs = body.blocks[block]
            .defs()
            .copied()
            .collect::<SmallVec<[Operand; 8]>>();
        for def in defs.iter().rev() {
            let popped = self.var_stacks[def.var].pop();
            debug_assert_eq!(popped, def.version);
        }
        Ok(())
    }
}

fn check_phi_arity(body: &FunctionBody) -> Result<(), SsaError> {
    for (block, def) in body.blocks.entries() {
        for phi in &def.phis {
            if phi.args.len() != def.preds.len() {
                return Err(SsaError::MalformedPhi {
                    func: body.name.clone(),
                    block,
                    var: body.var_name(phi.def.var).to_owned(),
                    args: phi.args.len(),
                    preds: def.preds.len(),
                });
            }
        }
    }
    Ok(())
}

/// Rename every variable definition and use in the blocks reachable
/// from the root of `dom` (which must be the forward dominance of
/// `body`), giving each definition its own version and each use the
/// version of its nearest dominating definition.
///
/// Every phi must have one argument slot per predecessor of its block;
/// a phi that does not is reported as `SsaError::MalformedPhi`. On error
/// the body is returned to its unrenamed state.
pub fn run(
    body: &mut FunctionBody,
    dom: &Dominance,
    policy: UndefinedUse,
) -> Result<RenameStats, SsaError> {
    let mut renamer = Renamer::new(policy);
    let result = renamer.rename(body, dom);
    if let Err(e) = &result {
        log::debug!("rename {}: {}", body.name, e);
        if !matches!(e, SsaError::AlreadyRenamed { .. }) {
            strip_versions(body);
        }
    }
    result
}

/// Drop all SSA versions, returning the body to its pre-renaming form.
pub fn strip_versions(body: &mut FunctionBody) {
    for block in body.blocks.values_mut() {
        for phi in &mut block.phis {
            phi.def.version = None;
            for arg in &mut phi.args {
                *arg = None;
            }
        }
        for stmt in &mut block.stmts {
            for op in stmt.defs.iter_mut().chain(stmt.uses.iter_mut()) {
                op.version = None;
            }
        }
        block.terminator.update_uses(|op| op.version = None);
    }
    body.versions.clear();
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::frontend::parse_function;
    use crate::ir::Terminator;

    fn v(i: usize) -> Option<Version> {
        Some(Version::new(i))
    }

    fn rename(body: &mut FunctionBody, policy: UndefinedUse) -> Result<RenameStats, SsaError> {
        let dom = Dominance::forward(body);
        let mut renamer = Renamer::new(policy);
        let result = renamer.rename(body, &dom);
        assert!(renamer.stacks_empty() || result.is_err());
        result
    }

    /// A defines x and branches on it; B uses it; sibling C redefines
    /// it; D, dominated by A alone, uses it again.
    fn siblings() -> (FunctionBody, [Block; 4]) {
        let mut body = FunctionBody::new("siblings");
        let a = body.entry;
        let b = body.add_block();
        let c = body.add_block();
        let d = body.add_block();
        let x = body.intern_var("x");
        body.add_stmt(a, "def", &[x], &[]);
        body.set_terminator(
            a,
            Terminator::CondBr {
                cond: Operand::new(x),
                if_true: b,
                if_false: c,
            },
        );
        body.add_stmt(b, "use", &[], &[x]);
        body.set_terminator(b, Terminator::Br { target: d });
        body.add_stmt(c, "def", &[x], &[]);
        body.set_terminator(c, Terminator::Br { target: d });
        body.add_stmt(d, "use", &[], &[x]);
        body.set_terminator(
            d,
            Terminator::Return {
                values: vec![Operand::new(x)],
            },
        );
        (body, [a, b, c, d])
    }

    #[test]
    fn sibling_definitions_stay_in_their_subtree() {
        let _ = env_logger::try_init();
        let (mut body, [a, b, c, d]) = siblings();
        let stats = rename(&mut body, UndefinedUse::Error).unwrap();

        assert_eq!(body.blocks[a].stmts[0].defs[0].version, v(0));
        assert_eq!(body.blocks[b].stmts[0].uses[0].version, v(0));
        assert_eq!(body.blocks[c].stmts[0].defs[0].version, v(1));
        assert_eq!(body.blocks[d].stmts[0].uses[0].version, v(0));
        match &body.blocks[d].terminator {
            Terminator::Return { values } => assert_eq!(values[0].version, v(0)),
            other => panic!("unexpected terminator {:?}", other),
        }
        match &body.blocks[a].terminator {
            Terminator::CondBr { cond, .. } => assert_eq!(cond.version, v(0)),
            other => panic!("unexpected terminator {:?}", other),
        }

        assert_eq!(stats.versions, 2);
        assert_eq!(stats.implicit, 0);
        assert_eq!(
            body.versions[Version::new(1)],
            VersionDef {
                var: body.lookup_var("x").unwrap(),
                block: c,
                site: DefSite::Stmt(0, 0),
            }
        );
    }

    #[test]
    fn phi_args_follow_edges() {
        let (mut body, [_, _, _, d]) = siblings();
        let x = body.lookup_var("x").unwrap();
        body.add_phi(d, x);
        rename(&mut body, UndefinedUse::Error).unwrap();

        // preds of D are [B, C]: B sees A's x, C its own.
        let phi = &body.blocks[d].phis[0];
        assert_eq!(&phi.args[..], &[v(0), v(1)]);
        assert_eq!(phi.def.version, v(2));
        assert_eq!(body.blocks[d].stmts[0].uses[0].version, v(2));
    }

    #[test]
    fn loop_phi_sees_back_edge_version() {
        let mut body = parse_function(
            "
            func count
            entry:
              i = zero
              br head
            head:
              phi i
              c = lt i, 10
              if c, body, out
            body:
              i = add i, 1
              br head
            out:
              return i
            ",
        )
        .unwrap();
        let stats = rename(&mut body, UndefinedUse::Error).unwrap();
        assert_eq!(stats.versions, 4);

        let head = body.blocks[body.entry].succs[0];
        let phi = &body.blocks[head].phis[0];
        // preds of head: entry (i_0), then body (i_3: after phi i_1, c_2).
        assert_eq!(&phi.args[..], &[v(0), v(3)]);
        assert_eq!(phi.def.version, v(1));
        let text = body.display("").to_string();
        assert!(text.contains("i_3 = add i_1, 1"), "{}", text);
        assert!(text.contains("return i_1"), "{}", text);
    }

    #[test]
    fn versions_are_unique_and_counted() {
        let mut body = parse_function(
            "
            func f
            b0:
              x, y = pair
              x = add x, y
              if x, b1, b2
            b1:
              y = neg y
              x = add x, y
              br b3
            b2:
              x = neg x
              br b3
            b3:
              phi x
              phi y
              return x, y
            ",
        )
        .unwrap();
        let stats = rename(&mut body, UndefinedUse::Error).unwrap();

        let mut seen = BTreeSet::new();
        let mut n_defs = 0;
        for (_, def) in body.blocks.entries() {
            for op in def.defs() {
                n_defs += 1;
                assert!(seen.insert(op.version.unwrap()));
            }
        }
        assert_eq!(n_defs, 8);
        assert_eq!(stats.versions, n_defs);
        assert_eq!(body.versions.len(), n_defs);
        // y is undefined along no edge: both preds of b3 see some y.
        assert_eq!(stats.undef_phi_args, 0);
    }

    /// The version of `var` visible just before statement `pos` of
    /// `block` (`None` meaning at the terminator), found by scanning
    /// backwards through the block and then up the dominator tree.
    fn nearest_def(
        body: &FunctionBody,
        dom: &Dominance,
        var: Var,
        block: Block,
        pos: Option<usize>,
    ) -> Option<Version> {
        let def = &body.blocks[block];
        let end = pos.unwrap_or(def.stmts.len());
        for stmt in def.stmts[..end].iter().rev() {
            if let Some(op) = stmt.defs.iter().rev().find(|op| op.var == var) {
                return op.version;
            }
        }
        if let Some(phi) = def.phis.iter().rev().find(|phi| phi.def.var == var) {
            return phi.def.version;
        }
        match dom.idom(block) {
            Some(parent) => nearest_def(body, dom, var, parent, None),
            None => body
                .versions
                .entries()
                .find(|(_, def)| def.var == var && def.site == DefSite::Implicit)
                .map(|(version, _)| version),
        }
    }

    #[test]
    fn uses_see_nearest_dominating_definition() {
        let text = "
            func f
            b0:
              x, y = pair
              if x, b1, b4
            b1:
              phi x
              x = add x, y
              y = add x, 1
              if y, b2, b3
            b2:
              x = neg x
              br b1
            b3:
              z = add x, y
              br b4
            b4:
              phi x
              phi y
              return x, y, z
            ";
        for &policy in &[UndefinedUse::Error, UndefinedUse::ImplicitEntry] {
            let mut body = parse_function(text).unwrap();
            let dom = Dominance::forward(&body);
            if run(&mut body, &dom, policy).is_err() {
                // `z` is undefined along b0 -> b4 and is read in b4.
                assert_eq!(policy, UndefinedUse::Error);
                continue;
            }
            for &block in dom.rpo() {
                let def = &body.blocks[block];
                for (i, stmt) in def.stmts.iter().enumerate() {
                    for op in &stmt.uses {
                        assert_eq!(op.version, nearest_def(&body, &dom, op.var, block, Some(i)));
                    }
                }
                def.terminator.visit_uses(|op| {
                    assert_eq!(op.version, nearest_def(&body, &dom, op.var, block, None));
                });
                for (slot, &pred) in def.preds.iter().enumerate() {
                    for phi in &def.phis {
                        assert_eq!(
                            phi.args[slot],
                            nearest_def(&body, &dom, phi.def.var, pred, None)
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn undefined_use_is_an_error() {
        let mut body = parse_function(
            "
            func f
            b0:
              if c, b1, b2
            b1:
              x = one
              br b2
            b2:
              y = copy x
              return y
            ",
        )
        .unwrap();
        let dom = Dominance::forward(&body);
        let err = run(&mut body, &dom, UndefinedUse::Error).unwrap_err();
        assert_eq!(
            err,
            SsaError::UndefinedUse {
                func: "f".to_string(),
                block: body.entry,
                site: UseSite::Terminator,
                var: "c".to_string(),
            }
        );
        // Nothing is left half-renamed.
        assert!(!body.is_renamed());
        assert!(body.blocks.values().all(|def| def.defs().all(|op| op.version.is_none())));
    }

    #[test]
    fn undefined_use_reports_statement() {
        let mut body = parse_function(
            "
            func f
            b0:
              c = one
              if c, b1, b2
            b1:
              x = one
              br b2
            b2:
              y = copy x
              return y
            ",
        )
        .unwrap();
        let err = rename(&mut body, UndefinedUse::Error).unwrap_err();
        match err {
            SsaError::UndefinedUse { site, var, .. } => {
                assert_eq!(site, UseSite::Stmt(0));
                assert_eq!(var, "x");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn implicit_entry_definitions() {
        let mut body = parse_function(
            "
            func f
            b0:
              if c, b1, b2
            b1:
              x = one
              br b2
            b2:
              phi x
              y = copy x
              return y
            ",
        )
        .unwrap();
        let stats = rename(&mut body, UndefinedUse::ImplicitEntry).unwrap();

        // c, x and y are all read somewhere; each gets an implicit
        // version, in variable order (c, x, y).
        assert_eq!(stats.implicit, 3);
        for i in 0..3 {
            assert_eq!(body.versions[Version::new(i)].site, DefSite::Implicit);
            assert_eq!(body.versions[Version::new(i)].block, body.entry);
        }
        let b2 = body.blocks[body.entry].succs[1];
        let phi = &body.blocks[b2].phis[0];
        // preds of b2: b0 (implicit x_1), b1 (x_3).
        assert_eq!(&phi.args[..], &[v(1), v(3)]);
        assert_eq!(stats.versions, 3 + 3);
        assert_eq!(stats.undef_phi_args, 0);
    }

    #[test]
    fn undefined_phi_args_are_not_errors() {
        let mut body = parse_function(
            "
            func f
            b0:
              c = one
              if c, b1, b2
            b1:
              x = one
              br b2
            b2:
              phi x
              return x
            ",
        )
        .unwrap();
        let stats = rename(&mut body, UndefinedUse::Error).unwrap();
        let b2 = body.blocks[body.entry].succs[1];
        assert_eq!(&body.blocks[b2].phis[0].args[..], &[None, v(1)]);
        assert_eq!(stats.undef_phi_args, 1);
    }

    #[test]
    fn unreachable_blocks_are_left_alone() {
        let mut body = parse_function(
            "
            func f
            b0:
              x = one
              return x
            dead:
              y = copy nothing
              br b0
            ",
        )
        .unwrap();
        rename(&mut body, UndefinedUse::Error).unwrap();
        let dead = Block::new(1);
        assert_eq!(body.blocks[dead].stmts[0].defs[0].version, None);
        assert_eq!(body.blocks[dead].stmts[0].uses[0].version, None);
    }

    #[test]
    fn rejects_double_renaming() {
        let (mut body, _) = siblings();
        let dom = Dominance::forward(&body);
        run(&mut body, &dom, UndefinedUse::Error).unwrap();
        let before = body.versions.len();
        assert_eq!(
            run(&mut body, &dom, UndefinedUse::Error).unwrap_err(),
            SsaError::AlreadyRenamed {
                func: "siblings".to_string()
            }
        );
        assert_eq!(body.versions.len(), before);

        strip_versions(&mut body);
        assert!(!body.is_renamed());
        run(&mut body, &dom, UndefinedUse::Error).unwrap();
        assert_eq!(body.versions.len(), before);
    }

    #[test]
    fn phi_arity_mismatch_is_an_error() {
        let mut body = parse_function(
            "
            func f
            b0:
              x = one
              if x, b1, b2
            b1:
              br b2
            b2:
              phi x
              return x
            ",
        )
        .unwrap();
        let join = Block::new(2);
        body.blocks[join].phis[0].args.pop();
        let dom = Dominance::forward(&body);
        assert_eq!(
            run(&mut body, &dom, UndefinedUse::Error).unwrap_err(),
            SsaError::MalformedPhi {
                func: "f".to_string(),
                block: join,
                var: "x".to_string(),
                args: 1,
                preds: 2,
            }
        );
        assert!(!body.is_renamed());
    }

    #[test]
    fn deep_chain_does_not_recurse() {
        let mut body = FunctionBody::new("chain");
        let x = body.intern_var("x");
        let mut block = body.entry;
        body.add_stmt(block, "def", &[x], &[]);
        for _ in 0..20_000 {
            let next = body.add_block();
            body.add_stmt(next, "def", &[x], &[x]);
            body.set_terminator(block, Terminator::Br { target: next });
            block = next;
        }
        body.set_terminator(block, Terminator::Return { values: vec![] });
        let stats = rename(&mut body, UndefinedUse::Error).unwrap();
        assert_eq!(stats.versions, 20_001);
        assert_eq!(body.blocks[block].stmts[0].uses[0].version, v(19_999));
    }
}
