//! SSA validation.

use crate::cfg::Dominance;
use crate::entity::*;
use crate::ir::*;
use anyhow::{bail, ensure, Result};

/// Is a definition at `def` visible to a use in `block` just before
/// statement `pos` (or at the terminator, for `None`)?
fn def_reaches(dom: &Dominance, def: &VersionDef, block: Block, pos: Option<usize>) -> bool {
    if def.block != block {
        return dom.strictly_dominates(def.block, block);
    }
    match (def.site, pos) {
        (DefSite::Implicit, _) | (DefSite::Phi(_), _) => true,
        (DefSite::Stmt(..), None) => true,
        (DefSite::Stmt(stmt, _), Some(pos)) => stmt < pos,
    }
}

fn version_of<'a>(
    body: &'a FunctionBody,
    version: Option<Version>,
    var: Var,
    what: &str,
) -> Result<(Version, &'a VersionDef)> {
    let name = &body.name;
    let version = match version {
        Some(version) => version,
        None => bail!("{}: {} of `{}` has no version", name, what, body.var_name(var)),
    };
    let def = match body.versions.get(version) {
        Some(def) => def,
        None => bail!("{}: {} refers to unknown version {}", name, what, version),
    };
    ensure!(
        def.var == var,
        "{}: {} of `{}` has version {} of `{}`",
        name,
        what,
        body.var_name(var),
        version,
        body.var_name(def.var)
    );
    Ok((version, def))
}

/// Check that `body` is in valid SSA form over the blocks reachable
/// in `dom` (its forward dominance):
///
/// - every definition carries a version, and each version is defined
///   exactly once, at the site its `VersionDef` records;
/// - every use carries a version of its own variable, whose
///   definition dominates the use;
/// - each phi argument is a version of the phi's variable whose
///   definition reaches the end of the corresponding predecessor.
///
/// Unreachable blocks are not renamed and are not checked.
pub fn validate(body: &FunctionBody, dom: &Dominance) -> Result<()> {
    let name = &body.name;
    let mut seen: PerEntity<Version, bool> = PerEntity::default();

    for (version, def) in body.versions.entries() {
        if def.site == DefSite::Implicit {
            ensure!(
                def.block == dom.root(),
                "{}: implicit version {} not at the root",
                name,
                version
            );
            seen[version] = true;
        }
    }

    // Definitions.
    for &block in dom.rpo() {
        let data = &body.blocks[block];
        let sites = data
            .phis
            .iter()
            .enumerate()
            .map(|(i, phi)| (phi.def, DefSite::Phi(i)))
            .chain(data.stmts.iter().enumerate().flat_map(|(i, stmt)| {
                stmt.defs
                    .iter()
                    .enumerate()
                    .map(move |(j, &op)| (op, DefSite::Stmt(i, j)))
            }));
        for (op, site) in sites {
            let (version, def) = version_of(body, op.version, op.var, "definition")?;
            ensure!(
                def.block == block && def.site == site,
                "{}: version {} defined at {} {:?} but recorded at {} {:?}",
                name,
                version,
                block,
                site,
                def.block,
                def.site
            );
            ensure!(!seen[version], "{}: version {} defined twice", name, version);
            seen[version] = true;
        }
    }
    for version in body.versions.iter() {
        ensure!(seen[version], "{}: version {} is never defined", name, version);
    }

    // Uses.
    for &block in dom.rpo() {
        let data = &body.blocks[block];
        for (i, stmt) in data.stmts.iter().enumerate() {
            for op in &stmt.uses {
                let (_, def) = version_of(body, op.version, op.var, "use")?;
                ensure!(
                    def_reaches(dom, def, block, Some(i)),
                    "{}: use of {} in {} stmt {} is not dominated by its definition in {}",
                    name,
                    body.var_name(op.var),
                    block,
                    i,
                    def.block
                );
            }
        }

        let mut result = Ok(());
        data.terminator.visit_uses(|op| {
            if result.is_err() {
                return;
            }
            result = version_of(body, op.version, op.var, "use").and_then(|(_, def)| {
                ensure!(
                    def_reaches(dom, def, block, None),
                    "{}: use of {} in {} terminator is not dominated by its definition in {}",
                    name,
                    body.var_name(op.var),
                    block,
                    def.block
                );
                Ok(())
            });
        });
        result?;

        for (i, phi) in data.phis.iter().enumerate() {
            for (&pred, &arg) in data.preds.iter().zip(phi.args.iter()) {
                if arg.is_none() || !dom.is_reachable(pred) {
                    continue;
                }
                let (_, def) = version_of(body, arg, phi.def.var, "phi argument")?;
                ensure!(
                    def_reaches(dom, def, pred, None),
                    "{}: phi {} of {}: argument from {} is not available there",
                    name,
                    i,
                    block,
                    pred
                );
            }
        }
    }

    Ok(())
}
