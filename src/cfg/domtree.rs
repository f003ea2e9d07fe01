//! Immediate dominators.
//!
//! This is an implementation of the algorithm described in
//!
//!   A Simple, Fast Dominance Algorithm
//!   Keith D. Cooper, Timothy J. Harvey, and Ken Kennedy
//!   Department of Computer Science, Rice University, Houston, Texas, USA
//!   TR-06-33870
//!   https://www.cs.rice.edu/~keith/EMBED/dom.pdf
//!
//! It iterates to a fixed point over the blocks in reverse postorder
//! rather than building the Lengauer-Tarjan semi-dominator forest; on
//! CFG-sized graphs it converges in a handful of rounds.

use super::{Graph, RPOIndex};
use crate::entity::{EntityRef, PerEntity};
use crate::ir::Block;

/// Immediate dominators, plus the number of rounds the fixed point
/// took (the last round being the one that changed nothing).
pub struct Idoms {
    /// The immediate dominator of each reachable non-root block;
    /// `Block::invalid()` for the root and for unreachable blocks.
    pub idom: PerEntity<Block, Block>,
    pub rounds: usize,
}

fn rank(rpo_pos: &PerEntity<Block, Option<RPOIndex>>, block: Block) -> usize {
    rpo_pos[block].map(|r| r.index()).unwrap_or(usize::MAX)
}

// Walk both dominator chains upward, always moving whichever node is
// later in RPO, until they meet.
fn intersect(
    idom: &PerEntity<Block, Block>,
    rpo_pos: &PerEntity<Block, Option<RPOIndex>>,
    mut node1: Block,
    mut node2: Block,
) -> Block {
    while node1 != node2 {
        while rank(rpo_pos, node1) > rank(rpo_pos, node2) {
            node1 = idom[node1];
        }
        while rank(rpo_pos, node2) > rank(rpo_pos, node1) {
            node2 = idom[node2];
        }
    }
    node1
}

/// Compute immediate dominators of all blocks reachable from `root`.
///
/// `rpo` must be the reverse postorder from `root` (so `rpo[0] ==
/// root`) and `rpo_pos` its inverse. The root must be the graph's only
/// entry: blocks not reachable from it are ignored entirely.
pub fn calculate<G: Graph>(
    graph: &G,
    rpo: &[Block],
    rpo_pos: &PerEntity<Block, Option<RPOIndex>>,
    root: Block,
) -> Idoms {
    let mut idom: PerEntity<Block, Block> = PerEntity::default();

    // The root is its own dominator while iterating, so that chains
    // terminate there.
    idom[root] = root;

    let mut rounds = 0;
    let mut changed = true;
    while changed {
        changed = false;
        rounds += 1;
        for &node in rpo.iter().filter(|&&node| node != root) {
            let mut new_idom = Block::invalid();
            for &pred in graph.preds(node) {
                // Unreachable preds, and preds not yet visited this
                // round, have no dominator yet.
                if idom[pred].is_invalid() {
                    continue;
                }
                new_idom = if new_idom.is_invalid() {
                    pred
                } else {
                    intersect(&idom, rpo_pos, new_idom, pred)
                };
            }

            if new_idom.is_valid() && new_idom != idom[node] {
                log::trace!("domtree round {}: idom({}) = {}", rounds, node, new_idom);
                idom[node] = new_idom;
                changed = true;
            }
        }
    }

    // Now clear the root's entry; this allows the loop in
    // `dominates` to terminate.
    idom[root] = Block::invalid();

    Idoms { idom, rounds }
}

/// Whether `a` dominates `b`, walking up from `b`. Both blocks must be
/// reachable; an unreachable `b` is dominated only by itself.
pub fn dominates(idom: &PerEntity<Block, Block>, a: Block, mut b: Block) -> bool {
    loop {
        if a == b {
            return true;
        }
        if b.is_invalid() {
            return false;
        }
        b = idom[b];
    }
}
