//! Dominance frontiers.
//!
//! `w` is in the frontier of `v` when `v` dominates a predecessor of
//! `w` but does not strictly dominate `w`. Only join points (blocks
//! with two or more preds) can be in any frontier, so for each join
//! point we walk up the dominator tree from each pred until reaching
//! the join point's immediate dominator, adding the join point to
//! every block passed on the way.
//!
//! The root is entered from outside the graph as well, so it counts
//! as a join point as soon as it has a single in-graph pred.

use super::{Graph, RPOIndex};
use crate::entity::{EntityRef, PerEntity};
use crate::ir::Block;
use smallvec::SmallVec;

pub type BlockSet = SmallVec<[Block; 4]>;

/// Insert into a sorted set. Returns false if already present.
pub(crate) fn insert_sorted(set: &mut BlockSet, block: Block) -> bool {
    match set.binary_search(&block) {
        Ok(_) => false,
        Err(pos) => {
            set.insert(pos, block);
            true
        }
    }
}

pub fn calculate<G: Graph>(
    graph: &G,
    rpo: &[Block],
    rpo_pos: &PerEntity<Block, Option<RPOIndex>>,
    idom: &PerEntity<Block, Block>,
    root: Block,
) -> PerEntity<Block, BlockSet> {
    let mut frontier: PerEntity<Block, BlockSet> = PerEntity::default();

    for &block in rpo {
        let preds = graph.preds(block);
        let implicit_entry = if block == root { 1 } else { 0 };
        if preds.len() + implicit_entry < 2 {
            continue;
        }
        // For the root this is invalid, so walks run off the top of
        // the tree: a join at the root is in the frontier of every
        // block on the path up from each pred, root included.
        let stop = idom[block];
        for &pred in preds {
            if rpo_pos[pred].is_none() {
                continue;
            }
            let mut runner = pred;
            while runner.is_valid() && runner != stop {
                if insert_sorted(&mut frontier[runner], block) {
                    log::trace!("frontier({}) += {}", runner, block);
                }
                runner = idom[runner];
            }
        }
    }

    frontier
}
