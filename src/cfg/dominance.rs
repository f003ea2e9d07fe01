//! Dominance information for one (graph, root) pair.

use super::frontier::{self, insert_sorted, BlockSet};
use super::{domtree, postorder, Graph, RPOIndex, Reversed};
use crate::entity::{EntityRef, EntityVec, PerEntity};
use crate::errors::SsaError;
use crate::ir::{Block, FunctionBody};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

/// Immediate dominators, dominator-tree children and dominance
/// frontiers of every block reachable from a root.
///
/// Blocks not reachable from the root have no entry in any of the
/// maps: every query about them answers "nothing known" (`None`, an
/// empty list, or `false`).
///
/// Results are keyed by `Block` index only, so they stay valid while
/// the statements inside blocks are rewritten; any change to the
/// edges requires recomputation.
#[derive(Clone, Debug)]
pub struct Dominance {
    root: Block,
    num_blocks: usize,
    /// Reverse-postorder traversal of reachable blocks.
    rpo: EntityVec<RPOIndex, Block>,
    /// Position of each block in RPO, if reachable.
    rpo_pos: PerEntity<Block, Option<RPOIndex>>,
    /// Domtree parents, indexed by block. Invalid for the root.
    idom: PerEntity<Block, Block>,
    /// Domtree children, in ascending RPO order.
    dominated: PerEntity<Block, BlockSet>,
    /// Dominance frontiers, sorted by block index.
    frontier: PerEntity<Block, BlockSet>,
    rounds: usize,
    /// Postdominance over the same CFG, if computed.
    reverse: Option<Arc<Dominance>>,
}

impl Dominance {
    /// Compute dominance over `graph` from `root`.
    ///
    /// The root must be the graph's single entry. This is not checked:
    /// blocks that can only be entered some other way are unreachable
    /// from `root` and are simply left out of the result.
    pub fn compute<G: Graph>(graph: &G, root: Block) -> Dominance {
        let mut postorder = postorder::calculate(graph, root);
        postorder.reverse();
        let rpo: EntityVec<RPOIndex, Block> = EntityVec::from(postorder);
        let mut rpo_pos = PerEntity::default();
        for (index, &block) in rpo.entries() {
            rpo_pos[block] = Some(index);
        }

        let domtree::Idoms { idom, rounds } =
            domtree::calculate(graph, rpo.as_slice(), &rpo_pos, root);

        let mut dominated: PerEntity<Block, BlockSet> = PerEntity::default();
        for &block in rpo.values() {
            let parent = idom[block];
            if parent.is_valid() {
                dominated[parent].push(block);
            }
        }

        let frontier = frontier::calculate(graph, rpo.as_slice(), &rpo_pos, &idom, root);

        log::debug!(
            "dominance from {}: {} of {} blocks reachable, converged in {} rounds",
            root,
            rpo.len(),
            graph.num_blocks(),
            rounds
        );

        Dominance {
            root,
            num_blocks: graph.num_blocks(),
            rpo,
            rpo_pos,
            idom,
            dominated,
            frontier,
            rounds,
            reverse: None,
        }
    }

    /// Dominance over the CFG, rooted at the entry block.
    pub fn forward(body: &FunctionBody) -> Dominance {
        Self::compute(body, body.entry)
    }

    /// Postdominance: dominance over the reversed CFG, rooted at the
    /// exit block.
    pub fn reverse(body: &FunctionBody) -> Result<Dominance, SsaError> {
        if body.exit.is_invalid() {
            return Err(SsaError::NoExit {
                func: body.name.clone(),
            });
        }
        Ok(Self::compute(&Reversed(body), body.exit))
    }

    /// Link an independently computed reverse-dominance result.
    pub fn with_reverse(mut self, reverse: Arc<Dominance>) -> Dominance {
        self.reverse = Some(reverse);
        self
    }

    pub fn reverse_dominance(&self) -> Option<&Arc<Dominance>> {
        self.reverse.as_ref()
    }

    pub fn root(&self) -> Block {
        self.root
    }

    /// Reachable blocks in reverse postorder; the root comes first.
    pub fn rpo(&self) -> &[Block] {
        self.rpo.as_slice()
    }

    pub fn rpo_pos(&self, block: Block) -> Option<RPOIndex> {
        self.rpo_pos[block]
    }

    /// Fixed-point rounds taken, including the final one that changed
    /// nothing.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn is_reachable(&self, block: Block) -> bool {
        self.rpo_pos[block].is_some()
    }

    /// The immediate dominator of `block`; `None` for the root and
    /// for unreachable blocks.
    pub fn idom(&self, block: Block) -> Option<Block> {
        self.idom[block].maybe()
    }

    /// Blocks immediately dominated by `block` (its dominator-tree
    /// children), in ascending RPO order.
    pub fn dominated_by(&self, block: Block) -> &[Block] {
        &self.dominated[block][..]
    }

    /// The dominance frontier of `block`, sorted by block index.
    pub fn frontier(&self, block: Block) -> &[Block] {
        &self.frontier[block][..]
    }

    /// Is `frontier` in the dominance frontier of `block`?
    pub fn in_frontier(&self, block: Block, frontier: Block) -> bool {
        self.frontier[block].binary_search(&frontier).is_ok()
    }

    /// Record `frontier` as being in the dominance frontier of
    /// `block`, for passes that extend frontiers incrementally.
    /// Adding an existing member does nothing.
    pub fn add_to_frontier(&mut self, block: Block, frontier: Block) {
        if insert_sorted(&mut self.frontier[block], frontier) {
            log::trace!("add_to_frontier: {} += {}", block, frontier);
        }
    }

    /// Does `a` dominate `b`? Every block dominates itself. Always
    /// false if either block is unreachable.
    pub fn dominates(&self, a: Block, b: Block) -> bool {
        self.is_reachable(a) && self.is_reachable(b) && domtree::dominates(&self.idom, a, b)
    }

    pub fn strictly_dominates(&self, a: Block, b: Block) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Deterministic text dump of all three maps, for diffing.
    pub fn display(&self) -> DominanceDisplay<'_> {
        DominanceDisplay(self)
    }

    fn all_blocks(&self) -> impl Iterator<Item = Block> {
        (0..self.num_blocks).map(Block::new)
    }
}

pub struct DominanceDisplay<'a>(&'a Dominance);

fn block_list(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|block| format!("{}", block))
        .collect::<Vec<_>>()
        .join(", ")
}

impl<'a> Display for DominanceDisplay<'a> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let dom = self.0;
        writeln!(f, "root: {}", dom.root)?;
        writeln!(f, "idom:")?;
        for block in dom.all_blocks() {
            if let Some(idom) = dom.idom(block) {
                writeln!(f, "  {} -> {}", block, idom)?;
            }
        }
        writeln!(f, "dominated:")?;
        for block in dom.all_blocks() {
            let children = dom.dominated_by(block);
            if !children.is_empty() {
                writeln!(f, "  {} -> [{}]", block, block_list(children))?;
            }
        }
        writeln!(f, "frontier:")?;
        for block in dom.all_blocks() {
            let frontier = dom.frontier(block);
            if !frontier.is_empty() {
                writeln!(f, "  {} -> [{}]", block, block_list(frontier))?;
            }
        }
        Ok(())
    }
}
