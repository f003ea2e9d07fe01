//! Control-flow graph analyses.
//!
//! Analyses are written against the [`Graph`] trait rather than
//! against `FunctionBody` directly, so the same code computes
//! dominance on the forward CFG and postdominance on its reverse.

use crate::declare_entity;
use crate::entity::EntityRef;
use crate::ir::{Block, FunctionBody};

pub mod dominance;
pub mod domtree;
pub mod frontier;
pub mod postorder;
pub mod verify;

pub use dominance::{Dominance, DominanceDisplay};

declare_entity!(RPOIndex, "rpo");

/// A directed graph over blocks.
pub trait Graph {
    /// Number of vertices; vertices are `Block::new(0..num_blocks)`.
    fn num_blocks(&self) -> usize;
    fn succs(&self, block: Block) -> &[Block];
    fn preds(&self, block: Block) -> &[Block];
}

/// All vertices of a graph, in index order.
pub fn blocks<G: Graph>(graph: &G) -> impl Iterator<Item = Block> {
    (0..graph.num_blocks()).map(Block::new)
}

impl Graph for FunctionBody {
    fn num_blocks(&self) -> usize {
        self.blocks.len()
    }
    fn succs(&self, block: Block) -> &[Block] {
        &self.blocks[block].succs[..]
    }
    fn preds(&self, block: Block) -> &[Block] {
        &self.blocks[block].preds[..]
    }
}

/// A view of a graph with every edge reversed.
#[derive(Clone, Copy, Debug)]
pub struct Reversed<'a, G: Graph>(pub &'a G);

impl<'a, G: Graph> Graph for Reversed<'a, G> {
    fn num_blocks(&self) -> usize {
        self.0.num_blocks()
    }
    fn succs(&self, block: Block) -> &[Block] {
        self.0.preds(block)
    }
    fn preds(&self, block: Block) -> &[Block] {
        self.0.succs(block)
    }
}
