//! Postorder computation with an explicit DFS stack.

use super::Graph;
use crate::entity::PerEntity;
use crate::ir::Block;
use smallvec::{smallvec, SmallVec};

/// Postorder of the blocks reachable from `root`, visiting successors
/// in edge order. Unreachable blocks do not appear.
pub fn calculate<G: Graph>(graph: &G, root: Block) -> Vec<Block> {
    let mut ret = vec![];

    let mut visited: PerEntity<Block, bool> = PerEntity::default();

    #[derive(Debug)]
    struct State<'a> {
        block: Block,
        succs: &'a [Block],
        next_succ: usize,
    }
    let mut stack: SmallVec<[State; 64]> = smallvec![];

    visited[root] = true;
    stack.push(State {
        block: root,
        succs: graph.succs(root),
        next_succ: 0,
    });

    while let Some(state) = stack.last_mut() {
        // Either descend into the next unvisited successor, or, once
        // all are done, emit this block and retreat.
        if let Some(&succ) = state.succs.get(state.next_succ) {
            state.next_succ += 1;
            if !visited[succ] {
                log::trace!("postorder: {} -> {}", state.block, succ);
                visited[succ] = true;
                stack.push(State {
                    block: succ,
                    succs: graph.succs(succ),
                    next_succ: 0,
                });
            }
        } else {
            log::trace!("postorder: emit {}", state.block);
            ret.push(state.block);
            stack.pop();
        }
    }

    ret
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::{FunctionBody, Terminator};

    #[test]
    fn skips_unreachable() {
        let mut body = FunctionBody::new("f");
        let b0 = body.entry;
        let b1 = body.add_block();
        let dead = body.add_block();
        body.set_terminator(b0, Terminator::Br { target: b1 });
        body.set_terminator(b1, Terminator::Br { target: b0 });
        body.set_terminator(dead, Terminator::Br { target: b1 });

        assert_eq!(calculate(&body, b0), vec![b1, b0]);
    }
}
