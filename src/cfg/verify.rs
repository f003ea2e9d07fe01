//! Brute-force cross-checking of dominance results.
//!
//! Recomputes full dominator sets with the textbook quadratic set
//! dataflow and checks a `Dominance` against them, straight from the
//! definitions. Meant for tests, fuzzing and `--verify`, not for use
//! on large functions.

use super::{Dominance, Graph};
use crate::entity::EntityRef;
use crate::ir::Block;
use anyhow::{bail, ensure, Result};

/// Reachability and dominator sets: `doms[b][a]` iff `a` dominates `b`.
struct DomSets {
    reachable: Vec<bool>,
    doms: Vec<Vec<bool>>,
}

impl DomSets {
    fn compute<G: Graph>(graph: &G, root: Block) -> DomSets {
        let n = graph.num_blocks();

        let mut reachable = vec![false; n];
        let mut stack = vec![root];
        reachable[root.index()] = true;
        while let Some(block) = stack.pop() {
            for &succ in graph.succs(block) {
                if !reachable[succ.index()] {
                    reachable[succ.index()] = true;
                    stack.push(succ);
                }
            }
        }

        let mut doms = (0..n)
            .map(|b| vec![reachable[b]; n])
            .collect::<Vec<_>>();
        doms[root.index()] = vec![false; n];
        doms[root.index()][root.index()] = true;

        let mut changed = true;
        while changed {
            changed = false;
            for b in (0..n).filter(|&b| reachable[b] && b != root.index()) {
                let mut set = vec![true; n];
                for &pred in graph.preds(Block::new(b)) {
                    if !reachable[pred.index()] {
                        continue;
                    }
                    for (x, bit) in set.iter_mut().enumerate() {
                        *bit = *bit && doms[pred.index()][x];
                    }
                }
                set[b] = true;
                if set != doms[b] {
                    doms[b] = set;
                    changed = true;
                }
            }
        }

        DomSets { reachable, doms }
    }

    fn dominates(&self, a: Block, b: Block) -> bool {
        self.doms[b.index()][a.index()]
    }
}

/// Check `dom` against the definitions of dominator, dominator tree
/// and dominance frontier on `graph` rooted at `root`.
pub fn verify<G: Graph>(graph: &G, root: Block, dom: &Dominance) -> Result<()> {
    let n = graph.num_blocks();
    let sets = DomSets::compute(graph, root);
    let all = || (0..n).map(Block::new);

    ensure!(dom.root() == root, "root is {} but expected {}", dom.root(), root);

    for b in all() {
        let reachable = sets.reachable[b.index()];
        ensure!(
            dom.is_reachable(b) == reachable,
            "{}: reachability mismatch (expected {})",
            b,
            reachable
        );
        if !reachable {
            ensure!(dom.idom(b).is_none(), "unreachable {} has an idom", b);
            ensure!(
                dom.dominated_by(b).is_empty(),
                "unreachable {} has domtree children",
                b
            );
            ensure!(dom.frontier(b).is_empty(), "unreachable {} has a frontier", b);
            continue;
        }

        // Immediate dominator: the strict dominator that every other
        // strict dominator dominates.
        match dom.idom(b) {
            None => ensure!(b == root, "{} is not the root but has no idom", b),
            Some(idom) => {
                ensure!(b != root, "root {} has idom {}", b, idom);
                ensure!(
                    idom != b && sets.dominates(idom, b),
                    "idom {} of {} does not strictly dominate it",
                    idom,
                    b
                );
                for x in all() {
                    if x != b && sets.dominates(x, b) && !sets.dominates(x, idom) {
                        bail!("{} strictly dominates {} but not its idom {}", x, b, idom);
                    }
                }
            }
        }

        // Walking up the tree must reach the root.
        let mut runner = b;
        let mut steps = 0;
        while let Some(parent) = dom.idom(runner) {
            runner = parent;
            steps += 1;
            ensure!(steps <= n, "dominator chain from {} has a cycle", b);
        }
        ensure!(runner == root, "dominator chain from {} ends at {}", b, runner);

        // Children are exactly the inverse of idom, in RPO order.
        let children = dom.dominated_by(b);
        let mut expected = all()
            .filter(|&c| dom.idom(c) == Some(b))
            .collect::<Vec<_>>();
        expected.sort_by_key(|&c| dom.rpo_pos(c));
        ensure!(
            children == &expected[..],
            "children of {}: {:?}, expected {:?}",
            b,
            children,
            expected
        );

        for &c in children {
            ensure!(
                dom.dominates(b, c),
                "{} listed as dominated by {} but is not",
                c,
                b
            );
        }

        // Frontier, from the definition.
        let frontier = all()
            .filter(|&w| sets.reachable[w.index()])
            .filter(|&w| {
                let dominates_pred = graph
                    .preds(w)
                    .iter()
                    .any(|&p| sets.reachable[p.index()] && sets.dominates(b, p));
                let strictly_dominates = b != w && sets.dominates(b, w);
                dominates_pred && !strictly_dominates
            })
            .collect::<Vec<_>>();
        ensure!(
            dom.frontier(b) == &frontier[..],
            "frontier of {}: {:?}, expected {:?}",
            b,
            dom.frontier(b),
            frontier
        );
    }

    for b in all() {
        for x in all() {
            if sets.reachable[b.index()] && sets.reachable[x.index()] {
                ensure!(
                    dom.dominates(x, b) == sets.dominates(x, b),
                    "dominates({}, {}) mismatch",
                    x,
                    b
                );
            }
        }
    }

    Ok(())
}
