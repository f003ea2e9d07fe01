//! Fuzzing-specific utilities.

use crate::entity::{EntityRef, PerEntity};
use crate::ir::{Block, FunctionBody, Operand, Terminator, Var};
use libfuzzer_sys::arbitrary;

const MAX_BLOCKS: usize = 32;
const MAX_VARS: usize = 6;
const MAX_STMTS: usize = 4;

/// A function with an arbitrary CFG (unreachable blocks, irreducible
/// loops and edges back to the entry included) and arbitrary reads and
/// writes of a small pool of variables. Phis are placed at random join
/// points, not where they are needed, which renaming must accept.
///
/// Public/exported only for access by fuzzers.
#[derive(Debug)]
pub struct ArbitraryCfg(pub FunctionBody);

fn index(u: &mut arbitrary::Unstructured<'_>, len: usize) -> arbitrary::Result<usize> {
    u.int_in_range(0..=len - 1)
}

fn var(u: &mut arbitrary::Unstructured<'_>, vars: &[Var]) -> arbitrary::Result<Var> {
    Ok(vars[index(u, vars.len())?])
}

fn operand(u: &mut arbitrary::Unstructured<'_>, vars: &[Var]) -> arbitrary::Result<Operand> {
    Ok(Operand::new(var(u, vars)?))
}

impl<'a> arbitrary::Arbitrary<'a> for ArbitraryCfg {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let num_blocks = u.int_in_range(1..=MAX_BLOCKS)?;
        let num_vars = u.int_in_range(1..=MAX_VARS)?;

        let mut body = FunctionBody::new("fuzz");
        for _ in 1..num_blocks {
            body.add_block();
        }
        let vars = (0..num_vars)
            .map(|i| body.intern_var(&format!("x{}", i)))
            .collect::<Vec<_>>();

        let mut succs: PerEntity<Block, Vec<Block>> = PerEntity::default();
        for _ in 0..u.int_in_range(0..=num_blocks * 2)? {
            let from = Block::new(index(u, num_blocks)?);
            let to = Block::new(index(u, num_blocks)?);
            succs[from].push(to);
        }

        for i in 0..num_blocks {
            let block = Block::new(i);
            for _ in 0..u.int_in_range(0..=MAX_STMTS)? {
                let defs = (0..u.int_in_range(0..=2)?)
                    .map(|_| var(u, &vars))
                    .collect::<arbitrary::Result<Vec<_>>>()?;
                let uses = (0..u.int_in_range(0..=2)?)
                    .map(|_| var(u, &vars))
                    .collect::<arbitrary::Result<Vec<_>>>()?;
                body.add_stmt(block, "op", &defs, &uses);
            }

            let mut targets = succs[block].clone();
            let terminator = match targets.len() {
                0 => Terminator::Return {
                    values: (0..u.int_in_range(0..=2)?)
                        .map(|_| operand(u, &vars))
                        .collect::<arbitrary::Result<Vec<_>>>()?,
                },
                1 => Terminator::Br { target: targets[0] },
                2 => Terminator::CondBr {
                    cond: operand(u, &vars)?,
                    if_true: targets[0],
                    if_false: targets[1],
                },
                _ => {
                    let default = targets.pop().unwrap_or_default();
                    Terminator::Select {
                        value: operand(u, &vars)?,
                        targets,
                        default,
                    }
                }
            };
            body.set_terminator(block, terminator);
        }

        for i in 0..num_blocks {
            let block = Block::new(i);
            if body.blocks[block].preds.len() >= 2 {
                for &var in &vars {
                    if u.arbitrary::<bool>()? {
                        body.add_phi(block, var);
                    }
                }
            }
        }

        if u.arbitrary::<bool>()? {
            let exit = Block::new(index(u, num_blocks)?);
            body.set_exit(exit);
        }

        Ok(ArbitraryCfg(body))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cfg::{verify::verify, Dominance, Reversed};
    use crate::passes::{rename, ssa, UndefinedUse};
    use libfuzzer_sys::arbitrary::{Arbitrary, Unstructured};

    #[test]
    fn generated_bodies_hold_up() {
        for seed in 0..64u32 {
            let bytes = (0..512u32)
                .map(|i| (i.wrapping_mul(2654435761).wrapping_add(seed * 97) >> 13) as u8)
                .collect::<Vec<_>>();
            let mut u = Unstructured::new(&bytes);
            let ArbitraryCfg(mut body) = ArbitraryCfg::arbitrary(&mut u).unwrap();
            body.validate().unwrap();

            let dom = Dominance::forward(&body);
            verify(&body, body.entry, &dom).unwrap();
            if body.exit.is_valid() {
                let rev = Dominance::reverse(&body).unwrap();
                verify(&Reversed(&body), body.exit, &rev).unwrap();
            }

            rename::run(&mut body, &dom, UndefinedUse::ImplicitEntry).unwrap();
            ssa::validate(&body, &dom).unwrap();
        }
    }
}
