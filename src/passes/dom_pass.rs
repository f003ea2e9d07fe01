//! Simple framework for a domtree-based pass.
//!
//! The walk uses an explicit stack rather than recursion so deep
//! dominator trees (long chains of straight-line blocks) cannot
//! overflow the native stack. Hooks still see the recursive order:
//! `enter(b)`, then each child's whole subtree, then `leave(b)`.

use crate::cfg::Dominance;
use crate::ir::{Block, FunctionBody};

pub trait DomtreePass {
    type Error;

    fn enter(&mut self, _block: Block, _body: &mut FunctionBody) -> Result<(), Self::Error> {
        Ok(())
    }
    fn leave(&mut self, _block: Block, _body: &mut FunctionBody) -> Result<(), Self::Error> {
        Ok(())
    }
}

enum Step {
    Enter(Block),
    Leave(Block),
}

/// Walk the dominator tree of `dom` from its root, visiting children
/// in `Dominance::dominated_by` order. Stops at the first error.
pub fn dom_pass<P: DomtreePass>(
    body: &mut FunctionBody,
    dom: &Dominance,
    pass: &mut P,
) -> Result<(), P::Error> {
    let mut stack = vec![Step::Enter(dom.root())];
    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(block) => {
                pass.enter(block, body)?;
                stack.push(Step::Leave(block));
                // Reversed, so the first child is popped first.
                for &child in dom.dominated_by(block).iter().rev() {
                    stack.push(Step::Enter(child));
                }
            }
            Step::Leave(block) => pass.leave(block, body)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::Terminator;

    struct Trace(Vec<String>);

    impl DomtreePass for Trace {
        type Error = ();
        fn enter(&mut self, block: Block, _body: &mut FunctionBody) -> Result<(), ()> {
            self.0.push(format!("+{}", block));
            Ok(())
        }
        fn leave(&mut self, block: Block, _body: &mut FunctionBody) -> Result<(), ()> {
            self.0.push(format!("-{}", block));
            Ok(())
        }
    }

    #[test]
    fn pre_and_post_order() {
        let mut body = FunctionBody::new("f");
        let b0 = body.entry;
        let b1 = body.add_block();
        let b2 = body.add_block();
        let b3 = body.add_block();
        let c = crate::ir::Operand::new(body.intern_var("c"));
        body.set_terminator(
            b0,
            Terminator::CondBr {
                cond: c,
                if_true: b1,
                if_false: b2,
            },
        );
        body.set_terminator(b1, Terminator::Br { target: b3 });
        body.set_terminator(b2, Terminator::Return { values: vec![] });
        body.set_terminator(b3, Terminator::Return { values: vec![] });

        let dom = Dominance::forward(&body);
        let mut trace = Trace(vec![]);
        dom_pass(&mut body, &dom, &mut trace).unwrap();

        // RPO is b0, b2, b1, b3, so b2 is b0's first child.
        assert_eq!(
            trace.0,
            vec!["+block0", "+block2", "-block2", "+block1", "+block3", "-block3", "-block1", "-block0"]
        );
    }
}
