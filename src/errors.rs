//! Error types.

use crate::ir::Block;

/// Where in a block a use occurs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UseSite {
    /// The statement at this index.
    Stmt(usize),
    /// The block's terminator.
    Terminator,
}

impl std::fmt::Display for UseSite {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            UseSite::Stmt(index) => write!(f, "stmt {}", index),
            UseSite::Terminator => write!(f, "terminator"),
        }
    }
}

/// An internal-compiler-error condition raised while building SSA
/// form. These indicate malformed input and are fatal to the function
/// being compiled; none of them is worth retrying.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SsaError {
    /// A variable is read with no definition dominating the read.
    UndefinedUse {
        func: String,
        block: Block,
        site: UseSite,
        var: String,
    },
    /// Reverse dominance was requested but the function has no
    /// designated exit block.
    NoExit { func: String },
    /// The function already carries SSA versions.
    AlreadyRenamed { func: String },
    /// A phi does not have exactly one argument slot per predecessor.
    MalformedPhi {
        func: String,
        block: Block,
        var: String,
        args: usize,
        preds: usize,
    },
}

impl std::fmt::Display for SsaError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SsaError::UndefinedUse {
                func,
                block,
                site,
                var,
            } => write!(
                f,
                "{}: use of `{}` at {} {} has no dominating definition",
                func, var, block, site
            ),
            SsaError::NoExit { func } => {
                write!(f, "{}: reverse dominance requires an exit block", func)
            }
            SsaError::AlreadyRenamed { func } => write!(f, "{}: already in SSA form", func),
            SsaError::MalformedPhi {
                func,
                block,
                var,
                args,
                preds,
            } => write!(
                f,
                "{}: phi for `{}` in {} has {} args but {} preds",
                func, var, block, args, preds
            ),
        }
    }
}

impl std::error::Error for SsaError {}
