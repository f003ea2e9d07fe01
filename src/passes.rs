//! Passes.

pub mod dom_pass;
pub mod rename;
pub mod ssa;

use crate::cfg::{self, Dominance};
use crate::ir::FunctionBody;
use anyhow::Result;
use std::sync::Arc;

pub use rename::{RenameStats, UndefinedUse};

/// Options for `to_ssa`.
#[derive(Clone, Debug)]
pub struct SsaOptions {
    pub undefined_use: UndefinedUse,
    /// Also compute postdominance (the function must have an exit
    /// block) and link it to the returned forward dominance.
    pub reverse_dominance: bool,
    /// Run the SSA validator after renaming.
    pub validate: bool,
    /// Cross-check dominance against the brute-force definitions.
    /// Quadratic in the number of blocks.
    pub verify_dominance: bool,
}

impl Default for SsaOptions {
    fn default() -> Self {
        SsaOptions {
            undefined_use: UndefinedUse::default(),
            reverse_dominance: false,
            validate: true,
            verify_dominance: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SsaResult {
    /// Forward dominance, with postdominance linked if requested.
    pub dominance: Dominance,
    pub stats: RenameStats,
}

/// Put a function with phis already placed into SSA form: compute
/// dominance over its CFG, then rename.
pub fn to_ssa(body: &mut FunctionBody, opts: &SsaOptions) -> Result<SsaResult> {
    body.validate()?;

    let mut dominance = Dominance::forward(body);
    if opts.verify_dominance {
        cfg::verify::verify(&*body, body.entry, &dominance)?;
    }
    if opts.reverse_dominance {
        let reverse = Dominance::reverse(body)?;
        if opts.verify_dominance {
            cfg::verify::verify(&cfg::Reversed(&*body), body.exit, &reverse)?;
        }
        dominance = dominance.with_reverse(Arc::new(reverse));
    }

    let stats = rename::run(body, &dominance, opts.undefined_use)?;
    if opts.validate {
        ssa::validate(body, &dominance)?;
    }

    Ok(SsaResult { dominance, stats })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::frontend::parse_function;
    use crate::SsaError;

    const DIAMOND: &str = "
        func max
        exit done
        top:
          a, b = args
          c = lt a, b
          if c, left, right
        left:
          m = copy b
          br done
        right:
          m = copy a
          br done
        done:
          phi m
          return m
        ";

    #[test]
    fn diamond_end_to_end() {
        let mut body = parse_function(DIAMOND).unwrap();
        let opts = SsaOptions {
            reverse_dominance: true,
            verify_dominance: true,
            ..SsaOptions::default()
        };
        let result = to_ssa(&mut body, &opts).unwrap();
        assert_eq!(result.stats.versions, 6);
        let reverse = result.dominance.reverse_dominance().unwrap();
        assert_eq!(reverse.root(), body.exit);
        // The exit postdominates everything, the entry included.
        assert!(reverse.dominates(body.exit, body.entry));

        // `right` comes first in RPO, so its `m` is numbered first;
        // phi slots follow pred order (left, right).
        let text = body.display("").to_string();
        assert!(text.contains("phi m_5  # [m_4, m_3]"), "{}", text);
        assert!(text.contains("return m_5"), "{}", text);
    }

    #[test]
    fn reverse_without_exit_fails() {
        let mut body = parse_function(&DIAMOND.replace("exit done", "")).unwrap();
        let opts = SsaOptions {
            reverse_dominance: true,
            ..SsaOptions::default()
        };
        let err = to_ssa(&mut body, &opts).unwrap_err();
        assert_eq!(
            err.downcast_ref::<SsaError>(),
            Some(&SsaError::NoExit {
                func: "max".to_string()
            })
        );
        assert!(!body.is_renamed());
    }

    #[test]
    fn undefined_use_surfaces_as_ssa_error() {
        let mut body = parse_function("func f\nb0:\n  return x\n").unwrap();
        let err = to_ssa(&mut body, &SsaOptions::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SsaError>(),
            Some(SsaError::UndefinedUse { .. })
        ));

        let opts = SsaOptions {
            undefined_use: UndefinedUse::ImplicitEntry,
            ..SsaOptions::default()
        };
        let result = to_ssa(&mut body, &opts).unwrap();
        assert_eq!(result.stats.implicit, 1);
    }
}
