use super::{Func, FunctionBody, ModuleDisplay};
use crate::cfg::Dominance;
use crate::entity::EntityVec;
use crate::frontend;
use crate::passes::{self, SsaOptions, SsaResult};
use anyhow::Result;
use rayon::prelude::*;

/// A collection of independent functions.
///
/// Functions share nothing, so whole-module operations process them in
/// parallel.
#[derive(Clone, Debug, Default)]
pub struct Module {
    pub funcs: EntityVec<Func, FunctionBody>,
}

impl Module {
    /// Parse a module from text. See `frontend` for the syntax.
    pub fn from_text(text: &str) -> Result<Module> {
        frontend::parse_module(text)
    }

    /// Convert every function to SSA form. Results are in function
    /// order. If any function fails, one of the errors is returned;
    /// other functions may or may not have been renamed by then, and
    /// the failing one is left unrenamed.
    pub fn to_ssa(&mut self, opts: &SsaOptions) -> Result<Vec<SsaResult>> {
        self.funcs
            .as_mut_slice()
            .par_iter_mut()
            .map(|body| {
                log::debug!("to_ssa: {}", body.name);
                passes::to_ssa(body, opts)
            })
            .collect::<Result<Vec<_>>>()
    }

    /// Dominance (or postdominance, with `reverse`) of every function.
    pub fn dominance(&self, reverse: bool) -> Result<Vec<Dominance>> {
        self.funcs
            .as_slice()
            .par_iter()
            .map(|body| -> Result<_> {
                if reverse {
                    Ok(Dominance::reverse(body)?)
                } else {
                    Ok(Dominance::forward(body))
                }
            })
            .collect::<Result<Vec<_>>>()
    }

    /// Return a wrapper that implements Display on this module,
    /// pretty-printing it in the text syntax.
    pub fn display(&self) -> ModuleDisplay<'_> {
        ModuleDisplay(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entity::EntityRef;
    use crate::SsaError;

    const TWO: &str = "
        func first
        exit b1
        b0:
          x = one
          br b1
        b1:
          return x

        func second
        b0:
          return y
        ";

    #[test]
    fn functions_are_independent() {
        let mut module = Module::from_text(TWO).unwrap();
        let opts = SsaOptions {
            undefined_use: passes::UndefinedUse::ImplicitEntry,
            ..SsaOptions::default()
        };
        let results = module.to_ssa(&opts).unwrap();
        assert_eq!(results.len(), 2);
        // `x` is read, so it gets an implicit version before `x = one`.
        assert_eq!(results[0].stats.versions, 2);
        assert_eq!(results[0].stats.implicit, 1);
        assert_eq!(results[1].stats.implicit, 1);
        // Version numbering restarts in each function.
        assert_eq!(module.funcs[Func::new(1)].versions.len(), 1);
        let text = module.display().to_string();
        assert!(text.contains("return x_1"), "{}", text);
        assert!(text.contains("return y_0"), "{}", text);
    }

    #[test]
    fn failure_leaves_function_unrenamed() {
        let mut module = Module::from_text(TWO).unwrap();
        let err = module.to_ssa(&SsaOptions::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SsaError>(),
            Some(SsaError::UndefinedUse { .. })
        ));
        assert!(!module.funcs[Func::new(1)].is_renamed());
    }

    #[test]
    fn reverse_dominance_per_function() {
        let module = Module::from_text(TWO).unwrap();
        assert_eq!(module.dominance(false).unwrap().len(), 2);
        let err = module.dominance(true).unwrap_err();
        assert_eq!(
            err.downcast_ref::<SsaError>(),
            Some(&SsaError::NoExit {
                func: "second".to_string()
            })
        );
    }
}
