//! Fuzzing SSA renaming.
//!
//! Renames an arbitrary function with implicit entry definitions (so
//! every read has a definition) and validates the result.

#![no_main]
use libfuzzer_sys::fuzz_target;
use ssaform::fuzzing::ArbitraryCfg;
use ssaform::passes::{to_ssa, SsaOptions, UndefinedUse};

fuzz_target!(|cfg: ArbitraryCfg| {
    let _ = env_logger::try_init();
    let mut body = cfg.0;
    let opts = SsaOptions {
        undefined_use: UndefinedUse::ImplicitEntry,
        validate: true,
        ..SsaOptions::default()
    };
    let result = to_ssa(&mut body, &opts).unwrap();
    assert_eq!(result.stats.versions, body.versions.len());
    log::debug!("renamed:\n{}", body.display(""));
});
