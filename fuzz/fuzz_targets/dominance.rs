//! Fuzzing dominance over arbitrary CFGs.
//!
//! 1. Generate a function with an arbitrary CFG.
//! 2. Compute forward dominance, and postdominance if it has an exit.
//! 3. Check both against brute-force dominator sets.

#![no_main]
use libfuzzer_sys::fuzz_target;
use ssaform::cfg::{verify::verify, Dominance, Reversed};
use ssaform::entity::EntityRef;
use ssaform::fuzzing::ArbitraryCfg;

fuzz_target!(|cfg: ArbitraryCfg| {
    let _ = env_logger::try_init();
    let body = cfg.0;
    log::debug!("body:\n{}", body.display(""));

    let dom = Dominance::forward(&body);
    verify(&body, body.entry, &dom).unwrap();
    // Recomputation is deterministic.
    assert_eq!(
        dom.display().to_string(),
        Dominance::forward(&body).display().to_string()
    );

    if body.exit.is_valid() {
        let rev = Dominance::reverse(&body).unwrap();
        verify(&Reversed(&body), body.exit, &rev).unwrap();
    }
});
