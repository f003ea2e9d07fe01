#![no_main]
use libfuzzer_sys::fuzz_target;

use ssaform::Module;

fuzz_target!(|text: &str| {
    let _ = env_logger::try_init();
    // Anything that parses must print back to text that parses the
    // same way.
    if let Ok(module) = Module::from_text(text) {
        let printed = module.display().to_string();
        let again = Module::from_text(&printed).unwrap();
        assert_eq!(again.display().to_string(), printed);
    }
});
