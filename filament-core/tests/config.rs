//! Runtime configuration is process-wide, so everything that changes it lives
//! in this one test binary and runs sequentially in one test.

use std::panic::{catch_unwind, AssertUnwindSafe};

use filament_core::config::{config, configure, RuntimeConfig};
use filament_core::{create_root, effect, signal, ReactiveError};

#[test]
fn configuration_changes_runtime_policy() {
    let original = config();

    // A tighter epoch cap is reported in the error.
    configure(RuntimeConfig::from_json(r#"{ "max_flush_epochs": 5 }"#).unwrap());
    let armed = signal(false);
    let s = signal(0);
    create_root(|_| {
        let (armed, s) = (armed.clone(), s.clone());
        effect(move || {
            if armed.get() {
                let v = s.get();
                s.set(v + 1);
            }
        });
    });
    assert_eq!(
        armed.try_set(true),
        Err(ReactiveError::CyclicUpdate { epochs: 5 })
    );
    armed.set(false);

    // Without panic isolation, a panicking effect unwinds out of `set`.
    configure(RuntimeConfig {
        catch_effect_panics: false,
        ..config()
    });
    let trigger = signal(0);
    create_root(|_| {
        let trigger = trigger.clone();
        effect(move || {
            if trigger.get() > 0 {
                panic!("unisolated");
            }
        });
    });
    let result = catch_unwind(AssertUnwindSafe(|| trigger.set(1)));
    assert!(result.is_err());

    // The scheduler recovered: later writes still flush.
    configure(original);
    let other = signal(0);
    let seen = std::rc::Rc::new(std::cell::Cell::new(0));
    create_root(|_| {
        let (other, seen) = (other.clone(), seen.clone());
        effect(move || seen.set(other.get()));
    });
    other.set(4);
    assert_eq!(seen.get(), 4);
}
