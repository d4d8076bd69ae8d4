//! Complete counter application demonstrating stores, selectors and re-entrant writes

use serde_json::json;
use snapstore::{bind, state_map, StateMap, Store, StoreConfig, SyncedSnapshot};

fn count(state: &StateMap) -> i64 {
    state.get("count").and_then(|v| v.as_i64()).unwrap_or_default()
}

fn step(state: &StateMap) -> i64 {
    state.get("step").and_then(|v| v.as_i64()).unwrap_or(1)
}

fn increment(store: &Store<StateMap>) -> snapstore::Result<()> {
    store.update(|state| state_map(json!({ "count": count(state) + step(state) })))
}

fn decrement(store: &Store<StateMap>) -> snapstore::Result<()> {
    store.update(|state| state_map(json!({ "count": count(state) - step(state) })))
}

fn main() -> snapstore::Result<()> {
    println!("=== Complete Counter Application ===\n");

    println!("1. Initializing counter store");
    let store = Store::with_config(
        state_map(json!({ "count": 0, "step": 1, "max": 12 })),
        StoreConfig::new().with_name("counter"),
    );

    // Every write is visible to every listener.
    store
        .subscribe({
            let store = store.clone();
            move || {
                let state = store.get_state();
                println!("   [State] Count: {}, Step: {}", count(&state), step(&state));
            }
        })
        .detach();

    // Clamp from inside a listener: the correction is queued and applied
    // once the current notification pass completes.
    store
        .subscribe({
            let store = store.clone();
            move || {
                let state = store.get_state();
                let max = state.get("max").and_then(|v| v.as_i64()).unwrap_or(i64::MAX);
                if count(&state) > max {
                    println!("   [Clamp] {} exceeds {}, clamping", count(&state), max);
                    if let Err(err) = store.set_state(state_map(json!({ "count": max }))) {
                        println!("   [Clamp] failed: {}", err);
                    }
                }
            }
        })
        .detach();

    println!("\n2. Deriving display values");
    let _display = SyncedSnapshot::new(
        bind(store.clone(), |state: &StateMap| {
            let n = count(state);
            (n > 0, n % 2 == 0, n.abs())
        }),
        |display| {
            if let Ok(display) = display {
                let (positive, even, abs) = *display;
                println!(
                    "   [Display] Positive: {} | Even: {} | Abs: {}",
                    positive, even, abs
                );
            }
        },
    )
    .unwrap_or_else(|never| match never {});

    println!("\n3. Incrementing...");
    increment(&store)?;
    increment(&store)?;
    increment(&store)?;

    println!("\n4. Changing step size to 5 (display unchanged)");
    store.set_state(state_map(json!({ "step": 5 })))?;

    println!("\n5. Incrementing past the maximum...");
    increment(&store)?;
    increment(&store)?;

    println!("\n6. Decrementing...");
    decrement(&store)?;
    decrement(&store)?;
    decrement(&store)?;

    println!("\n7. Resetting...");
    store.set_state(state_map(json!({ "count": 0, "step": 1 })))?;

    println!("\n   Writes committed: {}", store.version());
    println!("\n✓ Counter application complete!");
    Ok(())
}
