//! Several independent stores resolved through a scope registry

use serde_json::json;
use snapstore::{
    state_map, ScopeRegistry, StateMap, Store, StoreConfig, StoreError, StoreFactory,
    SyncedSnapshot,
};

fn main() -> snapstore::Result<()> {
    println!("=== Scoped Stores ===\n");

    let registry: ScopeRegistry<&str, Store<StateMap>> = ScopeRegistry::new();
    let factory = StoreConfig::new().with_name("panel");

    println!("1. Providing one store per panel");
    let left = registry.provide("left", factory.create(state_map(json!({ "count": 0 }))))?;
    let right = registry.provide("right", factory.create(state_map(json!({ "count": 0 }))))?;

    println!("\n2. Attaching a display to each panel");
    let displays = ["left", "right"]
        .into_iter()
        .map(|scope| -> snapstore::Result<_> {
            let binding = registry.bind(&scope, |state: &StateMap| state["count"].clone())?;
            Ok(
                SyncedSnapshot::new(binding, move |count| {
                    if let Ok(count) = count {
                        println!("   [{}] count = {}", scope, count);
                    }
                })
                .unwrap_or_else(|never| match never {}),
            )
        })
        .collect::<snapstore::Result<Vec<_>>>()?;

    println!("\n3. Writing to the left panel only");
    left.store().set_state(state_map(json!({ "count": 1 })))?;
    left.store().set_state(state_map(json!({ "count": 2 })))?;

    println!("\n4. Writing to the right panel");
    right.store().set_state(state_map(json!({ "count": 10 })))?;

    println!("\n5. Closing the left panel");
    drop(displays);
    drop(left);
    match registry.resolve(&"left") {
        Err(StoreError::NotBound { scope }) => println!("   {} is no longer bound", scope),
        Err(other) => return Err(other),
        Ok(_) => println!("   left is still bound"),
    }

    println!("\n6. A second store cannot take a live scope");
    let intruder = factory.create(state_map(json!({ "count": 99 })));
    if let Err(err) = registry.register("right", intruder) {
        println!("   {}", err);
    }

    println!("\n✓ Scoped stores complete!");
    Ok(())
}
