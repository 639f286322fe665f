use std::collections::HashMap;
use std::sync::Arc;

use harvest_exchange::config::GameConfig;
use harvest_exchange::engine::persistence::NullSink;
use harvest_exchange::engine::EngineHandle;

/// A single-product configuration makes starting-inventory generation
/// deterministic regardless of RNG seed: with exactly one product and a
/// zero randomization factor, `generate_starting_inventory` has no choice
/// to make — every participant ends up holding the same quantity.
pub fn deterministic_config(game_duration_seconds: u64) -> GameConfig {
    let products = vec!["bread".to_string()];
    let mut scrap_values = HashMap::new();
    scrap_values.insert("bread".to_string(), 2u64);
    let mut set_recipe = HashMap::new();
    set_recipe.insert("bread".to_string(), 1u64);

    GameConfig {
        game_duration_seconds,
        starting_cash: 100,
        max_players: 8,
        products,
        scrap_values,
        set_value: 10,
        set_recipe,
        starting_inventory_target_total_value: 10,
        starting_inventory_randomization_factor: 0.0,
        min_order_size: 1,
        max_order_size: 100,
        show_order_names: true,
    }
}

pub fn spawn_engine(config: GameConfig) -> EngineHandle {
    harvest_exchange::engine::spawn(config, Arc::new(NullSink))
}
