//! Configuration (§6, Config & RNG ambient component).
//!
//! Layers defaults, an optional TOML file, and environment variables
//! (prefixed `HARVEST_`) through the `config` crate.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::engine::types::Product;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GameConfig {
    pub game_duration_seconds: u64,
    pub starting_cash: u64,
    pub max_players: usize,
    pub products: Vec<Product>,
    pub scrap_values: HashMap<Product, u64>,
    pub set_value: u64,
    pub set_recipe: HashMap<Product, u64>,
    pub starting_inventory_target_total_value: u64,
    pub starting_inventory_randomization_factor: f64,
    pub min_order_size: u64,
    pub max_order_size: u64,
    pub show_order_names: bool,
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.game_duration_seconds == 0 {
            return Err("game_duration_seconds must be positive".into());
        }
        if self.max_players < 2 {
            return Err("max_players must be at least 2".into());
        }
        if self.products.is_empty() {
            return Err("products must not be empty".into());
        }
        for product in &self.products {
            if !self.scrap_values.contains_key(product) {
                return Err(format!("missing scrap_value for product {product}"));
            }
            if !self.set_recipe.contains_key(product) {
                return Err(format!("missing set_recipe entry for product {product}"));
            }
        }
        if self.min_order_size == 0 || self.min_order_size > self.max_order_size {
            return Err("min_order_size must be positive and <= max_order_size".into());
        }
        if !(0.0..1.0).contains(&self.starting_inventory_randomization_factor) {
            return Err("starting_inventory_randomization_factor must be in [0, 1)".into());
        }
        if !self.products.iter().any(|p| self.scrap_values.get(p).copied().unwrap_or(0) > 0) {
            return Err("at least one product must have a positive scrap_value, or starting inventory can never reach its target value".into());
        }
        Ok(())
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        let products: Vec<Product> = ["bread", "veggies", "cheese", "meat"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let scrap_values: HashMap<Product, u64> = [("bread", 2), ("veggies", 4), ("cheese", 6), ("meat", 8)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let set_recipe: HashMap<Product, u64> = products.iter().map(|p| (p.clone(), 1)).collect();

        Self {
            game_duration_seconds: 300,
            starting_cash: 100,
            max_players: 8,
            products,
            scrap_values,
            set_value: 30,
            set_recipe,
            starting_inventory_target_total_value: 40,
            starting_inventory_randomization_factor: 0.2,
            min_order_size: 1,
            max_order_size: 100,
            show_order_names: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            log_filter: "harvest_exchange=debug,tower_http=debug".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    /// Layers defaults, `config/default.toml` (if present), and `HARVEST_`
    /// prefixed environment variables.
    pub fn load() -> anyhow::Result<Self> {
        let defaults = AppConfig::default();

        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&defaults)?)
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("HARVEST").separator("__"));

        let settings: AppConfig = builder.build()?.try_deserialize()?;
        settings.game.validate().map_err(|e| anyhow::anyhow!(e))?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        GameConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_scrap_values_are_rejected() {
        let mut config = GameConfig::default();
        for value in config.scrap_values.values_mut() {
            *value = 0;
        }
        let err = config.validate().unwrap_err();
        assert!(err.contains("scrap_value"), "unexpected error: {err}");
    }
}
