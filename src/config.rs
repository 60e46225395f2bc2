use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::cost_field::{CostStrategy, StrategyKind};
use crate::error::SimResult;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub pedestrians: PedestriansConfig,
    #[serde(default)]
    pub scenario: ScenarioConfig,
    #[serde(default)]
    pub visual: VisualConfig,
}

#[derive(Debug, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_steps")]
    pub steps: usize,
    #[serde(default)]
    pub report_every: Option<usize>,
    #[serde(default)]
    pub avoid_overlapping: bool,
    /// Fixed seed for reproducible runs; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_strategy")]
    pub strategy: StrategyKind,
}

#[derive(Debug, Deserialize)]
pub struct StrategyConfig {
    #[serde(default = "default_r_max")]
    pub r_max: f64,
    #[serde(default = "default_penalty")]
    pub obstacle_penalty: f64,
    #[serde(default = "default_penalty")]
    pub occupied_penalty: f64,
}

#[derive(Debug, Deserialize)]
pub struct PedestriansConfig {
    #[serde(default = "default_speed")]
    pub default_speed: f64,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default = "default_scenario_path")]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct VisualConfig {
    #[serde(default = "default_window_title")]
    pub window_title: String,
    #[serde(default = "default_cell_size")]
    pub cell_size: f32,
    #[serde(default = "default_bg_r")]
    pub background_r: u8,
    #[serde(default = "default_bg_g")]
    pub background_g: u8,
    #[serde(default = "default_bg_b")]
    pub background_b: u8,
    #[serde(default = "default_steps_per_second")]
    pub steps_per_second: f32,
}

// Default values
fn default_steps() -> usize { 50 }
fn default_strategy() -> StrategyKind { StrategyKind::Dijkstra }
fn default_r_max() -> f64 { 2.0 }
fn default_penalty() -> f64 { 1000.0 }
fn default_speed() -> f64 { 1.0 }
fn default_scenario_path() -> String { "scenarios/default.txt".to_string() }
fn default_window_title() -> String { "crowdgrid".to_string() }
fn default_cell_size() -> f32 { 30.0 }
fn default_bg_r() -> u8 { 30 }
fn default_bg_g() -> u8 { 30 }
fn default_bg_b() -> u8 { 30 }
fn default_steps_per_second() -> f32 { 4.0 }

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            report_every: None,
            avoid_overlapping: false,
            seed: None,
            strategy: default_strategy(),
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            r_max: default_r_max(),
            obstacle_penalty: default_penalty(),
            occupied_penalty: default_penalty(),
        }
    }
}

impl Default for PedestriansConfig {
    fn default() -> Self {
        Self {
            default_speed: default_speed(),
        }
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            path: default_scenario_path(),
        }
    }
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            window_title: default_window_title(),
            cell_size: default_cell_size(),
            background_r: default_bg_r(),
            background_g: default_bg_g(),
            background_b: default_bg_b(),
            steps_per_second: default_steps_per_second(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            strategy: StrategyConfig::default(),
            pedestrians: PedestriansConfig::default(),
            scenario: ScenarioConfig::default(),
            visual: VisualConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from config.toml, or use defaults if it is missing or broken
    pub fn load() -> Self {
        match Self::load_from("config.toml") {
            Ok(config) => {
                info!("Loaded configuration from config.toml");
                config
            }
            Err(crate::error::SimError::Io(_)) => {
                info!("No config.toml found, using default configuration");
                Config::default()
            }
            Err(e) => {
                warn!("Failed to parse config.toml: {}; using default configuration", e);
                Config::default()
            }
        }
    }

    pub fn load_from(path: impl AsRef<Path>) -> SimResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> SimResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Cost strategy selected by `[simulation] strategy`, parameterised by `[strategy]`
    pub fn build_strategy(&self) -> SimResult<Box<dyn CostStrategy>> {
        self.simulation.strategy.build(
            self.strategy.r_max,
            self.strategy.occupied_penalty,
            self.strategy.obstacle_penalty,
        )
    }
}
