use thiserror::Error;

use crate::grid::{Coordinate, PedestrianId};

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Coordinate {coordinate} is outside the {rows}x{columns} grid")]
    OutOfBounds {
        coordinate: Coordinate,
        rows: i32,
        columns: i32,
    },

    #[error("Unknown pedestrian: {0}")]
    UnknownPedestrian(PedestrianId),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Cell {0} is an obstacle")]
    BlockedCell(Coordinate),

    #[error("Scenario parse error at line {line}: {reason}")]
    Scenario { line: usize, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SimError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        SimError::InvalidConfiguration(reason.into())
    }
}

pub type SimResult<T> = Result<T, SimError>;
