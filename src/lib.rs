pub mod config;
pub mod cost_field;
pub mod error;
pub mod grid;
pub mod scenario;
pub mod simulator;
pub mod update;

pub use config::Config;
pub use cost_field::{
    CostField, CostStrategy, DijkstraCost, EuclideanCost, EuclideanInteractiveCost,
    EuclideanObstacleAvoidingCost, RandomCost, StrategyKind, UNREACHABLE,
};
pub use error::{SimError, SimResult};
pub use grid::{CellKind, CellState, Coordinate, Grid, GridBuilder, Pedestrian, PedestrianId};
pub use scenario::Scenario;
pub use simulator::{simulate, SimulationRun};
pub use update::{StepReport, UpdateScheme};
