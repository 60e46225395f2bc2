use std::collections::VecDeque;
use std::ops::Index;

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SimError, SimResult};
use crate::grid::{Coordinate, Grid, PedestrianId};

/// Cost given to cells the flood fill cannot reach
pub const UNREACHABLE: f64 = f64::INFINITY;

pub const DEFAULT_OBSTACLE_PENALTY: f64 = 1000.0;
pub const DEFAULT_OCCUPIED_PENALTY: f64 = 1000.0;

/// Per-cell traversal cost, row-major, same shape as the grid it was computed from
#[derive(Debug, Clone, PartialEq)]
pub struct CostField {
    rows: i32,
    columns: i32,
    values: Vec<f64>,
}

impl CostField {
    pub fn filled(rows: i32, columns: i32, value: f64) -> Self {
        CostField {
            rows,
            columns,
            values: vec![value; rows.max(0) as usize * columns.max(0) as usize],
        }
    }

    pub fn rows(&self) -> i32 {
        self.rows
    }

    pub fn columns(&self) -> i32 {
        self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    fn index_of(&self, coordinate: Coordinate) -> Option<usize> {
        if coordinate.row < 0
            || coordinate.row >= self.rows
            || coordinate.col < 0
            || coordinate.col >= self.columns
        {
            return None;
        }
        Some((coordinate.row * self.columns + coordinate.col) as usize)
    }

    /// Cost at a coordinate, `None` outside the field
    pub fn get(&self, coordinate: Coordinate) -> Option<f64> {
        self.index_of(coordinate).map(|i| self.values[i])
    }

    fn set(&mut self, coordinate: Coordinate, value: f64) {
        if let Some(i) = self.index_of(coordinate) {
            self.values[i] = value;
        }
    }

    fn add(&mut self, coordinate: Coordinate, value: f64) {
        if let Some(i) = self.index_of(coordinate) {
            self.values[i] += value;
        }
    }
}

impl Index<Coordinate> for CostField {
    type Output = f64;

    fn index(&self, coordinate: Coordinate) -> &f64 {
        let i = self
            .index_of(coordinate)
            .unwrap_or_else(|| panic!("coordinate {} outside cost field", coordinate));
        &self.values[i]
    }
}

/// A way of turning the current grid into a field of movement costs.
///
/// Lower cost attracts pedestrians. Implementations never mutate the grid; the
/// random source is only consumed by strategies that need it.
pub trait CostStrategy {
    fn name(&self) -> &'static str;

    fn get_costs(&self, grid: &Grid, rng: &mut dyn RngCore) -> CostField;

    /// Part of the cost at `cell` that comes from pedestrian `id` itself standing on `at`.
    /// Subtracted before the pedestrian picks a move so it is not pushed away by its own presence.
    fn own_share(
        &self,
        _grid: &Grid,
        _id: PedestrianId,
        _at: Coordinate,
        _cell: Coordinate,
    ) -> f64 {
        0.0
    }
}

/// Independent uniform draw in [0, 1) per cell
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCost;

impl CostStrategy for RandomCost {
    fn name(&self) -> &'static str {
        "random"
    }

    fn get_costs(&self, grid: &Grid, rng: &mut dyn RngCore) -> CostField {
        let mut field = CostField::filled(grid.rows(), grid.columns(), 0.0);
        for value in field.values.iter_mut() {
            *value = rng.gen::<f64>();
        }
        field
    }
}

/// Straight-line distance to the target
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanCost;

fn euclidean_field(grid: &Grid) -> CostField {
    let target = grid.target();
    let mut field = CostField::filled(grid.rows(), grid.columns(), 0.0);
    for coordinate in grid.coordinates() {
        field.set(coordinate, coordinate.distance(&target));
    }
    field
}

impl CostStrategy for EuclideanCost {
    fn name(&self) -> &'static str {
        "euclidean"
    }

    fn get_costs(&self, grid: &Grid, _rng: &mut dyn RngCore) -> CostField {
        euclidean_field(grid)
    }
}

/// Hop count from the target over the 4-connected graph of non-obstacle cells
#[derive(Debug, Clone, Copy, Default)]
pub struct DijkstraCost;

/// Von Neumann neighbours inside the grid
pub fn von_neumann_neighbours(grid: &Grid, c: Coordinate) -> impl Iterator<Item = Coordinate> + '_ {
    [(-1, 0), (1, 0), (0, -1), (0, 1)]
        .into_iter()
        .map(move |(dr, dc)| c.offset(dr, dc))
        .filter(move |n| grid.contains(*n))
}

impl CostStrategy for DijkstraCost {
    fn name(&self) -> &'static str {
        "dijkstra"
    }

    fn get_costs(&self, grid: &Grid, _rng: &mut dyn RngCore) -> CostField {
        let mut field = CostField::filled(grid.rows(), grid.columns(), UNREACHABLE);
        let mut queue = VecDeque::new();

        field.set(grid.target(), 0.0);
        queue.push_back(grid.target());

        let mut expansions = 0usize;
        while let Some(c) = queue.pop_front() {
            expansions += 1;
            let next = field[c] + 1.0;
            for n in von_neumann_neighbours(grid, c) {
                if grid.is_obstacle(n) {
                    continue;
                }
                // Only propagate strict improvements
                if next < field[n] {
                    field.set(n, next);
                    queue.push_back(n);
                }
            }
        }

        debug!(expansions, "flood fill finished");
        field
    }
}

/// `exp(1 / (r² - r_max²))` for `r < r_max`, zero beyond
pub fn repulsion(r: f64, r_max: f64) -> f64 {
    if r < r_max {
        (1.0 / (r * r - r_max * r_max)).exp()
    } else {
        0.0
    }
}

fn check_r_max(r_max: f64) -> SimResult<()> {
    if r_max.is_finite() && r_max > 0.0 {
        Ok(())
    } else {
        Err(SimError::invalid(format!(
            "r_max must be a positive number, got {}",
            r_max
        )))
    }
}

/// Euclidean base plus repulsion and the occupied-cell penalty. With `obstacle_penalty`
/// set, obstacle cells take that flat value instead.
fn interactive_field(
    grid: &Grid,
    r_max: f64,
    occupied_penalty: f64,
    obstacle_penalty: Option<f64>,
) -> CostField {
    let mut field = euclidean_field(grid);
    for coordinate in grid.coordinates() {
        if let Some(penalty) = obstacle_penalty {
            if grid.is_obstacle(coordinate) {
                field.set(coordinate, penalty);
                continue;
            }
        }
        for pedestrian in grid.pedestrians().values() {
            let r = coordinate.distance(&pedestrian.position);
            field.add(coordinate, repulsion(r, r_max));
        }
        if grid.is_occupied(coordinate) {
            field.add(coordinate, occupied_penalty);
        }
    }
    field
}

/// Repulsion `id` exerts on `cell` from `at`, plus the occupied penalty on `at` when
/// nobody else shares it. Obstacles under a flat penalty carry no share.
fn interactive_own_share(
    grid: &Grid,
    id: PedestrianId,
    at: Coordinate,
    cell: Coordinate,
    r_max: f64,
    occupied_penalty: f64,
    flat_obstacles: bool,
) -> f64 {
    if flat_obstacles && grid.is_obstacle(cell) {
        return 0.0;
    }
    let mut share = repulsion(cell.distance(&at), r_max);
    if cell == at && grid.occupants(at).all(|other| other == id) {
        share += occupied_penalty;
    }
    share
}

/// Euclidean distance plus short-range repulsion from nearby pedestrians.
///
/// NOTE: the repulsion term is kept exactly as `exp(1 / (r² - r_max²))`. It peaks at
/// `exp(-1 / r_max²)` on the pedestrian itself and fades to zero towards `r_max`, so it
/// is weak; the occupied-cell penalty does most of the work of keeping people apart.
#[derive(Debug, Clone, Copy)]
pub struct EuclideanInteractiveCost {
    r_max: f64,
    occupied_penalty: f64,
}

impl EuclideanInteractiveCost {
    pub fn new(r_max: f64) -> SimResult<Self> {
        check_r_max(r_max)?;
        Ok(EuclideanInteractiveCost {
            r_max,
            occupied_penalty: DEFAULT_OCCUPIED_PENALTY,
        })
    }

    pub fn with_occupied_penalty(mut self, penalty: f64) -> Self {
        self.occupied_penalty = penalty;
        self
    }

    pub fn r_max(&self) -> f64 {
        self.r_max
    }
}

impl CostStrategy for EuclideanInteractiveCost {
    fn name(&self) -> &'static str {
        "euclidean_interactive"
    }

    fn get_costs(&self, grid: &Grid, _rng: &mut dyn RngCore) -> CostField {
        interactive_field(grid, self.r_max, self.occupied_penalty, None)
    }

    fn own_share(&self, grid: &Grid, id: PedestrianId, at: Coordinate, cell: Coordinate) -> f64 {
        interactive_own_share(grid, id, at, cell, self.r_max, self.occupied_penalty, false)
    }
}

/// [`EuclideanInteractiveCost`] with a flat penalty on obstacle cells
#[derive(Debug, Clone, Copy)]
pub struct EuclideanObstacleAvoidingCost {
    r_max: f64,
    occupied_penalty: f64,
    obstacle_penalty: f64,
}

impl EuclideanObstacleAvoidingCost {
    pub fn new(r_max: f64) -> SimResult<Self> {
        check_r_max(r_max)?;
        Ok(EuclideanObstacleAvoidingCost {
            r_max,
            occupied_penalty: DEFAULT_OCCUPIED_PENALTY,
            obstacle_penalty: DEFAULT_OBSTACLE_PENALTY,
        })
    }

    pub fn with_occupied_penalty(mut self, penalty: f64) -> Self {
        self.occupied_penalty = penalty;
        self
    }

    pub fn with_obstacle_penalty(mut self, penalty: f64) -> Self {
        self.obstacle_penalty = penalty;
        self
    }

    pub fn r_max(&self) -> f64 {
        self.r_max
    }
}

impl CostStrategy for EuclideanObstacleAvoidingCost {
    fn name(&self) -> &'static str {
        "euclidean_obstacle_avoiding"
    }

    fn get_costs(&self, grid: &Grid, _rng: &mut dyn RngCore) -> CostField {
        interactive_field(
            grid,
            self.r_max,
            self.occupied_penalty,
            Some(self.obstacle_penalty),
        )
    }

    fn own_share(&self, grid: &Grid, id: PedestrianId, at: Coordinate, cell: Coordinate) -> f64 {
        interactive_own_share(grid, id, at, cell, self.r_max, self.occupied_penalty, true)
    }
}

/// Strategy selector as it appears in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Random,
    Euclidean,
    Dijkstra,
    EuclideanInteractive,
    EuclideanObstacleAvoiding,
}

impl StrategyKind {
    pub fn build(
        self,
        r_max: f64,
        occupied_penalty: f64,
        obstacle_penalty: f64,
    ) -> SimResult<Box<dyn CostStrategy>> {
        Ok(match self {
            StrategyKind::Random => Box::new(RandomCost),
            StrategyKind::Euclidean => Box::new(EuclideanCost),
            StrategyKind::Dijkstra => Box::new(DijkstraCost),
            StrategyKind::EuclideanInteractive => Box::new(
                EuclideanInteractiveCost::new(r_max)?.with_occupied_penalty(occupied_penalty),
            ),
            StrategyKind::EuclideanObstacleAvoiding => Box::new(
                EuclideanObstacleAvoidingCost::new(r_max)?
                    .with_occupied_penalty(occupied_penalty)
                    .with_obstacle_penalty(obstacle_penalty),
            ),
        })
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(StrategyKind::Random),
            "euclidean" => Ok(StrategyKind::Euclidean),
            "dijkstra" => Ok(StrategyKind::Dijkstra),
            "euclidean_interactive" => Ok(StrategyKind::EuclideanInteractive),
            "euclidean_obstacle_avoiding" => Ok(StrategyKind::EuclideanObstacleAvoiding),
            other => Err(SimError::invalid(format!("unknown strategy '{}'", other))),
        }
    }
}
