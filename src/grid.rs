use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Pedestrian identity. Allocated from [`FIRST_PEDESTRIAN_ID`] upward in construction order.
pub type PedestrianId = u32;

/// Identities start above the terrain codes so [`CellState::code`] stays unambiguous.
pub const FIRST_PEDESTRIAN_ID: PedestrianId = 10;

/// A cell on the grid, addressed as (row, column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    pub row: i32,
    pub col: i32,
}

impl Coordinate {
    pub const fn new(row: i32, col: i32) -> Self {
        Coordinate { row, col }
    }

    pub fn offset(&self, d_row: i32, d_col: i32) -> Self {
        Coordinate::new(self.row + d_row, self.col + d_col)
    }

    pub fn distance_squared(&self, other: &Coordinate) -> i32 {
        let dr = self.row - other.row;
        let dc = self.col - other.col;
        dr * dr + dc * dc
    }

    /// Straight-line distance between cell indices
    pub fn distance(&self, other: &Coordinate) -> f64 {
        (self.distance_squared(other) as f64).sqrt()
    }
}

impl From<(i32, i32)> for Coordinate {
    fn from((row, col): (i32, i32)) -> Self {
        Coordinate::new(row, col)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Static terrain of a cell. Fixed for the lifetime of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    Empty,
    Obstacle,
    Target,
}

/// What a cell holds right now: its terrain, or the pedestrian standing on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Empty,
    Obstacle,
    Target,
    Pedestrian(PedestrianId),
}

impl CellState {
    /// Single-integer encoding: 0 = empty, 2 = obstacle, 3 = target, otherwise the pedestrian id
    pub fn code(&self) -> u32 {
        match self {
            CellState::Empty => 0,
            CellState::Obstacle => 2,
            CellState::Target => 3,
            CellState::Pedestrian(id) => *id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pedestrian {
    pub position: Coordinate,
    /// Expected cells per step; constant for the pedestrian's lifetime
    pub speed: f64,
}

impl Pedestrian {
    pub fn new(position: Coordinate, speed: f64) -> Self {
        Pedestrian { position, speed }
    }
}

/// Collects the initial layout and validates it in [`GridBuilder::build`]
#[derive(Debug, Clone, Default)]
pub struct GridBuilder {
    rows: i32,
    columns: i32,
    obstacles: Vec<Coordinate>,
    targets: Vec<Coordinate>,
    pedestrians: Vec<(Coordinate, f64)>,
}

impl GridBuilder {
    pub fn new(rows: i32, columns: i32) -> Self {
        GridBuilder {
            rows,
            columns,
            ..Default::default()
        }
    }

    pub fn obstacle(mut self, coordinate: impl Into<Coordinate>) -> Self {
        self.obstacles.push(coordinate.into());
        self
    }

    pub fn obstacles<I, C>(mut self, coordinates: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Coordinate>,
    {
        self.obstacles.extend(coordinates.into_iter().map(Into::into));
        self
    }

    pub fn target(mut self, coordinate: impl Into<Coordinate>) -> Self {
        self.targets.push(coordinate.into());
        self
    }

    pub fn pedestrian(mut self, coordinate: impl Into<Coordinate>, speed: f64) -> Self {
        self.pedestrians.push((coordinate.into(), speed));
        self
    }

    pub fn build(self) -> SimResult<Grid> {
        if self.rows <= 0 || self.columns <= 0 {
            return Err(SimError::invalid(format!(
                "grid dimensions must be positive, got {}x{}",
                self.rows, self.columns
            )));
        }

        let target = match self.targets.as_slice() {
            [target] => *target,
            [] => return Err(SimError::invalid("grid has no target")),
            many => {
                return Err(SimError::invalid(format!(
                    "grid must have exactly one target, got {}",
                    many.len()
                )))
            }
        };

        let cell_count = self
            .rows
            .checked_mul(self.columns)
            .ok_or_else(|| {
                SimError::invalid(format!(
                    "grid of {}x{} cells is too large",
                    self.rows, self.columns
                ))
            })?;

        let mut grid = Grid {
            rows: self.rows,
            columns: self.columns,
            cells: vec![CellKind::Empty; cell_count as usize],
            target,
            obstacles: Vec::new(),
            occupancy: HashMap::new(),
            pedestrians: BTreeMap::new(),
            revision: 0,
        };

        grid.check_bounds(target)?;
        let target_id = grid.get_id(target);
        grid.cells[target_id] = CellKind::Target;

        for obstacle in self.obstacles {
            grid.check_bounds(obstacle)?;
            let id = grid.get_id(obstacle);
            match grid.cells[id] {
                CellKind::Target => {
                    return Err(SimError::invalid(format!(
                        "obstacle {} overlaps the target",
                        obstacle
                    )))
                }
                // Repeated obstacle entries collapse into one
                CellKind::Obstacle => {}
                CellKind::Empty => {
                    grid.cells[id] = CellKind::Obstacle;
                    grid.obstacles.push(obstacle);
                }
            }
        }

        // Initial overlap between pedestrians is tolerated; the later id owns the cell.
        let mut next_id = FIRST_PEDESTRIAN_ID;
        for (position, speed) in self.pedestrians {
            grid.check_bounds(position)?;
            match grid.cells[grid.get_id(position)] {
                CellKind::Obstacle => return Err(SimError::BlockedCell(position)),
                CellKind::Target => {
                    return Err(SimError::invalid(format!(
                        "pedestrian placed on the target {}",
                        position
                    )))
                }
                CellKind::Empty => {}
            }
            if !speed.is_finite() || speed < 0.0 {
                return Err(SimError::invalid(format!(
                    "pedestrian at {} has invalid speed {}",
                    position, speed
                )));
            }
            grid.pedestrians.insert(next_id, Pedestrian::new(position, speed));
            grid.occupy(position, next_id);
            next_id += 1;
        }

        Ok(grid)
    }
}

/// Grid state: static terrain plus the pedestrian population
#[derive(Debug, Clone)]
pub struct Grid {
    rows: i32,
    columns: i32,
    cells: Vec<CellKind>,
    target: Coordinate,
    obstacles: Vec<Coordinate>,
    /// Everyone standing on a cell; more than one id only after a collision or a
    /// duplicate initial position
    occupancy: HashMap<Coordinate, BTreeSet<PedestrianId>>,
    pedestrians: BTreeMap<PedestrianId, Pedestrian>,
    /// Incremented whenever pedestrian positions are rewritten
    revision: u64,
}

impl Grid {
    /// Build a grid from the initial layout
    pub fn new(
        rows: i32,
        columns: i32,
        pedestrians: &[(Coordinate, f64)],
        obstacles: &[Coordinate],
        target: Coordinate,
    ) -> SimResult<Self> {
        let mut builder = GridBuilder::new(rows, columns)
            .obstacles(obstacles.iter().copied())
            .target(target);
        for &(position, speed) in pedestrians {
            builder = builder.pedestrian(position, speed);
        }
        builder.build()
    }

    pub fn builder(rows: i32, columns: i32) -> GridBuilder {
        GridBuilder::new(rows, columns)
    }

    pub fn rows(&self) -> i32 {
        self.rows
    }

    pub fn columns(&self) -> i32 {
        self.columns
    }

    pub fn target(&self) -> Coordinate {
        self.target
    }

    pub fn obstacles(&self) -> &[Coordinate] {
        &self.obstacles
    }

    pub fn pedestrians(&self) -> &BTreeMap<PedestrianId, Pedestrian> {
        &self.pedestrians
    }

    pub fn pedestrian(&self, id: PedestrianId) -> Option<&Pedestrian> {
        self.pedestrians.get(&id)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn contains(&self, coordinate: Coordinate) -> bool {
        coordinate.row >= 0
            && coordinate.row < self.rows
            && coordinate.col >= 0
            && coordinate.col < self.columns
    }

    /// Row-major index of an in-bounds coordinate
    pub fn get_id(&self, coordinate: Coordinate) -> usize {
        (coordinate.row * self.columns + coordinate.col) as usize
    }

    /// Inverse of [`Grid::get_id`]
    pub fn get_coords(&self, id: usize) -> Coordinate {
        let id = id as i32;
        Coordinate::new(id / self.columns, id % self.columns)
    }

    /// All cells in row-major order
    pub fn coordinates(&self) -> impl Iterator<Item = Coordinate> + '_ {
        (0..self.cells.len()).map(move |id| self.get_coords(id))
    }

    fn check_bounds(&self, coordinate: Coordinate) -> SimResult<()> {
        if self.contains(coordinate) {
            Ok(())
        } else {
            Err(SimError::OutOfBounds {
                coordinate,
                rows: self.rows,
                columns: self.columns,
            })
        }
    }

    /// Terrain of a cell, ignoring pedestrians
    pub fn kind(&self, coordinate: Coordinate) -> SimResult<CellKind> {
        self.check_bounds(coordinate)?;
        Ok(self.cells[self.get_id(coordinate)])
    }

    pub fn classify(&self, coordinate: Coordinate) -> SimResult<CellState> {
        let kind = self.kind(coordinate)?;
        if let Some(id) = self.occupant(coordinate) {
            return Ok(CellState::Pedestrian(id));
        }
        Ok(match kind {
            CellKind::Empty => CellState::Empty,
            CellKind::Obstacle => CellState::Obstacle,
            CellKind::Target => CellState::Target,
        })
    }

    /// Out-of-bounds cells count as not being obstacles
    pub fn is_obstacle(&self, coordinate: Coordinate) -> bool {
        self.contains(coordinate) && self.cells[self.get_id(coordinate)] == CellKind::Obstacle
    }

    pub fn is_occupied(&self, coordinate: Coordinate) -> bool {
        self.occupancy.contains_key(&coordinate)
    }

    /// Largest id standing on the cell
    pub fn occupant(&self, coordinate: Coordinate) -> Option<PedestrianId> {
        self.occupancy
            .get(&coordinate)
            .and_then(|ids| ids.iter().next_back().copied())
    }

    /// Every id standing on the cell, ascending
    pub fn occupants(&self, coordinate: Coordinate) -> impl Iterator<Item = PedestrianId> + '_ {
        self.occupancy
            .get(&coordinate)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }

    fn occupy(&mut self, coordinate: Coordinate, id: PedestrianId) {
        self.occupancy.entry(coordinate).or_default().insert(id);
    }

    fn vacate(&mut self, coordinate: Coordinate, id: PedestrianId) {
        if let Some(ids) = self.occupancy.get_mut(&coordinate) {
            ids.remove(&id);
            if ids.is_empty() {
                self.occupancy.remove(&coordinate);
            }
        }
    }

    /// Pedestrians currently standing on the target cell
    pub fn pedestrians_at_target(&self) -> Vec<PedestrianId> {
        self.pedestrians
            .iter()
            .filter(|(_, p)| p.position == self.target)
            .map(|(&id, _)| id)
            .collect()
    }

    fn check_walkable(&self, coordinate: Coordinate) -> SimResult<()> {
        self.check_bounds(coordinate)?;
        if self.cells[self.get_id(coordinate)] == CellKind::Obstacle {
            return Err(SimError::BlockedCell(coordinate));
        }
        Ok(())
    }

    /// Swap in a whole new population. Nothing is mutated unless every position is valid.
    ///
    /// Pedestrians sharing a cell are all recorded there; the one with the larger id is
    /// the occupant reported by [`Grid::classify`].
    pub fn replace_all_pedestrians(
        &mut self,
        pedestrians: BTreeMap<PedestrianId, Pedestrian>,
    ) -> SimResult<()> {
        for pedestrian in pedestrians.values() {
            self.check_walkable(pedestrian.position)?;
        }

        self.occupancy.clear();
        for (&id, pedestrian) in &pedestrians {
            self.occupy(pedestrian.position, id);
        }
        self.pedestrians = pedestrians;
        self.revision += 1;
        Ok(())
    }

    /// Move a single pedestrian, leaving everyone else untouched
    pub fn replace_one_pedestrian(&mut self, id: PedestrianId, to: Coordinate) -> SimResult<()> {
        let from = self
            .pedestrians
            .get(&id)
            .map(|p| p.position)
            .ok_or(SimError::UnknownPedestrian(id))?;
        self.check_walkable(to)?;

        self.vacate(from, id);
        self.occupy(to, id);
        if let Some(pedestrian) = self.pedestrians.get_mut(&id) {
            pedestrian.position = to;
        }
        self.revision += 1;
        Ok(())
    }

    /// Text rendering: `■` obstacle, `T` target, `o` pedestrian, `@` pedestrian on target, `□` empty
    pub fn to_ascii(&self) -> String {
        let mut result = String::new();
        for row in 0..self.rows {
            for col in 0..self.columns {
                let coordinate = Coordinate::new(row, col);
                let kind = self.cells[self.get_id(coordinate)];
                let symbol = match (kind, self.is_occupied(coordinate)) {
                    (CellKind::Target, true) => '@',
                    (_, true) => 'o',
                    (CellKind::Obstacle, false) => '■',
                    (CellKind::Target, false) => 'T',
                    (CellKind::Empty, false) => '□',
                };
                result.push(symbol);
            }
            result.push('\n');
        }
        result
    }
}
