use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tracing::debug;

use crate::cost_field::{CostField, CostStrategy};
use crate::error::{SimError, SimResult};
use crate::grid::{Coordinate, Grid, Pedestrian, PedestrianId};

/// Movement candidates relative to the current cell, in tie-break order:
/// stay, N, S, W, E, NW, SE, NE, SW.
pub const MOVE_OFFSETS: [(i32, i32); 9] = [
    (0, 0),
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (1, 1),
    (-1, 1),
    (1, -1),
];

/// Outcome of one pedestrian's decision within a step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveRecord {
    pub id: PedestrianId,
    pub from: Coordinate,
    /// Lowest-cost candidate
    pub chosen: Coordinate,
    /// Where the pedestrian ended the step
    pub to: Coordinate,
    pub accepted: bool,
}

impl MoveRecord {
    pub fn moved(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub moves: Vec<MoveRecord>,
}

impl StepReport {
    pub fn moved(&self) -> usize {
        self.moves.iter().filter(|m| m.moved()).count()
    }

    pub fn stayed(&self) -> usize {
        self.moves.len() - self.moved()
    }
}

/// Lowest-cost cell among the current cell and its in-bounds Moore neighbours.
///
/// Obstacles are never candidates. With `avoid_overlapping` set, cells where any
/// other pedestrian stands are skipped too. The first minimum in [`MOVE_OFFSETS`] order wins.
pub fn best_candidate(
    grid: &Grid,
    costs: &CostField,
    id: PedestrianId,
    from: Coordinate,
    avoid_overlapping: bool,
) -> Coordinate {
    best_candidate_by(grid, id, from, avoid_overlapping, |c| {
        costs.get(c).unwrap_or(f64::INFINITY)
    })
}

fn best_candidate_by(
    grid: &Grid,
    id: PedestrianId,
    from: Coordinate,
    avoid_overlapping: bool,
    cost_of: impl Fn(Coordinate) -> f64,
) -> Coordinate {
    let mut best = from;
    let mut best_cost = cost_of(from);

    for &(dr, dc) in MOVE_OFFSETS.iter().skip(1) {
        let candidate = from.offset(dr, dc);
        if !grid.contains(candidate) || grid.is_obstacle(candidate) {
            continue;
        }
        if avoid_overlapping && grid.occupants(candidate).any(|other| other != id) {
            continue;
        }
        let cost = cost_of(candidate);
        if cost < best_cost {
            best = candidate;
            best_cost = cost;
        }
    }

    best
}

/// Bernoulli trial gating a move of length `d` for a pedestrian of the given speed
pub fn accept_move(speed: f64, d: f64, rng: &mut dyn RngCore) -> bool {
    if d == 0.0 {
        return true;
    }
    if speed <= 0.0 {
        return false;
    }
    let u: f64 = rng.gen();
    u <= speed / d
}

/// Drives one simulation step: cost field, per-pedestrian choice, commit.
pub struct UpdateScheme {
    strategy: Box<dyn CostStrategy>,
    rng: StdRng,
}

impl UpdateScheme {
    pub fn new(strategy: Box<dyn CostStrategy>, rng: StdRng) -> Self {
        UpdateScheme { strategy, rng }
    }

    pub fn seeded(strategy: Box<dyn CostStrategy>, seed: u64) -> Self {
        Self::new(strategy, StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy(strategy: Box<dyn CostStrategy>) -> Self {
        Self::new(strategy, StdRng::from_entropy())
    }

    pub fn strategy(&self) -> &dyn CostStrategy {
        self.strategy.as_ref()
    }

    /// Current cost field for the grid, drawing from this scheme's random source
    pub fn costs(&mut self, grid: &Grid) -> CostField {
        self.strategy.get_costs(grid, &mut self.rng)
    }

    pub fn update(&mut self, grid: &mut Grid, avoid_overlapping: bool) -> SimResult<StepReport> {
        if avoid_overlapping {
            self.update_sequential(grid)
        } else {
            self.update_synchronous(grid)
        }
    }

    fn decide(
        &mut self,
        grid: &Grid,
        costs: &CostField,
        id: PedestrianId,
        pedestrian: &Pedestrian,
        avoid_overlapping: bool,
    ) -> MoveRecord {
        let from = pedestrian.position;
        let strategy = self.strategy.as_ref();
        let chosen = best_candidate_by(grid, id, from, avoid_overlapping, |c| match costs.get(c) {
            Some(cost) => cost - strategy.own_share(grid, id, from, c),
            None => f64::INFINITY,
        });
        let d = from.distance(&chosen);
        let accepted = accept_move(pedestrian.speed, d, &mut self.rng);
        let to = if accepted { chosen } else { from };

        debug!(
            id,
            from = %from,
            chosen = %chosen,
            accepted,
            "pedestrian decision"
        );

        MoveRecord {
            id,
            from,
            chosen,
            to,
            accepted,
        }
    }

    /// Every pedestrian decides against the same pre-step field; positions are
    /// committed in one bulk replace. Colliding choices are not resolved.
    fn update_synchronous(&mut self, grid: &mut Grid) -> SimResult<StepReport> {
        let costs = self.costs(grid);

        let mut report = StepReport::default();
        let mut next = BTreeMap::new();
        for (&id, pedestrian) in grid.pedestrians() {
            let record = self.decide(grid, &costs, id, pedestrian, false);
            next.insert(id, Pedestrian::new(record.to, pedestrian.speed));
            report.moves.push(record);
        }

        grid.replace_all_pedestrians(next)?;
        Ok(report)
    }

    /// Pedestrians move one at a time in id order, each seeing a freshly
    /// computed field that already reflects earlier moves in this step.
    fn update_sequential(&mut self, grid: &mut Grid) -> SimResult<StepReport> {
        let ids: Vec<PedestrianId> = grid.pedestrians().keys().copied().collect();

        let mut report = StepReport::default();
        for id in ids {
            let pedestrian = *grid.pedestrian(id).ok_or(SimError::UnknownPedestrian(id))?;
            let costs = self.costs(grid);
            let record = self.decide(grid, &costs, id, &pedestrian, true);
            if record.moved() {
                grid.replace_one_pedestrian(id, record.to)?;
            }
            report.moves.push(record);
        }

        Ok(report)
    }
}
