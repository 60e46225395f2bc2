use tracing::info;

use crate::error::SimResult;
use crate::grid::Grid;
use crate::update::{StepReport, UpdateScheme};

/// Snapshot history of one run. `states[0]` is the initial grid.
#[derive(Debug, Clone)]
pub struct SimulationRun {
    pub states: Vec<Grid>,
    pub reports: Vec<StepReport>,
}

impl SimulationRun {
    pub fn steps(&self) -> usize {
        self.reports.len()
    }

    pub fn final_state(&self) -> &Grid {
        // states always holds at least the initial snapshot
        &self.states[self.states.len() - 1]
    }

    pub fn total_moves(&self) -> usize {
        self.reports.iter().map(StepReport::moved).sum()
    }

    /// First step after which every pedestrian stands still, if any
    pub fn settled_at(&self) -> Option<usize> {
        self.reports
            .iter()
            .position(|r| r.moved() == 0)
            .map(|i| i + 1)
    }

    pub fn summary(&self) -> String {
        let last = self.final_state();
        format!(
            "Steps: {}\n\
             Pedestrians: {}\n\
             Moves accepted: {}\n\
             Pedestrians at target: {}",
            self.steps(),
            last.pedestrians().len(),
            self.total_moves(),
            last.pedestrians_at_target().len()
        )
    }
}

/// Run `n_steps` updates, keeping a deep copy of the grid after each one
pub fn simulate(
    mut grid: Grid,
    scheme: &mut UpdateScheme,
    n_steps: usize,
    report_every: Option<usize>,
    avoid_overlapping: bool,
) -> SimResult<SimulationRun> {
    let mut states = Vec::with_capacity(n_steps + 1);
    let mut reports = Vec::with_capacity(n_steps);
    states.push(grid.clone());

    info!(
        strategy = scheme.strategy().name(),
        n_steps,
        avoid_overlapping,
        pedestrians = grid.pedestrians().len(),
        "starting simulation"
    );

    for step in 0..n_steps {
        let report = scheme.update(&mut grid, avoid_overlapping)?;
        if let Some(every) = report_every.filter(|&e| e > 0) {
            if step % every == 0 {
                info!(step, moved = report.moved(), "simulated step");
            }
        }
        reports.push(report);
        states.push(grid.clone());
    }

    Ok(SimulationRun { states, reports })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost_field::DijkstraCost;
    use crate::grid::{Coordinate, GridBuilder};

    #[test]
    fn test_history_length_and_independence() {
        let grid = GridBuilder::new(1, 6).target((0, 5)).pedestrian((0, 0), 1.0).build().unwrap();
        let mut scheme = UpdateScheme::seeded(Box::new(DijkstraCost), 11);

        let run = simulate(grid, &mut scheme, 7, Some(2), false).unwrap();

        assert_eq!(run.states.len(), 8);
        assert_eq!(run.steps(), 7);
        assert_eq!(run.states[0].pedestrian(10).unwrap().position, Coordinate::new(0, 0));
        assert_eq!(run.states[3].pedestrian(10).unwrap().position, Coordinate::new(0, 3));
        assert_eq!(run.final_state().pedestrians_at_target(), vec![10]);
        assert_eq!(run.total_moves(), 5);
        assert_eq!(run.settled_at(), Some(6));
    }

    #[test]
    fn test_zero_steps_keeps_initial_state() {
        let grid = GridBuilder::new(2, 2).target((0, 0)).pedestrian((1, 1), 1.0).build().unwrap();
        let mut scheme = UpdateScheme::seeded(Box::new(DijkstraCost), 0);
        let run = simulate(grid, &mut scheme, 0, None, true).unwrap();
        assert_eq!(run.states.len(), 1);
        assert!(run.summary().contains("Steps: 0"));
    }
}
