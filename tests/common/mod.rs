#![allow(dead_code)]

use crowdgrid::{Coordinate, CostField, Grid, Scenario};
use std::fs;
use std::path::{Path, PathBuf};

/// 5x6 grid with target (3, 5), obstacle (2, 3), pedestrians at (1, 0) and (0, 1)
pub fn reference_grid() -> Grid {
    Grid::new(
        5,
        6,
        &[(Coordinate::new(1, 0), 1.0), (Coordinate::new(0, 1), 1.0)],
        &[Coordinate::new(2, 3)],
        Coordinate::new(3, 5),
    )
    .expect("reference grid is valid")
}

/// Build a grid from a character map (see `Scenario::from_ascii`)
pub fn grid_from_map(map: &str, speed: f64) -> Grid {
    Scenario::from_ascii(map)
        .and_then(|s| s.build_grid(speed))
        .expect("test map is valid")
}

/// Render a cost field with fixed-width cells; unreachable cells print as `inf`
pub fn visualize_costs(costs: &CostField) -> String {
    let mut result = String::new();
    for row in 0..costs.rows() {
        for col in 0..costs.columns() {
            let value = costs[Coordinate::new(row, col)];
            if value.is_infinite() {
                result.push_str("  inf");
            } else {
                result.push_str(&format!("{:5.1}", value));
            }
        }
        result.push('\n');
    }
    result
}

/// No two pedestrians share a cell
pub fn has_no_overlap(grid: &Grid) -> bool {
    let mut seen = std::collections::HashSet::new();
    grid.pedestrians().values().all(|p| seen.insert(p.position))
}

/// Scenario files under ./test_data/scenarios, sorted by name
pub fn scenario_files() -> Vec<PathBuf> {
    let dir = Path::new("./test_data/scenarios");
    let mut files: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}
