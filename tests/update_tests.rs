mod common;

use common::{grid_from_map, has_no_overlap, reference_grid};
use crowdgrid::{
    Coordinate, CostStrategy, DijkstraCost, EuclideanCost, EuclideanInteractiveCost,
    EuclideanObstacleAvoidingCost, GridBuilder, RandomCost, UpdateScheme,
};

const CROWD: &str = "\
oooo......
oooo..#...
oooo..#..T
oooo..#...
oooo......
";

fn strategies() -> Vec<Box<dyn CostStrategy>> {
    vec![
        Box::new(RandomCost),
        Box::new(EuclideanCost),
        Box::new(DijkstraCost),
        Box::new(EuclideanInteractiveCost::new(2.0).unwrap()),
        Box::new(EuclideanObstacleAvoidingCost::new(2.0).unwrap()),
    ]
}

#[test]
fn test_overlap_avoiding_mode_never_overlaps() {
    for strategy in strategies() {
        let name = strategy.name();
        let mut grid = grid_from_map(CROWD, 1.0);
        let mut scheme = UpdateScheme::seeded(strategy, 5);
        assert!(has_no_overlap(&grid));

        for step in 0..30 {
            scheme.update(&mut grid, true).unwrap();
            assert!(has_no_overlap(&grid), "{} overlapped at step {}", name, step);
            assert_eq!(grid.pedestrians().len(), 20);
        }
    }
}

#[test]
fn test_pedestrians_never_enter_obstacles() {
    for avoid_overlapping in [false, true] {
        let mut grid = grid_from_map(CROWD, 1.0);
        let mut scheme = UpdateScheme::seeded(Box::new(EuclideanCost), 9);
        for _ in 0..30 {
            scheme.update(&mut grid, avoid_overlapping).unwrap();
            assert!(grid.pedestrians().values().all(|p| !grid.is_obstacle(p.position)));
        }
    }
}

#[test]
fn test_zero_speed_never_moves() {
    for avoid_overlapping in [false, true] {
        let mut grid = GridBuilder::new(5, 6)
            .target((3, 5))
            .obstacle((2, 3))
            .pedestrian((1, 0), 0.0)
            .pedestrian((0, 1), 0.0)
            .build()
            .unwrap();
        let mut scheme = UpdateScheme::seeded(Box::new(DijkstraCost), 17);

        for _ in 0..200 {
            let report = scheme.update(&mut grid, avoid_overlapping).unwrap();
            assert_eq!(report.moved(), 0);
            assert!(report.moves.iter().all(|m| m.chosen != m.from && !m.accepted));
        }
        assert_eq!(grid.pedestrian(10).unwrap().position, Coordinate::new(1, 0));
        assert_eq!(grid.pedestrian(11).unwrap().position, Coordinate::new(0, 1));
    }
}

fn goal_seeking_strategies() -> Vec<Box<dyn CostStrategy>> {
    strategies()
        .into_iter()
        .filter(|strategy| strategy.name() != "random")
        .collect()
}

#[test]
fn test_adjacent_pedestrian_reaches_target_in_one_step() {
    for avoid_overlapping in [false, true] {
        for strategy in goal_seeking_strategies() {
            let name = strategy.name();
            let mut grid = GridBuilder::new(5, 6)
                .target((3, 5))
                .pedestrian((3, 4), 1.0)
                .build()
                .unwrap();
            let mut scheme = UpdateScheme::seeded(strategy, 1234);

            scheme.update(&mut grid, avoid_overlapping).unwrap();
            assert_eq!(grid.pedestrians_at_target(), vec![10], "{}", name);

            // Once there, the target is the cheapest candidate and the pedestrian stays
            for step in 0..10 {
                let report = scheme.update(&mut grid, avoid_overlapping).unwrap();
                assert_eq!(report.moved(), 0, "{} left the target at step {}", name, step);
            }
            assert_eq!(grid.pedestrians_at_target(), vec![10], "{}", name);
        }
    }
}

#[test]
fn test_pedestrian_on_target_chooses_to_stay() {
    let grid = GridBuilder::new(3, 3)
        .target((1, 1))
        .pedestrian((0, 0), 1.0)
        .build()
        .unwrap();
    for strategy in goal_seeking_strategies() {
        let name = strategy.name();
        let mut on_target = grid.clone();
        on_target.replace_one_pedestrian(10, Coordinate::new(1, 1)).unwrap();
        let mut scheme = UpdateScheme::seeded(strategy, 3);

        let report = scheme.update(&mut on_target, false).unwrap();
        assert_eq!(report.moves[0].chosen, Coordinate::new(1, 1), "{}", name);
    }
}

#[test]
fn test_leaving_a_shared_cell_does_not_free_it() {
    // 10 and 11 start stacked; 10 cannot move, 11 steps ahead, 12 must still wait
    let mut grid = GridBuilder::new(1, 4)
        .target((0, 3))
        .pedestrian((0, 1), 0.0)
        .pedestrian((0, 1), 1.0)
        .pedestrian((0, 0), 1.0)
        .build()
        .unwrap();
    let mut scheme = UpdateScheme::seeded(Box::new(DijkstraCost), 4);

    scheme.update(&mut grid, true).unwrap();

    assert_eq!(grid.pedestrian(10).unwrap().position, Coordinate::new(0, 1));
    assert_eq!(grid.pedestrian(11).unwrap().position, Coordinate::new(0, 2));
    assert_eq!(grid.pedestrian(12).unwrap().position, Coordinate::new(0, 0));
    assert_eq!(grid.occupant(Coordinate::new(0, 1)), Some(10));
    assert!(has_no_overlap(&grid));
}

#[test]
fn test_synchronous_collision_keeps_both_pedestrians() {
    let mut grid = GridBuilder::new(1, 3)
        .target((0, 1))
        .pedestrian((0, 0), 1.0)
        .pedestrian((0, 2), 1.0)
        .build()
        .unwrap();
    let mut scheme = UpdateScheme::seeded(Box::new(EuclideanCost), 0);

    let report = scheme.update(&mut grid, false).unwrap();

    assert_eq!(report.moved(), 2);
    assert_eq!(grid.pedestrians().len(), 2);
    assert_eq!(grid.pedestrians_at_target(), vec![10, 11]);
    // Larger id is written last and owns the cell
    assert_eq!(grid.occupant(Coordinate::new(0, 1)), Some(11));
    assert!(!grid.is_occupied(Coordinate::new(0, 0)));
}

#[test]
fn test_sequential_collision_is_resolved_by_id_order() {
    let mut grid = GridBuilder::new(1, 3)
        .target((0, 1))
        .pedestrian((0, 0), 1.0)
        .pedestrian((0, 2), 1.0)
        .build()
        .unwrap();
    let mut scheme = UpdateScheme::seeded(Box::new(EuclideanCost), 0);

    scheme.update(&mut grid, true).unwrap();

    assert_eq!(grid.pedestrians_at_target(), vec![10]);
    assert_eq!(grid.pedestrian(11).unwrap().position, Coordinate::new(0, 2));
    assert!(has_no_overlap(&grid));
}

#[test]
fn test_sequential_mode_sees_earlier_moves() {
    // Front runner first: it clears the way for the one behind
    let mut front_first = GridBuilder::new(1, 5)
        .target((0, 4))
        .pedestrian((0, 3), 1.0)
        .pedestrian((0, 2), 1.0)
        .build()
        .unwrap();
    let mut scheme = UpdateScheme::seeded(Box::new(DijkstraCost), 0);
    let report = scheme.update(&mut front_first, true).unwrap();
    assert_eq!(report.moved(), 2);
    assert_eq!(front_first.pedestrian(11).unwrap().position, Coordinate::new(0, 3));

    // Back runner first: it is still blocked when it decides
    let mut back_first = GridBuilder::new(1, 5)
        .target((0, 4))
        .pedestrian((0, 2), 1.0)
        .pedestrian((0, 3), 1.0)
        .build()
        .unwrap();
    let report = scheme.update(&mut back_first, true).unwrap();
    assert_eq!(report.moved(), 1);
    assert_eq!(back_first.pedestrian(10).unwrap().position, Coordinate::new(0, 2));
    assert_eq!(back_first.pedestrian(11).unwrap().position, Coordinate::new(0, 4));
}

#[test]
fn test_same_seed_same_history() {
    let run = |seed: u64| {
        let mut grid = grid_from_map(CROWD, 0.7);
        let mut scheme = UpdateScheme::seeded(Box::new(RandomCost), seed);
        let mut positions = Vec::new();
        for _ in 0..15 {
            scheme.update(&mut grid, false).unwrap();
            positions.push(grid.pedestrians().clone());
        }
        positions
    };

    assert_eq!(run(77), run(77));
}

#[test]
fn test_half_speed_moves_about_half_the_time() {
    let mut grid = GridBuilder::new(1, 400)
        .target((0, 399))
        .pedestrian((0, 0), 0.5)
        .build()
        .unwrap();
    let mut scheme = UpdateScheme::seeded(Box::new(EuclideanCost), 31);

    let mut moved = 0;
    for _ in 0..300 {
        moved += scheme.update(&mut grid, false).unwrap().moved();
    }

    assert!((120..180).contains(&moved), "moved {} times", moved);
    assert_eq!(grid.pedestrian(10).unwrap().position, Coordinate::new(0, moved as i32));
}

#[test]
fn test_reference_scenario_reaches_target() {
    let mut grid = reference_grid();
    let mut scheme = UpdateScheme::seeded(Box::new(DijkstraCost), 8);

    for _ in 0..20 {
        scheme.update(&mut grid, true).unwrap();
    }

    assert_eq!(grid.pedestrians_at_target().len(), 1);
    assert!(has_no_overlap(&grid));
}
