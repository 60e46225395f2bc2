use arboard::Clipboard;
use crowdgrid::{simulate, CellKind, Config, Coordinate, Scenario, SimResult, SimulationRun, UpdateScheme};
use macroquad::prelude::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const INFO_HEIGHT: f32 = 110.0;

/// Playback state for a precomputed simulation run
struct ViewerState {
    run: SimulationRun,
    label: String,
    frame: usize,
    playing: bool,
    elapsed: f32,
    step_interval: f32,
    background: Color,
}

impl ViewerState {
    fn new(config: &Config) -> SimResult<Self> {
        let scenario = Scenario::load(&config.scenario.path)?;
        let grid = scenario.build_grid(config.pedestrians.default_speed)?;

        let strategy = config.build_strategy()?;
        let mut scheme = match config.simulation.seed {
            Some(seed) => UpdateScheme::seeded(strategy, seed),
            None => UpdateScheme::from_entropy(strategy),
        };

        let run = simulate(
            grid,
            &mut scheme,
            config.simulation.steps,
            config.simulation.report_every,
            config.simulation.avoid_overlapping,
        )?;
        info!("{}", run.summary().replace('\n', ", "));

        Ok(ViewerState {
            run,
            label: format!("{} [{}]", config.scenario.path, scheme.strategy().name()),
            frame: 0,
            playing: true,
            elapsed: 0.0,
            step_interval: 1.0 / config.visual.steps_per_second.max(0.1),
            background: Color::from_rgba(
                config.visual.background_r,
                config.visual.background_g,
                config.visual.background_b,
                255,
            ),
        })
    }

    fn last_frame(&self) -> usize {
        self.run.states.len() - 1
    }

    fn advance(&mut self, dt: f32) {
        if !self.playing {
            return;
        }
        self.elapsed += dt;
        while self.elapsed >= self.step_interval {
            self.elapsed -= self.step_interval;
            if self.frame < self.last_frame() {
                self.frame += 1;
            } else {
                self.playing = false;
                self.elapsed = 0.0;
            }
        }
    }

    fn step_forward(&mut self) {
        self.playing = false;
        self.frame = (self.frame + 1).min(self.last_frame());
    }

    fn restart(&mut self) {
        self.frame = 0;
        self.elapsed = 0.0;
        self.playing = true;
    }

    fn copy_to_clipboard(&self) {
        let snapshot = self.run.states[self.frame].to_ascii();
        match Clipboard::new() {
            Ok(mut clipboard) => {
                if let Err(e) = clipboard.set_text(&snapshot) {
                    error!("Failed to copy to clipboard: {}", e);
                } else {
                    info!("Step {} copied to clipboard", self.frame);
                    // Keep clipboard alive for a moment to ensure clipboard managers can capture it
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }
            }
            Err(e) => {
                error!("Failed to access clipboard: {}", e);
            }
        }
    }

    fn draw(&self) {
        clear_background(self.background);

        let grid = &self.run.states[self.frame];
        let cell_width = screen_width() / grid.columns() as f32;
        let cell_height = (screen_height() - INFO_HEIGHT).max(1.0) / grid.rows() as f32;

        for coordinate in grid.coordinates() {
            let px = coordinate.col as f32 * cell_width;
            let py = coordinate.row as f32 * cell_height;

            let fill = if grid.is_occupied(coordinate) {
                Some(RED)
            } else {
                match grid.kind(coordinate) {
                    Ok(CellKind::Obstacle) => Some(BLACK),
                    Ok(CellKind::Target) => Some(GREEN),
                    _ => None,
                }
            };

            if let Some(color) = fill {
                draw_rectangle(px, py, cell_width - 1.0, cell_height - 1.0, color);
            }
            draw_rectangle_lines(px, py, cell_width, cell_height, 1.0, GRAY);
        }

        // A pedestrian on the target still shows the target underneath
        let target: Coordinate = grid.target();
        if grid.is_occupied(target) {
            draw_rectangle_lines(
                target.col as f32 * cell_width,
                target.row as f32 * cell_height,
                cell_width,
                cell_height,
                3.0,
                GREEN,
            );
        }

        let info = format!(
            "{}\nStep {}/{}  pedestrians: {}  at target: {}\nSpace: play/pause  Right: step  R: restart  C: copy step  Esc: close",
            self.label,
            self.frame,
            self.last_frame(),
            grid.pedestrians().len(),
            grid.pedestrians_at_target().len()
        );
        let mut y = screen_height() - INFO_HEIGHT + 24.0;
        for line in info.lines() {
            draw_text(line, 10.0, y, 20.0, WHITE);
            y += 24.0;
        }
    }
}

fn window_conf() -> Conf {
    let config = Config::load();
    let (width, height) = match Scenario::load(&config.scenario.path) {
        Ok(scenario) => (
            (scenario.columns as f32 * config.visual.cell_size) as i32,
            (scenario.rows as f32 * config.visual.cell_size + INFO_HEIGHT) as i32,
        ),
        Err(_) => (800, 600),
    };
    Conf {
        window_title: config.visual.window_title,
        window_width: width.max(480),
        window_height: height.max(240),
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load();
    let mut state = match ViewerState::new(&config) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to start simulation: {}", e);
            return;
        }
    };

    loop {
        if is_key_pressed(KeyCode::Space) {
            state.playing = !state.playing;
        }
        if is_key_pressed(KeyCode::Right) {
            state.step_forward();
        }
        if is_key_pressed(KeyCode::R) {
            state.restart();
        }
        // Copy current step to clipboard on C key
        if is_key_pressed(KeyCode::C) {
            state.copy_to_clipboard();
        }
        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        state.advance(get_frame_time());
        state.draw();

        next_frame().await
    }
}
