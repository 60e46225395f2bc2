use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SimError, SimResult};
use crate::grid::{Coordinate, Grid, GridBuilder};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PedestrianSpec {
    pub row: i32,
    pub col: i32,
    /// Falls back to the configured default speed when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

/// Initial layout of a simulation run, independent of file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub rows: i32,
    pub columns: i32,
    #[serde(default)]
    pub pedestrians: Vec<PedestrianSpec>,
    #[serde(default)]
    pub obstacles: Vec<(i32, i32)>,
    pub target: (i32, i32),
}

/// Numbers found on a line once brackets and commas are stripped
fn numbers(line: &str, line_no: usize) -> SimResult<Vec<f64>> {
    line.split(|c: char| c == '(' || c == ')' || c == '[' || c == ']' || c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<f64>().map_err(|_| SimError::Scenario {
                line: line_no,
                reason: format!("'{}' is not a number", t),
            })
        })
        .collect()
}

fn as_index(value: f64, line_no: usize) -> SimResult<i32> {
    if value.fract() != 0.0 || value < i32::MIN as f64 || value > i32::MAX as f64 {
        return Err(SimError::Scenario {
            line: line_no,
            reason: format!("{} is not a cell index", value),
        });
    }
    Ok(value as i32)
}

/// Cursor over the meaningful lines of a legacy scenario file
struct LineReader<'a> {
    lines: Vec<(usize, &'a str)>,
    pos: usize,
}

impl<'a> LineReader<'a> {
    fn new(text: &'a str) -> Self {
        let lines = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.split('#').next().unwrap_or("").trim()))
            .filter(|(_, line)| !line.is_empty())
            .collect();
        LineReader { lines, pos: 0 }
    }

    fn next(&mut self, what: &str) -> SimResult<(usize, &'a str)> {
        let entry = self.lines.get(self.pos).copied().ok_or_else(|| SimError::Scenario {
            line: self.lines.last().map(|(n, _)| *n).unwrap_or(0),
            reason: format!("unexpected end of file, expected {}", what),
        })?;
        self.pos += 1;
        Ok(entry)
    }

    fn dimension(&mut self, what: &str) -> SimResult<i32> {
        let (line_no, line) = self.next(what)?;
        let value = line.parse::<i64>().map_err(|_| SimError::Scenario {
            line: line_no,
            reason: format!("expected {}, found '{}'", what, line),
        })?;
        i32::try_from(value).map_err(|_| SimError::Scenario {
            line: line_no,
            reason: format!("{} {} is out of range", what, value),
        })
    }

    fn count(&mut self, what: &str) -> SimResult<usize> {
        let (line_no, line) = self.next(what)?;
        line.parse::<usize>().map_err(|_| SimError::Scenario {
            line: line_no,
            reason: format!("expected {}, found '{}'", what, line),
        })
    }

    fn coordinate(&mut self, what: &str) -> SimResult<(i32, i32)> {
        let (line_no, line) = self.next(what)?;
        match numbers(line, line_no)?.as_slice() {
            [r, c] => Ok((as_index(*r, line_no)?, as_index(*c, line_no)?)),
            _ => Err(SimError::Scenario {
                line: line_no,
                reason: format!("expected {} as (row, col), found '{}'", what, line),
            }),
        }
    }

    fn pedestrian(&mut self) -> SimResult<PedestrianSpec> {
        let (line_no, line) = self.next("pedestrian")?;
        let (row, col, speed) = match numbers(line, line_no)?.as_slice() {
            [r, c] => (*r, *c, None),
            [r, c, s] => (*r, *c, Some(*s)),
            _ => {
                return Err(SimError::Scenario {
                    line: line_no,
                    reason: format!("expected pedestrian as (row, col)[, speed], found '{}'", line),
                })
            }
        };
        Ok(PedestrianSpec {
            row: as_index(row, line_no)?,
            col: as_index(col, line_no)?,
            speed,
        })
    }
}

impl Scenario {
    /// Line-oriented format:
    ///
    /// ```text
    /// rows
    /// columns
    /// pedestrian count, then one "(r, c)" or "(r, c), speed" per line
    /// obstacle count, then one "(r, c)" per line
    /// target "(r, c)"
    /// ```
    pub fn from_input_str(text: &str) -> SimResult<Self> {
        let mut reader = LineReader::new(text);

        let rows = reader.dimension("row count")?;
        let columns = reader.dimension("column count")?;

        let p = reader.count("pedestrian count")?;
        let pedestrians = (0..p)
            .map(|_| reader.pedestrian())
            .collect::<SimResult<Vec<_>>>()?;

        let o = reader.count("obstacle count")?;
        let obstacles = (0..o)
            .map(|_| reader.coordinate("obstacle"))
            .collect::<SimResult<Vec<_>>>()?;

        let target = reader.coordinate("target")?;

        Ok(Scenario {
            rows,
            columns,
            pedestrians,
            obstacles,
            target,
        })
    }

    pub fn from_json_str(text: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Character map: `□`/`.` empty, `■`/`#` obstacle, `T` target, `o` pedestrian, `@` pedestrian on target
    pub fn from_ascii(text: &str) -> SimResult<Self> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .collect();

        if lines.is_empty() {
            return Err(SimError::invalid("map has no rows"));
        }
        let columns = lines[0].chars().count();

        let mut pedestrians = Vec::new();
        let mut obstacles = Vec::new();
        let mut targets = Vec::new();

        for (row, line) in lines.iter().enumerate() {
            if line.chars().count() != columns {
                return Err(SimError::Scenario {
                    line: row + 1,
                    reason: format!("row has {} cells, expected {}", line.chars().count(), columns),
                });
            }
            for (col, ch) in line.chars().enumerate() {
                let cell = (row as i32, col as i32);
                match ch {
                    '□' | '.' => {}
                    '■' | '#' => obstacles.push(cell),
                    'T' => targets.push(cell),
                    'o' => pedestrians.push(PedestrianSpec {
                        row: cell.0,
                        col: cell.1,
                        speed: None,
                    }),
                    '@' => {
                        targets.push(cell);
                        pedestrians.push(PedestrianSpec {
                            row: cell.0,
                            col: cell.1,
                            speed: None,
                        });
                    }
                    other => {
                        return Err(SimError::Scenario {
                            line: row + 1,
                            reason: format!("unknown cell symbol '{}'", other),
                        })
                    }
                }
            }
        }

        let target = match targets.as_slice() {
            [target] => *target,
            [] => return Err(SimError::invalid("map has no target")),
            many => {
                return Err(SimError::invalid(format!(
                    "map must have exactly one target, got {}",
                    many.len()
                )))
            }
        };

        Ok(Scenario {
            rows: lines.len() as i32,
            columns: columns as i32,
            pedestrians,
            obstacles,
            target,
        })
    }

    /// Load a scenario, choosing the parser by extension: `.json`, `.map`, anything else is the line format
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let scenario = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => Self::from_json_str(&text)?,
            Some("map") => Self::from_ascii(&text)?,
            _ => Self::from_input_str(&text)?,
        };
        debug!(
            path = %path.display(),
            rows = scenario.rows,
            columns = scenario.columns,
            pedestrians = scenario.pedestrians.len(),
            "loaded scenario"
        );
        Ok(scenario)
    }

    pub fn build_grid(&self, default_speed: f64) -> SimResult<Grid> {
        let mut builder = GridBuilder::new(self.rows, self.columns)
            .obstacles(self.obstacles.iter().copied())
            .target(self.target);
        for p in &self.pedestrians {
            builder = builder.pedestrian(Coordinate::new(p.row, p.col), p.speed.unwrap_or(default_speed));
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "5
6
2
(1, 0)
(0, 1), 0.5
1
(2, 3)
(3, 5)
";

    #[test]
    fn test_parse_input_format() {
        let scenario = Scenario::from_input_str(SAMPLE).unwrap();
        assert_eq!(scenario.rows, 5);
        assert_eq!(scenario.columns, 6);
        assert_eq!(scenario.pedestrians.len(), 2);
        assert_eq!(scenario.pedestrians[0].speed, None);
        assert_eq!(scenario.pedestrians[1].speed, Some(0.5));
        assert_eq!(scenario.obstacles, vec![(2, 3)]);
        assert_eq!(scenario.target, (3, 5));

        let grid = scenario.build_grid(1.0).unwrap();
        assert_eq!(grid.pedestrian(10).unwrap().speed, 1.0);
        assert_eq!(grid.pedestrian(11).unwrap().speed, 0.5);
    }

    #[test]
    fn test_nested_speed_tuple() {
        let text = "3\n3\n1\n((0, 0), 1.5)\n0\n(2, 2)\n";
        let scenario = Scenario::from_input_str(text).unwrap();
        assert_eq!(
            scenario.pedestrians[0],
            PedestrianSpec { row: 0, col: 0, speed: Some(1.5) }
        );
    }

    #[test]
    fn test_oversized_dimension() {
        let text = "3\n4294967297\n0\n0\n(0, 0)\n";
        let err = Scenario::from_input_str(text).unwrap_err();
        assert!(matches!(err, SimError::Scenario { line: 2, .. }));
    }

    #[test]
    fn test_truncated_input() {
        let err = Scenario::from_input_str("5\n6\n2\n(1, 0)\n").unwrap_err();
        assert!(matches!(err, SimError::Scenario { .. }));
    }

    #[test]
    fn test_bad_coordinate() {
        let err = Scenario::from_input_str("5\n6\n1\n(1.5, 0)\n0\n(3, 5)\n").unwrap_err();
        assert!(matches!(err, SimError::Scenario { line: 4, .. }));
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{
            "rows": 4,
            "columns": 4,
            "pedestrians": [{"row": 0, "col": 0, "speed": 2.0}, {"row": 1, "col": 0}],
            "obstacles": [[2, 2]],
            "target": [3, 3]
        }"#;
        let scenario = Scenario::from_json_str(json).unwrap();
        assert_eq!(scenario.obstacles, vec![(2, 2)]);
        assert_eq!(scenario.pedestrians[1].speed, None);
        assert_eq!(scenario.build_grid(0.7).unwrap().pedestrian(11).unwrap().speed, 0.7);
    }

    #[test]
    fn test_parse_ascii() {
        let scenario = Scenario::from_ascii("o.#\n..T\n").unwrap();
        assert_eq!(scenario.rows, 2);
        assert_eq!(scenario.columns, 3);
        assert_eq!(scenario.obstacles, vec![(0, 2)]);
        assert_eq!(scenario.target, (1, 2));
        assert_eq!(scenario.pedestrians.len(), 1);
    }

    #[test]
    fn test_ascii_round_trips_grid_rendering() {
        let scenario = Scenario::from_ascii("□■□\no□T\n").unwrap();
        let grid = scenario.build_grid(1.0).unwrap();
        assert_eq!(grid.to_ascii(), "□■□\no□T\n");
    }

    #[test]
    fn test_ascii_target_count() {
        assert!(matches!(
            Scenario::from_ascii("o..\n...\n"),
            Err(SimError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            Scenario::from_ascii("T.T\n...\n"),
            Err(SimError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_ascii_ragged_rows() {
        assert!(matches!(
            Scenario::from_ascii("T..\n..\n"),
            Err(SimError::Scenario { line: 2, .. })
        ));
    }
}
