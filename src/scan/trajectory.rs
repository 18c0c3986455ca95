//! Trajectory generation over the scan grid.

use crate::error::AppResult;
use crate::scan::{Position2D, ScanPattern, ScanZone};
use crate::validation::require_at_least;

/// The ordered sequence of grid positions visited by a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanTrajectory {
    positions: Vec<Position2D>,
}

impl ScanTrajectory {
    /// Generate the trajectory for a uniform grid over `zone`.
    ///
    /// The grid has `x_nb_points` columns and `y_nb_points` rows (both at
    /// least 2), with points spaced uniformly so the zone edges are included.
    /// The visit order follows `pattern`.
    pub fn generate(
        zone: &ScanZone,
        x_nb_points: usize,
        y_nb_points: usize,
        pattern: ScanPattern,
    ) -> AppResult<Self> {
        zone.validate()?;
        require_at_least("x_nb_points", x_nb_points, 2)?;
        require_at_least("y_nb_points", y_nb_points, 2)?;

        let xs = linspace(zone.x_min, zone.x_max, x_nb_points);
        let ys = linspace(zone.y_min, zone.y_max, y_nb_points);

        let mut positions = Vec::with_capacity(x_nb_points * y_nb_points);
        match pattern {
            ScanPattern::Raster => {
                for &y in &ys {
                    for &x in &xs {
                        positions.push(Position2D::new(x, y));
                    }
                }
            }
            ScanPattern::Serpentine => {
                for (row, &y) in ys.iter().enumerate() {
                    if row % 2 == 0 {
                        for &x in &xs {
                            positions.push(Position2D::new(x, y));
                        }
                    } else {
                        for &x in xs.iter().rev() {
                            positions.push(Position2D::new(x, y));
                        }
                    }
                }
            }
            ScanPattern::Comb => {
                for &x in &xs {
                    for &y in &ys {
                        positions.push(Position2D::new(x, y));
                    }
                }
            }
        }

        Ok(Self { positions })
    }

    /// Number of positions in the trajectory.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the trajectory is empty.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// All positions in visit order.
    pub fn positions(&self) -> &[Position2D] {
        &self.positions
    }

    /// The position at `index`, if within bounds.
    pub fn get(&self, index: usize) -> Option<&Position2D> {
        self.positions.get(index)
    }

    /// Iterate over positions in visit order.
    pub fn iter(&self) -> std::slice::Iter<'_, Position2D> {
        self.positions.iter()
    }
}

impl<'a> IntoIterator for &'a ScanTrajectory {
    type Item = &'a Position2D;
    type IntoIter = std::slice::Iter<'a, Position2D>;

    fn into_iter(self) -> Self::IntoIter {
        self.positions.iter()
    }
}

fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    let step = (end - start) / (count - 1) as f64;
    (0..count).map(|i| start + step * i as f64).collect()
}
