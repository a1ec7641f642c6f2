//! Flat-region resolution
//!
//! When the sweep finishes scanning a flat, the flow incident to the whole
//! region is pooled (zonal sum), every member cell is assigned the pool,
//! and the pool is split evenly across the region's pour points: exterior
//! neighbors at or below the flat elevation.

use multiflow_core::raster::Raster;
use ndarray::Array2;
use tracing::warn;

/// 8-neighbor offsets (queen contiguity)
const NEIGHBOR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1), (-1, 0), (-1, 1),
    (0, -1),           (0, 1),
    (1, -1),  (1, 0),  (1, 1),
];

/// Outcome of resolving one flat region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FlatOutcome {
    pub members: usize,
    pub pour_points: usize,
    pub zonal_sum: f64,
}

impl FlatOutcome {
    /// A region with no outlet at all (a true sink); nothing was distributed.
    pub fn is_unresolved(&self) -> bool {
        self.pour_points == 0
    }
}

/// Close the flat region `flat_id`.
///
/// Pools the accumulation over the region's members, assigns each member
/// the pool, then adds an even share of the pool to every pour point. The
/// exterior ring is the one-cell 8-connected dilation of the member set
/// minus the set itself; a boolean mask guarantees each exterior cell is
/// considered exactly once no matter how many members it touches.
///
/// A region with zero pour points is a closed basin: members keep the
/// zonal sum, nothing is distributed, and the outcome reports zero pour
/// points instead of poisoning the grid with a division by zero.
///
/// Callers must pass `flats`, `dem` and `accum` of identical shape.
pub(crate) fn resolve_flat(
    flat_elevation: f64,
    flat_id: i32,
    flats: &Raster<i32>,
    dem: &Raster<f64>,
    accum: &mut Array2<f64>,
    strict_pour_points: bool,
) -> FlatOutcome {
    let (rows, cols) = dem.shape();

    // Zonal pass: collect members and pool their accumulation.
    let mut members: Vec<(usize, usize)> = Vec::new();
    let mut zonal_sum = 0.0;

    for row in 0..rows {
        for col in 0..cols {
            if unsafe { flats.get_unchecked(row, col) } == flat_id {
                zonal_sum += accum[(row, col)];
                members.push((row, col));
            }
        }
    }

    for &(row, col) in &members {
        accum[(row, col)] = zonal_sum;
    }

    // Exterior ring of the member set.
    let mut exterior = Array2::<bool>::from_elem((rows, cols), false);
    let mut ring: Vec<(usize, usize)> = Vec::new();

    for &(row, col) in &members {
        for &(dr, dc) in &NEIGHBOR_OFFSETS {
            let nr = row as isize + dr;
            let nc = col as isize + dc;

            if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                continue;
            }

            let nr = nr as usize;
            let nc = nc as usize;

            if unsafe { flats.get_unchecked(nr, nc) } != flat_id && !exterior[(nr, nc)] {
                exterior[(nr, nc)] = true;
                ring.push((nr, nc));
            }
        }
    }

    let pour_points: Vec<(usize, usize)> = ring
        .into_iter()
        .filter(|&(row, col)| {
            let z = unsafe { dem.get_unchecked(row, col) };
            if strict_pour_points {
                z < flat_elevation
            } else {
                z <= flat_elevation
            }
        })
        .collect();

    if pour_points.is_empty() {
        warn!(
            flat_id,
            flat_elevation,
            members = members.len(),
            "flat region has no pour point; accumulation not distributed"
        );
        return FlatOutcome {
            members: members.len(),
            pour_points: 0,
            zonal_sum,
        };
    }

    let share = zonal_sum / pour_points.len() as f64;
    for &(row, col) in &pour_points {
        accum[(row, col)] += share;
    }

    FlatOutcome {
        members: members.len(),
        pour_points: pour_points.len(),
        zonal_sum,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// 5x5 surface at `level` with a one-region 3x3 interior flat.
    fn plateau(level: f64, border: f64) -> (Raster<f64>, Raster<i32>) {
        let mut dem = Raster::filled(5, 5, border);
        let mut flats: Raster<i32> = Raster::new(5, 5);
        for row in 1..4 {
            for col in 1..4 {
                dem.set(row, col, level).unwrap();
                flats.set(row, col, 1).unwrap();
            }
        }
        (dem, flats)
    }

    #[test]
    fn test_sole_pour_point_receives_full_sum() {
        let (mut dem, flats) = plateau(5.0, 9.0);
        dem.set(0, 1, 5.0).unwrap(); // the only exterior cell at or below 5.0

        let mut accum = Array2::<f64>::ones((5, 5));
        let outcome = resolve_flat(5.0, 1, &flats, &dem, &mut accum, false);

        assert_eq!(outcome.members, 9);
        assert_eq!(outcome.pour_points, 1);
        assert_relative_eq!(outcome.zonal_sum, 9.0);
        assert_relative_eq!(accum[(0, 1)], 10.0);

        // All members hold the zonal sum
        for row in 1..4 {
            for col in 1..4 {
                assert_relative_eq!(accum[(row, col)], 9.0);
            }
        }
    }

    #[test]
    fn test_pour_point_conservation() {
        let (mut dem, flats) = plateau(5.0, 9.0);
        dem.set(0, 1, 4.0).unwrap();
        dem.set(4, 3, 3.0).unwrap();

        let mut accum = Array2::<f64>::ones((5, 5));
        let outcome = resolve_flat(5.0, 1, &flats, &dem, &mut accum, false);

        assert_eq!(outcome.pour_points, 2);
        let distributed = (accum[(0, 1)] - 1.0) + (accum[(4, 3)] - 1.0);
        assert_relative_eq!(distributed, outcome.zonal_sum);
        assert_relative_eq!(accum[(0, 1)], accum[(4, 3)]);
    }

    #[test]
    fn test_closed_basin_distributes_nothing() {
        let (dem, flats) = plateau(5.0, 9.0);

        let mut accum = Array2::<f64>::ones((5, 5));
        let outcome = resolve_flat(5.0, 1, &flats, &dem, &mut accum, false);

        assert!(outcome.is_unresolved());
        assert_eq!(outcome.pour_points, 0);

        // Members hold the pool; every other cell is untouched and finite
        for row in 0..5 {
            for col in 0..5 {
                let v = accum[(row, col)];
                assert!(v.is_finite());
                let member = (1..4).contains(&row) && (1..4).contains(&col);
                assert_relative_eq!(v, if member { 9.0 } else { 1.0 });
            }
        }
    }

    #[test]
    fn test_strict_rejects_equal_elevation_outlet() {
        let (mut dem, flats) = plateau(5.0, 9.0);
        dem.set(0, 1, 5.0).unwrap();

        let mut accum = Array2::<f64>::ones((5, 5));
        let outcome = resolve_flat(5.0, 1, &flats, &dem, &mut accum, true);

        assert!(outcome.is_unresolved());
        assert_relative_eq!(accum[(0, 1)], 1.0);
    }

    #[test]
    fn test_exterior_cell_counted_once() {
        // (0, 2) touches three members of the top flat row but must
        // receive exactly one share.
        let (mut dem, flats) = plateau(5.0, 9.0);
        dem.set(0, 2, 4.0).unwrap();

        let mut accum = Array2::<f64>::ones((5, 5));
        let outcome = resolve_flat(5.0, 1, &flats, &dem, &mut accum, false);

        assert_eq!(outcome.pour_points, 1);
        assert_relative_eq!(accum[(0, 2)], 1.0 + 9.0);
    }
}
