//! Elevation-ordered visiting sequence
//!
//! The sweep must touch every interior cell from highest to lowest so
//! that a cell's upslope contributors have deposited their flow before
//! the cell distributes its own. Cells are enumerated column-major and
//! stably sorted on (elevation, flat id): stability keeps the members of
//! one flat contiguous and makes tie order deterministic.

use multiflow_core::raster::Raster;
use multiflow_core::{Error, Result};
use std::cmp::Ordering;

/// Build the visiting order over the interior cells, sorted ascending by
/// (elevation, flat id). Consumers iterate the result in reverse to walk
/// the grid from the highest interior cell down.
///
/// Border cells have no full 3x3 neighborhood and are excluded; grids
/// smaller than 3x3 yield an empty order.
///
/// # Errors
/// `Error::SizeMismatch` when the flat raster disagrees in shape with
/// the DEM.
pub fn visiting_order(dem: &Raster<f64>, flats: &Raster<i32>) -> Result<Vec<(usize, usize)>> {
    let (rows, cols) = dem.shape();
    let (frows, fcols) = flats.shape();

    if (rows, cols) != (frows, fcols) {
        return Err(Error::SizeMismatch {
            er: rows,
            ec: cols,
            ar: frows,
            ac: fcols,
        });
    }

    if rows < 3 || cols < 3 {
        return Ok(Vec::new());
    }

    let mut order: Vec<(usize, usize)> = Vec::with_capacity((rows - 2) * (cols - 2));
    for col in 1..cols - 1 {
        for row in 1..rows - 1 {
            order.push((row, col));
        }
    }

    // sort_by is stable: equal keys keep their enumeration order.
    order.sort_by(|&(r1, c1), &(r2, c2)| {
        let z1 = unsafe { dem.get_unchecked(r1, c1) };
        let z2 = unsafe { dem.get_unchecked(r2, c2) };
        z1.partial_cmp(&z2)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                let f1 = unsafe { flats.get_unchecked(r1, c1) };
                let f2 = unsafe { flats.get_unchecked(r2, c2) };
                f1.cmp(&f2)
            })
    });

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::label_flats;
    use std::collections::HashSet;

    fn ramp_dem(rows: usize, cols: usize) -> Raster<f64> {
        let mut dem = Raster::new(rows, cols);
        for row in 0..rows {
            for col in 0..cols {
                dem.set(row, col, (row * cols + col) as f64).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_order_is_interior_permutation() {
        let dem = ramp_dem(6, 7);
        let (flats, _) = label_flats(&dem).unwrap();
        let order = visiting_order(&dem, &flats).unwrap();

        assert_eq!(order.len(), 4 * 5);

        let unique: HashSet<_> = order.iter().copied().collect();
        assert_eq!(unique.len(), order.len());

        for &(row, col) in &order {
            assert!((1..5).contains(&row), "row {} outside interior", row);
            assert!((1..6).contains(&col), "col {} outside interior", col);
        }
    }

    #[test]
    fn test_order_is_elevation_ascending() {
        let dem = ramp_dem(6, 7);
        let (flats, _) = label_flats(&dem).unwrap();
        let order = visiting_order(&dem, &flats).unwrap();

        for pair in order.windows(2) {
            let a = dem.get(pair[0].0, pair[0].1).unwrap();
            let b = dem.get(pair[1].0, pair[1].1).unwrap();
            assert!(a <= b, "order not ascending: {} before {}", a, b);
        }
    }

    #[test]
    fn test_flat_members_are_contiguous() {
        // Two plateaus separated by a valley column
        let mut dem = Raster::new(5, 9);
        for row in 0..5 {
            for col in 0..9 {
                let z = if col < 4 {
                    7.0
                } else if col == 4 {
                    1.0
                } else {
                    5.0
                };
                dem.set(row, col, z).unwrap();
            }
        }

        let (flats, count) = label_flats(&dem).unwrap();
        assert_eq!(count, 3); // both plateaus plus the valley floor

        let order = visiting_order(&dem, &flats).unwrap();

        let mut closed: HashSet<i32> = HashSet::new();
        let mut current = 0;
        for &(row, col) in &order {
            let id = flats.get(row, col).unwrap();
            if id == current {
                continue;
            }
            if current != 0 {
                closed.insert(current);
            }
            assert!(!closed.contains(&id), "flat {} reappears in the order", id);
            current = id;
        }
    }

    #[test]
    fn test_order_is_deterministic() {
        let dem = Raster::filled(7, 7, 3.0);
        let (flats, _) = label_flats(&dem).unwrap();

        let a = visiting_order(&dem, &flats).unwrap();
        let b = visiting_order(&dem, &flats).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let dem = ramp_dem(5, 5);
        let flats: Raster<i32> = Raster::new(4, 5);
        assert!(matches!(
            visiting_order(&dem, &flats),
            Err(Error::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_no_interior_is_empty() {
        let dem = ramp_dem(2, 5);
        let flats: Raster<i32> = Raster::new(2, 5);
        assert!(visiting_order(&dem, &flats).unwrap().is_empty());
    }
}
