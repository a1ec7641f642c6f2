//! Flat (plateau) detection and labeling
//!
//! A flat is a maximal 8-connected set of equal-elevation cells with no
//! strictly lower neighbor. Every plateau has at least one perimeter cell
//! that drains outward; that cell fails the candidate test and stays
//! unlabeled so the sweep can later discover it as a pour point.

use crate::maybe_rayon::*;
use multiflow_core::raster::Raster;
use multiflow_core::{Error, Result};
use ndarray::Array2;
use std::collections::VecDeque;

/// 8-neighbor offsets (queen contiguity)
const NEIGHBOR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1), (-1, 0), (-1, 1),
    (0, -1),           (0, 1),
    (1, -1),  (1, 0),  (1, 1),
];

/// Identify and label flat regions of a depression-filled DEM.
///
/// A cell is a flat candidate when all eight neighbors sit at or above its
/// own elevation, i.e. it has no direct downslope outlet. Candidates are
/// grouped into 8-connected components; each component receives a unique
/// positive id and all other cells get 0. The outermost ring never has a
/// full 3x3 neighborhood and is always 0.
///
/// The DEM is expected to be depression-filled and free of nodata cells.
///
/// # Arguments
/// * `dem` - Depression-filled DEM
///
/// # Returns
/// Tuple of (flat-id raster, number of labeled regions)
pub fn label_flats(dem: &Raster<f64>) -> Result<(Raster<i32>, usize)> {
    let (rows, cols) = dem.shape();

    // Candidate pass: a row-parallel stencil counting neighbors >= center.
    let mask: Vec<bool> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_mask = vec![false; cols];

            if row > 0 && row + 1 < rows {
                for col in 1..cols.saturating_sub(1) {
                    let z = unsafe { dem.get_unchecked(row, col) };
                    let mut at_or_above = 0;

                    for &(dr, dc) in &NEIGHBOR_OFFSETS {
                        let nr = (row as isize + dr) as usize;
                        let nc = (col as isize + dc) as usize;
                        let nz = unsafe { dem.get_unchecked(nr, nc) };
                        if nz >= z {
                            at_or_above += 1;
                        }
                    }

                    row_mask[col] = at_or_above == NEIGHBOR_OFFSETS.len();
                }
            }

            row_mask
        })
        .collect();

    let mask =
        Array2::from_shape_vec((rows, cols), mask).map_err(|e| Error::Other(e.to_string()))?;

    // Component pass: breadth-first flood fill over 8-connectivity.
    let mut labels = Array2::<i32>::zeros((rows, cols));
    let mut regions: i32 = 0;
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();

    for row in 0..rows {
        for col in 0..cols {
            if !mask[(row, col)] || labels[(row, col)] != 0 {
                continue;
            }

            regions += 1;
            labels[(row, col)] = regions;
            queue.push_back((row, col));

            while let Some((r, c)) = queue.pop_front() {
                for &(dr, dc) in &NEIGHBOR_OFFSETS {
                    let nr = r as isize + dr;
                    let nc = c as isize + dc;

                    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                        continue;
                    }

                    let nr = nr as usize;
                    let nc = nc as usize;

                    if mask[(nr, nc)] && labels[(nr, nc)] == 0 {
                        labels[(nr, nc)] = regions;
                        queue.push_back((nr, nc));
                    }
                }
            }
        }
    }

    let mut output = dem.with_same_meta::<i32>(rows, cols);
    output.set_nodata(Some(0));
    *output.data_mut() = labels;

    Ok((output, regions as usize))
}
