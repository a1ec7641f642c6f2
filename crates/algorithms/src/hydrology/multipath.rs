//! Multipath flow accumulation
//!
//! Distributes each cell's accumulated flow to every strictly lower
//! neighbor in proportion to the elevation drop, sweeping the grid from
//! the highest interior cell to the lowest. Flat regions are pooled and
//! re-emitted through their pour points as the sweep crosses them.
//!
//! Unlike single-direction accumulation (all flow to the steepest
//! neighbor), the proportional split spreads contributing area across
//! divergent terrain, which matters on ridges and fans.

use multiflow_core::raster::Raster;
use multiflow_core::{Algorithm, Error, Result};
use ndarray::Array2;
use tracing::debug;

use super::flat_labels::label_flats;
use super::flat_resolve::resolve_flat;
use super::pixel_order::visiting_order;

/// 8-neighbor offsets (queen contiguity)
const NEIGHBOR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1), (-1, 0), (-1, 1),
    (0, -1),           (0, 1),
    (1, -1),  (1, 0),  (1, 1),
];

/// Parameters for multipath flow accumulation
#[derive(Debug, Clone, Default)]
pub struct MultipathParams {
    /// Require pour points to sit strictly below the flat elevation.
    ///
    /// The default admits outlets at the flat's own elevation, which lets
    /// a region drain into an equal-elevation neighbor, including cells
    /// of another flat. Enable to restrict outlets to strictly lower
    /// ground; flats whose only exterior neighbors are at equal elevation
    /// then become closed basins.
    pub strict_pour_points: bool,
}

/// Conditions that suppressed distribution during a sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepDiagnostics {
    /// Interior cells with no downslope drop that were not labeled as
    /// part of a flat. Only reachable when a caller-supplied flat raster
    /// disagrees with the DEM; the cells keep their accumulation and
    /// distribute nothing.
    pub degenerate_cells: Vec<(usize, usize)>,
    /// Flat regions with no pour point (closed basins). Member cells keep
    /// the zonal sum; nothing is distributed.
    pub unresolved_flats: Vec<i32>,
}

impl SweepDiagnostics {
    /// Whether the sweep completed without suppressed distributions.
    pub fn is_clean(&self) -> bool {
        self.degenerate_cells.is_empty() && self.unresolved_flats.is_empty()
    }
}

/// Result of a multipath sweep.
#[derive(Debug, Clone)]
pub struct MultipathResult {
    /// Accumulated flow per cell, each cell starting from one unit of
    /// locally generated flow. Border cells hold whatever interior cells
    /// deposited into them and are never themselves redistributed;
    /// callers cropping the outer ring should shift the georeferencing
    /// with `GeoTransform::pixel_offset(1, 1)`.
    pub accumulation: Raster<f64>,
    /// Flat-region labels used by the sweep (0 = not part of a flat).
    pub flats: Raster<i32>,
    /// Conditions that suppressed distribution.
    pub diagnostics: SweepDiagnostics,
}

/// Multipath flow accumulation algorithm
#[derive(Debug, Clone, Default)]
pub struct MultipathFlowAccumulation;

impl Algorithm for MultipathFlowAccumulation {
    type Input = Raster<f64>;
    type Output = MultipathResult;
    type Params = MultipathParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Multipath Flow Accumulation"
    }

    fn description(&self) -> &'static str {
        "Distribute accumulated flow to all downslope neighbors proportional to elevation drop"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        multipath_flow_accumulation(&input, params)
    }
}

/// Compute multipath flow accumulation over a depression-filled DEM.
///
/// Every cell starts with one unit of locally generated flow. Interior
/// cells are visited from highest to lowest elevation; each ordinary cell
/// splits its accumulated flow among the strictly lower cells of its 3x3
/// window in proportion to the elevation drop, and each flat region
/// receives the zonal sum of its members and re-emits it evenly through
/// its pour points.
///
/// The DEM must be depression-filled. Closed basins that remain are
/// reported in the diagnostics and distribute nothing; they never poison
/// other cells with non-finite values. The outer ring only receives flow
/// and is never a source of distribution; see
/// [`MultipathResult::accumulation`].
pub fn multipath_flow_accumulation(
    dem: &Raster<f64>,
    params: MultipathParams,
) -> Result<MultipathResult> {
    let (flats, _) = label_flats(dem)?;
    multipath_from_flats(dem, &flats, params)
}

/// Multipath sweep over a caller-supplied flat labeling.
///
/// Use this when the flat raster from [`label_flats`] is needed for other
/// analysis as well, or when labels come from elsewhere. `flats` must
/// have the same shape as `dem`.
///
/// # Errors
/// `Error::SizeMismatch` when the shapes disagree.
pub fn multipath_from_flats(
    dem: &Raster<f64>,
    flats: &Raster<i32>,
    params: MultipathParams,
) -> Result<MultipathResult> {
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

    let order = visiting_order(dem, flats)?;

    let mut accum = Array2::<f64>::ones((rows, cols));
    let mut diagnostics = SweepDiagnostics::default();

    // (elevation, id) of the flat currently being scanned
    let mut current: Option<(f64, i32)> = None;

    for &(row, col) in order.iter().rev() {
        let id = unsafe { flats.get_unchecked(row, col) };

        if id != 0 {
            match current {
                Some((_, f)) if f == id => {}
                Some((elevation, f)) => {
                    close_flat(elevation, f, flats, dem, &mut accum, &params, &mut diagnostics);
                    current = Some((unsafe { dem.get_unchecked(row, col) }, id));
                }
                None => {
                    current = Some((unsafe { dem.get_unchecked(row, col) }, id));
                }
            }
            continue;
        }

        if let Some((elevation, f)) = current.take() {
            close_flat(elevation, f, flats, dem, &mut accum, &params, &mut diagnostics);
        }

        let z = unsafe { dem.get_unchecked(row, col) };
        let outflow = accum[(row, col)];

        let mut drops = [0.0_f64; 8];
        let mut total = 0.0_f64;

        for (idx, &(dr, dc)) in NEIGHBOR_OFFSETS.iter().enumerate() {
            let nr = (row as isize + dr) as usize;
            let nc = (col as isize + dc) as usize;
            let nz = unsafe { dem.get_unchecked(nr, nc) };

            if nz < z {
                drops[idx] = z - nz;
                total += z - nz;
            }
        }

        if total > 0.0 {
            for (idx, &(dr, dc)) in NEIGHBOR_OFFSETS.iter().enumerate() {
                if drops[idx] > 0.0 {
                    let nr = (row as isize + dr) as usize;
                    let nc = (col as isize + dc) as usize;
                    accum[(nr, nc)] += outflow * drops[idx] / total;
                }
            }
        } else {
            // No downslope drop on an unlabeled cell: the flat raster and
            // the DEM disagree. Keep the value, distribute nothing.
            diagnostics.degenerate_cells.push((row, col));
        }
    }

    // A flat spanning the lowest processed elevation is still open when
    // the order runs out; close it like any other region.
    if let Some((elevation, f)) = current {
        close_flat(elevation, f, flats, dem, &mut accum, &params, &mut diagnostics);
    }

    if !diagnostics.is_clean() {
        debug!(
            degenerate = diagnostics.degenerate_cells.len(),
            unresolved = diagnostics.unresolved_flats.len(),
            "sweep finished with suppressed distributions"
        );
    }

    let mut accumulation = dem.with_same_meta::<f64>(rows, cols);
    *accumulation.data_mut() = accum;

    Ok(MultipathResult {
        accumulation,
        flats: flats.clone(),
        diagnostics,
    })
}

fn close_flat(
    elevation: f64,
    id: i32,
    flats: &Raster<i32>,
    dem: &Raster<f64>,
    accum: &mut Array2<f64>,
    params: &MultipathParams,
    diagnostics: &mut SweepDiagnostics,
) {
    let outcome = resolve_flat(elevation, id, flats, dem, accum, params.strict_pour_points);
    if outcome.is_unresolved() {
        diagnostics.unresolved_flats.push(id);
    }
}
