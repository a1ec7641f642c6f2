//! Hydrological analysis algorithms
//!
//! Multipath flow accumulation from Digital Elevation Models:
//! - Flat labeling: find plateau regions with no direct downslope outlet
//! - Visiting order: elevation-sorted sweep order over interior cells
//! - Multipath accumulation: proportional downslope flow distribution
//!   with zonal pooling over flats

pub(crate) mod flat_labels;
pub(crate) mod flat_resolve;
pub(crate) mod multipath;
pub(crate) mod pixel_order;

pub use flat_labels::label_flats;
pub use multipath::{
    multipath_flow_accumulation, multipath_from_flats, MultipathFlowAccumulation, MultipathParams,
    MultipathResult, SweepDiagnostics,
};
pub use pixel_order::visiting_order;
