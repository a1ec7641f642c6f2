//! # Multiflow Algorithms
//!
//! Multipath flow accumulation for depression-filled Digital Elevation
//! Models: each cell's accumulated flow is distributed to all downslope
//! neighbors proportional to the elevation drop, and flat regions pool
//! their flow and re-emit it through their pour points.

pub mod hydrology;

mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::hydrology::{
        label_flats, multipath_flow_accumulation, visiting_order, MultipathFlowAccumulation,
        MultipathParams, MultipathResult,
    };
    pub use multiflow_core::prelude::*;
}
