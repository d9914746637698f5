//! Tools for aggregating per-model segmentation masks from nifti files into
//! a single composite atlas per subject, normalizing the label space, and
//! extracting per-segment statistics.
//!
//! The core operations are pure transforms over in-memory label volumes:
//! nearest-neighbor resampling onto a reference grid, binary priority
//! composition with deterministic collision shifting, and label suppression
//! plus compaction. The `pipeline` module wires them into resumable batch
//! runs over folders of subjects; the `aggregatenii`, `filternii` and
//! `statsnii` binaries drive those from the command line.

pub mod compose;
pub mod error;
pub mod io;
pub mod normalize;
pub mod pipeline;
pub mod resample;
pub mod stats;
pub mod volume;

pub use error::{MaskError, Result};
pub use volume::{Geometry, LabelVolume};
