//! # skycombine
//!
//! Merge per-exposure source-detection catalogs overlapping one HEALPix pixel into a catalog of
//! unique objects with averaged position, proper motion, multi-band photometry and morphology.
//!
//! * [`combine`]: the streaming combination engine ([`PixelCombiner`]),
//! * [`sky`]: HEALPix RING geometry, tangent-plane projection, buffered pixel footprint,
//! * [`detections`]: input records and their Parquet readers,
//! * [`output`]: Parquet writers for the combined pixel,
//! * [`pipeline`]: listing-to-output driver ([`combine_pixel`]).
pub mod band;
pub mod combine;
pub mod combine_errors;
pub mod constants;
pub mod detections;
pub mod output;
pub mod params;
pub mod pipeline;
pub mod reddening;
pub mod sky;

pub use combine::{CombinedCatalog, ExposureOutcome, PixelCombiner};
pub use combine_errors::CombineError;
pub use params::CombineParams;
pub use pipeline::combine_pixel;
