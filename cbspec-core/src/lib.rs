//! cbspec-core: Core types for cosmic-ray energy spectrum reduction.
//!
//! This crate holds the I/O-free part of the pipeline: record-layout
//! resolution, derived fields, quality cuts, stream accumulation, energy
//! binning with the validity mask, and aperture/exposure.
//!

pub mod binning;
pub mod config;
pub mod cuts;
pub mod derived;
pub mod error;
pub mod exposure;
pub mod reduce;
pub mod schema;
pub mod soa;
pub mod streams;

pub use binning::{BinnedCounts, EnergyBins, MaskedBins};
pub use config::{
    ArrayFiles, ArrayType, GeneratedGeometry, OutputConfig, QualityCuts, ReadOptions, RunConfig,
};
pub use cuts::CutInputs;
pub use derived::DerivedEvents;
pub use error::{Error, Result};
pub use exposure::ApertureExposure;
pub use reduce::{reduce_batch, BatchOutcome};
pub use schema::{resolve_schema, ColumnRef, Element, FieldMap, SchemaVariant};
pub use soa::{EventBatch, EventRow};
pub use streams::{AccumulatedStreams, FileRole, FinalStreams};
