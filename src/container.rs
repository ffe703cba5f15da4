//! Hierarchical single-container dump and load.
//!
//! Instead of a YAML document with sibling array files, these dumpers place
//! the whole record tree inside one container: each element becomes a group,
//! its scalar fields become group attributes, its array fields become
//! datasets (or arrays) named by the field, and nested elements become
//! subgroups named by the field that holds them. No namer is involved and
//! identifiers are ordinary scalar attributes.
//!
//! Loads are schema directed. The loader walks the declared fields of the
//! target class and probes the container for each one; members the schema
//! does not declare are ignored, and missing required fields surface through
//! validation.

#[cfg(feature = "hdf5")]
mod hdf5_container;
#[cfg(feature = "zarr")]
mod zarr_container;

#[cfg(feature = "hdf5")]
pub use hdf5_container::{Hdf5Dumper, Hdf5Loader};
#[cfg(feature = "zarr")]
pub use zarr_container::{ZarrDumper, ZarrLoader};
