//! Schema-directed serialization of record trees with N-dimensional array
//! fields.
//!
//! A lightweight schema ([`schema::SchemaView`]) tags each field of a class
//! as a scalar, an array, or a nested class. Driven by those tags, this
//! crate serializes in-memory record trees ([`element::Element`]) to and
//! from several on-disk layouts:
//!
//! - a YAML document with arrays embedded inline as nested sequences
//!   ([`dump::YamlDumper`], [`load::YamlLoader`]);
//! - a YAML document whose array fields are externalized to sibling array
//!   files in NumPy `.npy`, HDF5, NetCDF, or Zarr format, referenced by
//!   path or by an explicit format tag ([`dump::YamlArrayFileDumper`],
//!   [`load::YamlArrayFileLoader`]);
//! - a single hierarchical container holding the whole tree, as one HDF5
//!   file or one Zarr directory store ([`container`]).
//!
//! External array files are named from the nearest identifier in the record
//! tree ([`namer`]), so sibling files sort next to the document that
//! references them.
//!
//! ## Example
//! ```
//! use arraydoc::dump::YamlDumper;
//! use arraydoc::element::{Element, NdArray, Scalar};
//! use arraydoc::schema::SchemaView;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = SchemaView::from_yaml_str(
//!     r"
//! classes:
//!   Sample:
//!     identifier: name
//!     attributes:
//!       name: {range: string, required: true}
//!       values: {range: integer, array: {rank: 1}}
//! ",
//! )?;
//!
//! let sample = Element::new("Sample")
//!     .with("name", Scalar::from("s1"))
//!     .with("values", NdArray::Int64(ndarray::array![1, 2, 3].into_dyn()));
//!
//! let yaml = YamlDumper::new().dumps(&sample, &schema)?;
//! assert_eq!(yaml, "name: s1\nvalues:\n- 1\n- 2\n- 3\n");
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Features
//! #### Default
//!  - `numpy`: the `.npy` array file codec.
//!  - `zarr`: the Zarr array file codec and the Zarr directory-store
//!    container.
//!
//! #### Non-Default
//!  - `hdf5`: the HDF5 array file codec and the single-file HDF5 container.
//!    Requires the HDF5 C library.
//!  - `netcdf`: the NetCDF array file codec. Requires the NetCDF C library.

pub mod codec;
pub mod container;
pub mod dump;
pub mod element;
pub mod load;
pub mod namer;
pub mod schema;

pub use codec::{ArrayCodecError, ArrayFileCodec, ArrayFileFormat};
pub use dump::{DumpError, ReferenceShape, YamlArrayFileDumper, YamlDumper};
pub use element::{Element, NdArray, Scalar, Value};
pub use load::{LoadError, MalformedArrayReferenceError, YamlArrayFileLoader, YamlLoader};
pub use namer::NamingOptions;
pub use schema::{SchemaView, ValidationError};
