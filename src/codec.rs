//! Array file codecs.
//!
//! An [`ArrayFileCodec`] persists one in-memory tensor to one external file
//! (or store) and reads it back. Every codec writes the array under a single
//! well-known internal location, appends a fixed suffix to the path stub it
//! is given, and fully materializes arrays on read — handles never outlive
//! the call that opened them.

#[cfg(feature = "hdf5")]
pub(crate) mod hdf5_codec;
#[cfg(feature = "netcdf")]
mod netcdf_codec;
#[cfg(feature = "numpy")]
mod npy;
#[cfg(feature = "zarr")]
pub(crate) mod zarr_codec;

use std::path::{Path, PathBuf};

use derive_more::Display;
use thiserror::Error;

use crate::element::NdArray;

#[cfg(feature = "hdf5")]
pub use hdf5_codec::Hdf5Codec;
#[cfg(feature = "netcdf")]
pub use netcdf_codec::NetcdfCodec;
#[cfg(feature = "numpy")]
pub use npy::NpyCodec;
#[cfg(feature = "zarr")]
pub use zarr_codec::ZarrCodec;

/// The format tag of an array file, as written into structured array
/// references.
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq)]
pub enum ArrayFileFormat {
    /// A NumPy `.npy` file.
    #[display("numpy")]
    Numpy,
    /// An HDF5 file with a single dataset at `data`.
    #[display("hdf5")]
    Hdf5,
    /// A NetCDF file with a single `data` variable.
    #[display("netcdf")]
    Netcdf,
    /// A Zarr store with a single array at its root.
    #[display("zarr")]
    Zarr,
}

impl ArrayFileFormat {
    /// The wire name of the format.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Numpy => "numpy",
            Self::Hdf5 => "hdf5",
            Self::Netcdf => "netcdf",
            Self::Zarr => "zarr",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "numpy" => Some(Self::Numpy),
            "hdf5" => Some(Self::Hdf5),
            "netcdf" => Some(Self::Netcdf),
            "zarr" => Some(Self::Zarr),
            _ => None,
        }
    }
}

/// An array codec error.
///
/// Backend errors are carried transparently, not rewrapped.
#[derive(Debug, Error)]
pub enum ArrayCodecError {
    /// The codec cannot represent the array's element type. Codecs fail
    /// rather than coerce (e.g. strings to numbers).
    #[error("the {format} codec does not support {dtype} arrays")]
    UnsupportedDtype {
        /// The codec's format.
        format: ArrayFileFormat,
        /// The element type of the offending array.
        dtype: &'static str,
    },
    /// The file exists but does not hold the expected single array.
    #[error("array file {path} has no readable array at {location}")]
    MissingArray {
        /// The file path.
        path: PathBuf,
        /// The internal location expected (e.g. the `data` dataset).
        location: String,
    },
    /// An I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A NumPy read error.
    #[cfg(feature = "numpy")]
    #[error(transparent)]
    NpyRead(#[from] ndarray_npy::ReadNpyError),
    /// A NumPy write error.
    #[cfg(feature = "numpy")]
    #[error(transparent)]
    NpyWrite(#[from] ndarray_npy::WriteNpyError),
    /// An HDF5 error.
    #[cfg(feature = "hdf5")]
    #[error(transparent)]
    Hdf5(#[from] hdf5::Error),
    /// A NetCDF error.
    #[cfg(feature = "netcdf")]
    #[error(transparent)]
    Netcdf(#[from] netcdf::Error),
    /// A Zarr storage error.
    #[cfg(feature = "zarr")]
    #[error(transparent)]
    ZarrStorage(#[from] zarrs::storage::StorageError),
    /// A Zarr store creation error.
    #[cfg(feature = "zarr")]
    #[error(transparent)]
    ZarrStoreCreate(#[from] zarrs::filesystem::FilesystemStoreCreateError),
    /// A Zarr array creation error.
    #[cfg(feature = "zarr")]
    #[error(transparent)]
    ZarrArrayCreate(#[from] zarrs::array::ArrayCreateError),
    /// A Zarr array access error.
    #[cfg(feature = "zarr")]
    #[error(transparent)]
    ZarrArray(#[from] zarrs::array::ArrayError),
}

/// A codec persisting one array to one external file.
pub trait ArrayFileCodec {
    /// The format tag written into structured array references.
    fn format(&self) -> ArrayFileFormat;

    /// The fixed file suffix, including the leading dot.
    fn suffix(&self) -> &'static str;

    /// Append the suffix to `path_stub`, persist `array` there, and return
    /// the concrete path written. Callers must not assume the suffix without
    /// consulting the return value.
    ///
    /// # Errors
    ///
    /// Returns [`ArrayCodecError`] if the array cannot be represented or the
    /// backend fails.
    fn write(&self, array: &NdArray, path_stub: &Path) -> Result<PathBuf, ArrayCodecError>;

    /// Read the array at `path` fully into memory.
    ///
    /// # Errors
    ///
    /// Returns [`ArrayCodecError`] if the file is missing, malformed, or
    /// holds an unsupported element type.
    fn read(&self, path: &Path) -> Result<NdArray, ArrayCodecError>;
}

/// Append a codec suffix to a path stub without treating the stem's dots as
/// an extension boundary.
pub(crate) fn append_suffix(path_stub: &Path, suffix: &str) -> PathBuf {
    let mut path = path_stub.as_os_str().to_os_string();
    path.push(suffix);
    PathBuf::from(path)
}
