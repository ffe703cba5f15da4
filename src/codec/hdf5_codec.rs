//! The HDF5 array file codec.

use std::path::{Path, PathBuf};

use hdf5::types::{TypeDescriptor, VarLenUnicode};
use ndarray::ArrayD;

use crate::codec::{append_suffix, ArrayCodecError, ArrayFileCodec, ArrayFileFormat};
use crate::element::NdArray;

/// The name of the sole dataset a codec-written HDF5 file holds.
const DATASET_NAME: &str = "data";

/// Write `array` as dataset `name` under `parent`.
///
/// Strings are stored as variable-length UTF-8.
pub(crate) fn write_dataset(
    parent: &hdf5::Group,
    name: &str,
    array: &NdArray,
) -> Result<(), ArrayCodecError> {
    match array {
        NdArray::Int64(values) => {
            parent
                .new_dataset_builder()
                .with_data(values.view())
                .create(name)?;
        }
        NdArray::Float64(values) => {
            parent
                .new_dataset_builder()
                .with_data(values.view())
                .create(name)?;
        }
        NdArray::Str(values) => {
            let encoded = to_varlen_unicode(values)?;
            parent
                .new_dataset_builder()
                .with_data(encoded.view())
                .create(name)?;
        }
    }
    Ok(())
}

/// Read a dataset back into a tensor, dispatching on its stored type.
pub(crate) fn read_dataset(
    dataset: &hdf5::Dataset,
    path: &Path,
) -> Result<NdArray, ArrayCodecError> {
    match dataset.dtype()?.to_descriptor()? {
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) | TypeDescriptor::Boolean => {
            Ok(NdArray::Int64(dataset.read_dyn::<i64>()?))
        }
        TypeDescriptor::Float(_) => Ok(NdArray::Float64(dataset.read_dyn::<f64>()?)),
        TypeDescriptor::VarLenUnicode | TypeDescriptor::VarLenAscii => {
            let raw = dataset.read_dyn::<VarLenUnicode>()?;
            Ok(NdArray::Str(raw.map(|s| s.as_str().to_string())))
        }
        other => Err(ArrayCodecError::MissingArray {
            path: path.to_path_buf(),
            location: format!("{DATASET_NAME} (unsupported stored type {other:?})"),
        }),
    }
}

fn to_varlen_unicode(values: &ArrayD<String>) -> Result<ArrayD<VarLenUnicode>, ArrayCodecError> {
    let encoded = values
        .iter()
        .map(|s| s.parse::<VarLenUnicode>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(invalid_data)?;
    ArrayD::from_shape_vec(values.raw_dim(), encoded).map_err(|err| invalid_data(err).into())
}

fn invalid_data(err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string())
}

/// Persists one array per `.h5` file, as a single dataset named `data`.
#[derive(Copy, Clone, Debug, Default)]
pub struct Hdf5Codec;

impl Hdf5Codec {
    /// Create the codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ArrayFileCodec for Hdf5Codec {
    fn format(&self) -> ArrayFileFormat {
        ArrayFileFormat::Hdf5
    }

    fn suffix(&self) -> &'static str {
        ".h5"
    }

    fn write(&self, array: &NdArray, path_stub: &Path) -> Result<PathBuf, ArrayCodecError> {
        let path = append_suffix(path_stub, self.suffix());
        let file = hdf5::File::create(&path)?;
        write_dataset(&file, DATASET_NAME, array)?;
        Ok(path)
    }

    fn read(&self, path: &Path) -> Result<NdArray, ArrayCodecError> {
        let file = hdf5::File::open(path)?;
        let dataset = file
            .dataset(DATASET_NAME)
            .map_err(|_| ArrayCodecError::MissingArray {
                path: path.to_path_buf(),
                location: DATASET_NAME.to_string(),
            })?;
        read_dataset(&dataset, path)
    }
}
