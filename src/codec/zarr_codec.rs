//! The Zarr array file codec: one array per `.zarr` directory store.

use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use zarrs::array::{Array, ArrayBuilder, ChunkGrid, ChunkShape, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::filesystem::FilesystemStore;

use crate::element::NdArray;

use super::{append_suffix, ArrayCodecError, ArrayFileCodec, ArrayFileFormat};

/// Writes each array to its own Zarr directory store, as a single array at
/// the store root with whole-array chunking and no compression.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZarrCodec;

impl ZarrCodec {
    /// Create the codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ArrayFileCodec for ZarrCodec {
    fn format(&self) -> ArrayFileFormat {
        ArrayFileFormat::Zarr
    }

    fn suffix(&self) -> &'static str {
        ".zarr"
    }

    fn write(&self, array: &NdArray, path_stub: &Path) -> Result<PathBuf, ArrayCodecError> {
        let path = append_suffix(path_stub, self.suffix());
        if path.exists() {
            std::fs::remove_dir_all(&path)?;
        }
        let store = Arc::new(FilesystemStore::new(&path)?);
        write_array(store, "/", array)?;
        Ok(path)
    }

    fn read(&self, path: &Path) -> Result<NdArray, ArrayCodecError> {
        let store = Arc::new(FilesystemStore::new(path)?);
        read_array(store, "/")
    }
}

/// Create and store a Zarr array at `node_path`, whole-array chunked.
pub(crate) fn write_array(
    store: Arc<FilesystemStore>,
    node_path: &str,
    array: &NdArray,
) -> Result<(), ArrayCodecError> {
    let shape: Vec<u64> = array.shape().iter().map(|&d| d as u64).collect();
    let chunk_shape: ChunkShape = shape
        .iter()
        .map(|&d| NonZeroU64::new(d).unwrap_or(NonZeroU64::MIN))
        .collect::<Vec<_>>()
        .into();
    let (data_type, fill_value) = match array {
        NdArray::Int64(_) => (DataType::Int64, FillValue::from(0i64)),
        NdArray::Float64(_) => (DataType::Float64, FillValue::from(0f64)),
        NdArray::Str(_) => (DataType::String, FillValue::from("")),
    };
    let zarr_array = ArrayBuilder::new(shape, data_type, ChunkGrid::from(chunk_shape), fill_value)
        .build(store, node_path)?;
    zarr_array.store_metadata()?;
    let start = vec![0u64; array.rank()];
    match array {
        NdArray::Int64(values) => zarr_array.store_array_subset_ndarray(&start, values.clone())?,
        NdArray::Float64(values) => zarr_array.store_array_subset_ndarray(&start, values.clone())?,
        NdArray::Str(values) => zarr_array.store_array_subset_ndarray(&start, values.clone())?,
    }
    Ok(())
}

/// Read a whole Zarr array at `node_path` into memory.
pub(crate) fn read_array(
    store: Arc<FilesystemStore>,
    node_path: &str,
) -> Result<NdArray, ArrayCodecError> {
    let zarr_array = Array::open(store, node_path)?;
    let subset = ArraySubset::new_with_shape(zarr_array.shape().to_vec());
    match zarr_array.data_type() {
        DataType::Int64 => Ok(NdArray::Int64(
            zarr_array.retrieve_array_subset_ndarray::<i64>(&subset)?,
        )),
        DataType::Float64 => Ok(NdArray::Float64(
            zarr_array.retrieve_array_subset_ndarray::<f64>(&subset)?,
        )),
        DataType::String => Ok(NdArray::Str(
            zarr_array.retrieve_array_subset_ndarray::<String>(&subset)?,
        )),
        _ => Err(ArrayCodecError::UnsupportedDtype {
            format: ArrayFileFormat::Zarr,
            dtype: "non-int64/float64/string",
        }),
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn zarr_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let codec = ZarrCodec::new();

        let floats = NdArray::Float64(array![[1.0, 2.0], [3.0, 4.0]].into_dyn());
        let path = codec.write(&floats, &dir.path().join("s1.values")).unwrap();
        assert_eq!(path, dir.path().join("s1.values.zarr"));
        assert_eq!(codec.read(&path).unwrap(), floats);
    }

    #[test]
    fn zarr_round_trips_string_series() {
        let dir = tempfile::tempdir().unwrap();
        let codec = ZarrCodec::new();
        let dates = NdArray::Str(array!["2024-01-01".to_string(), "2024-01-02".to_string()].into_dyn());
        let path = codec.write(&dates, &dir.path().join("s1.dates")).unwrap();
        assert_eq!(codec.read(&path).unwrap(), dates);
    }

    #[test]
    fn zarr_overwrite_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let codec = ZarrCodec::new();
        let stub = dir.path().join("s1.values");
        codec
            .write(&NdArray::Int64(array![[1, 2], [3, 4]].into_dyn()), &stub)
            .unwrap();
        let second = NdArray::Int64(array![9, 9, 9].into_dyn());
        let path = codec.write(&second, &stub).unwrap();
        assert_eq!(codec.read(&path).unwrap(), second);
    }
}
