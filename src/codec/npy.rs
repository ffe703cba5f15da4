//! The NumPy `.npy` array file codec.

use std::path::{Path, PathBuf};

use ndarray::ArrayD;
use ndarray_npy::{read_npy, write_npy};

use crate::element::NdArray;

use super::{append_suffix, ArrayCodecError, ArrayFileCodec, ArrayFileFormat};

/// Writes each array to its own `.npy` file.
///
/// String arrays are rejected: the underlying `.npy` support covers numeric
/// element types only, and silently coercing strings to numbers would break
/// round trips.
#[derive(Clone, Copy, Debug, Default)]
pub struct NpyCodec;

impl NpyCodec {
    /// Create the codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ArrayFileCodec for NpyCodec {
    fn format(&self) -> ArrayFileFormat {
        ArrayFileFormat::Numpy
    }

    fn suffix(&self) -> &'static str {
        ".npy"
    }

    fn write(&self, array: &NdArray, path_stub: &Path) -> Result<PathBuf, ArrayCodecError> {
        let path = append_suffix(path_stub, self.suffix());
        match array {
            NdArray::Int64(array) => write_npy(&path, array)?,
            NdArray::Float64(array) => write_npy(&path, array)?,
            NdArray::Str(_) => {
                return Err(ArrayCodecError::UnsupportedDtype {
                    format: self.format(),
                    dtype: array.dtype_name(),
                })
            }
        }
        Ok(path)
    }

    fn read(&self, path: &Path) -> Result<NdArray, ArrayCodecError> {
        // The npy header's dtype is only surfaced through typed reads, so
        // probe the supported element types in order.
        match read_npy::<_, ArrayD<i64>>(path) {
            Ok(array) => Ok(NdArray::Int64(array)),
            Err(_) => {
                let array: ArrayD<f64> = read_npy(path)?;
                Ok(NdArray::Float64(array))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn npy_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let codec = NpyCodec::new();

        let ints = NdArray::Int64(array![[1, 2], [3, 4]].into_dyn());
        let path = codec.write(&ints, &dir.path().join("s1.values")).unwrap();
        assert_eq!(path, dir.path().join("s1.values.npy"));
        assert_eq!(codec.read(&path).unwrap(), ints);

        let floats = NdArray::Float64(array![0.5, 1.5, 2.5].into_dyn());
        let path = codec.write(&floats, &dir.path().join("s1.floats")).unwrap();
        assert_eq!(codec.read(&path).unwrap(), floats);
    }

    #[test]
    fn npy_rejects_string_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let strings = NdArray::Str(array!["a".to_string(), "b".to_string()].into_dyn());
        let err = NpyCodec::new()
            .write(&strings, &dir.path().join("s1.dates"))
            .unwrap_err();
        assert!(matches!(err, ArrayCodecError::UnsupportedDtype { .. }));
    }
}
