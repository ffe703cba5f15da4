//! The NetCDF array file codec.

use std::path::{Path, PathBuf};

use ndarray::{ArrayD, IxDyn};
use netcdf::types::{BasicType, VariableType};

use crate::codec::{append_suffix, ArrayCodecError, ArrayFileCodec, ArrayFileFormat};
use crate::element::NdArray;

/// The name of the sole variable a codec-written NetCDF file holds.
const VARIABLE_NAME: &str = "data";

/// Persists one array per `.nc` file, as a single `data` variable over
/// anonymous `dim_{i}` dimensions.
///
/// String arrays are not supported; writing one fails with
/// [`ArrayCodecError::UnsupportedDtype`].
#[derive(Copy, Clone, Debug, Default)]
pub struct NetcdfCodec;

impl NetcdfCodec {
    /// Create the codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn flat_values<T: Copy>(values: &ArrayD<T>) -> Vec<T> {
    values.iter().copied().collect()
}

fn from_flat<T>(shape: &[usize], flat: Vec<T>) -> Result<ArrayD<T>, ArrayCodecError> {
    ArrayD::from_shape_vec(IxDyn(shape), flat).map_err(|err| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string()).into()
    })
}

impl ArrayFileCodec for NetcdfCodec {
    fn format(&self) -> ArrayFileFormat {
        ArrayFileFormat::Netcdf
    }

    fn suffix(&self) -> &'static str {
        ".nc"
    }

    fn write(&self, array: &NdArray, path_stub: &Path) -> Result<PathBuf, ArrayCodecError> {
        let path = append_suffix(path_stub, self.suffix());
        let mut file = netcdf::create(&path)?;
        let mut dims = Vec::with_capacity(array.rank());
        for (i, &len) in array.shape().iter().enumerate() {
            let name = format!("dim_{i}");
            file.add_dimension(&name, len)?;
            dims.push(name);
        }
        let dims: Vec<&str> = dims.iter().map(String::as_str).collect();
        match array {
            NdArray::Int64(values) => {
                let mut variable = file.add_variable::<i64>(VARIABLE_NAME, &dims)?;
                variable.put_values(&flat_values(values), ..)?;
            }
            NdArray::Float64(values) => {
                let mut variable = file.add_variable::<f64>(VARIABLE_NAME, &dims)?;
                variable.put_values(&flat_values(values), ..)?;
            }
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
        let file = netcdf::open(path)?;
        let variable =
            file.variable(VARIABLE_NAME)
                .ok_or_else(|| ArrayCodecError::MissingArray {
                    path: path.to_path_buf(),
                    location: VARIABLE_NAME.to_string(),
                })?;
        let shape: Vec<usize> = variable.dimensions().iter().map(|d| d.len()).collect();
        match variable.vartype() {
            VariableType::Basic(BasicType::Float | BasicType::Double) => {
                let flat = variable.get_values::<f64, _>(..)?;
                Ok(NdArray::Float64(from_flat(&shape, flat)?))
            }
            VariableType::Basic(_) => {
                let flat = variable.get_values::<i64, _>(..)?;
                Ok(NdArray::Int64(from_flat(&shape, flat)?))
            }
            _ => Err(ArrayCodecError::UnsupportedDtype {
                format: self.format(),
                dtype: "non-numeric",
            }),
        }
    }
}
