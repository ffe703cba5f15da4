//! The single-file HDF5 container.

use std::path::Path;

use hdf5::types::{TypeDescriptor, VarLenUnicode};
use indexmap::IndexMap;

use crate::codec::hdf5_codec::{read_dataset, write_dataset};
use crate::dump::DumpError;
use crate::element::{Element, Scalar, Value};
use crate::load::LoadError;
use crate::schema::{FieldDescriptor, SchemaView};

fn descriptor_kind(descriptor: &FieldDescriptor) -> &'static str {
    if descriptor.is_array {
        "array"
    } else if descriptor.nested_type.is_some() {
        "record"
    } else {
        "scalar"
    }
}

fn write_scalar_attr(group: &hdf5::Group, name: &str, scalar: &Scalar) -> Result<(), DumpError> {
    match scalar {
        Scalar::Bool(b) => group.new_attr::<bool>().create(name)?.write_scalar(b)?,
        Scalar::Int(i) => group.new_attr::<i64>().create(name)?.write_scalar(i)?,
        Scalar::Float(f) => group.new_attr::<f64>().create(name)?.write_scalar(f)?,
        Scalar::Str(s) => {
            let encoded: VarLenUnicode = s.parse().map_err(|err| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, format!("{err}"))
            })?;
            group
                .new_attr::<VarLenUnicode>()
                .create(name)?
                .write_scalar(&encoded)?;
        }
    }
    Ok(())
}

fn read_scalar_attr(attr: &hdf5::Attribute, class: &str, field: &str) -> Result<Scalar, LoadError> {
    match attr.dtype()?.to_descriptor()? {
        TypeDescriptor::Boolean => Ok(Scalar::Bool(attr.read_scalar::<bool>()?)),
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => {
            Ok(Scalar::Int(attr.read_scalar::<i64>()?))
        }
        TypeDescriptor::Float(_) => Ok(Scalar::Float(attr.read_scalar::<f64>()?)),
        TypeDescriptor::VarLenUnicode | TypeDescriptor::VarLenAscii => Ok(Scalar::Str(
            attr.read_scalar::<VarLenUnicode>()?.as_str().to_string(),
        )),
        _ => Err(LoadError::ExpectedScalar {
            class: class.to_string(),
            field: field.to_string(),
            found: "an unsupported attribute type",
        }),
    }
}

fn write_element(
    group: &hdf5::Group,
    element: &Element,
    schema: &SchemaView,
) -> Result<(), DumpError> {
    let class = element.type_name();
    for (field_name, value) in element.fields() {
        let descriptor = schema.field_descriptor(class, field_name)?;
        match value {
            Value::Scalar(scalar) if !descriptor.is_array && descriptor.nested_type.is_none() => {
                write_scalar_attr(group, field_name, scalar)?;
            }
            Value::Array(array) if descriptor.is_array => {
                write_dataset(group, field_name, array)?;
            }
            Value::Record(nested) if descriptor.nested_type.is_some() => {
                write_element(&group.create_group(field_name)?, nested, schema)?;
            }
            other => {
                return Err(DumpError::KindMismatch {
                    class: class.to_string(),
                    field: field_name.clone(),
                    expected: descriptor_kind(descriptor),
                    found: other.kind(),
                })
            }
        }
    }
    Ok(())
}

fn read_element(
    group: &hdf5::Group,
    path: &Path,
    schema: &SchemaView,
    class: &str,
) -> Result<Element, LoadError> {
    let attr_names = group.attr_names()?;
    let mut fields = IndexMap::new();
    for descriptor in schema.fields(class)? {
        let name = descriptor.name.clone();
        if descriptor.is_array {
            if group.link_exists(&name) {
                let array = read_dataset(&group.dataset(&name)?, path).map_err(LoadError::Codec)?;
                fields.insert(name, Value::Array(array));
            }
        } else if let Some(nested_type) = descriptor.nested_type.clone() {
            if group.link_exists(&name) {
                let nested = read_element(&group.group(&name)?, path, schema, &nested_type)?;
                fields.insert(name, Value::Record(nested));
            }
        } else if attr_names.iter().any(|attr| attr == &name) {
            let scalar = read_scalar_attr(&group.attr(&name)?, class, &name)?;
            fields.insert(name, Value::Scalar(scalar));
        }
    }
    Ok(schema.construct(class, fields)?)
}

/// Dumps a record tree into a single HDF5 file.
///
/// The file is truncated on every dump.
#[derive(Copy, Clone, Debug, Default)]
pub struct Hdf5Dumper;

impl Hdf5Dumper {
    /// Create a dumper.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Dump `element` into the HDF5 file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DumpError`] if a field does not match its declaration or
    /// the file cannot be written.
    pub fn dump(
        &self,
        element: &Element,
        schema: &SchemaView,
        path: impl AsRef<Path>,
    ) -> Result<(), DumpError> {
        let file = hdf5::File::create(path.as_ref())?;
        write_element(&file, element, schema)
    }
}

/// Loads a record tree from a single HDF5 file.
#[derive(Copy, Clone, Debug, Default)]
pub struct Hdf5Loader;

impl Hdf5Loader {
    /// Create a loader.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Reconstruct an element of class `target_class` from the HDF5 file at
    /// `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the file cannot be read, a stored value does
    /// not match its declaration, or validation fails.
    pub fn load(
        &self,
        path: impl AsRef<Path>,
        target_class: &str,
        schema: &SchemaView,
    ) -> Result<Element, LoadError> {
        let path = path.as_ref();
        let file = hdf5::File::open(path)?;
        read_element(&file, path, schema, target_class)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use crate::element::NdArray;

    use super::*;

    const SCHEMA: &str = r"
classes:
  Station:
    identifier: name
    attributes:
      name: {range: string, required: true}
      active: {range: boolean}
      temperature:
        range: TemperatureSeries
  TemperatureSeries:
    attributes:
      values: {range: float, array: {rank: 2}}
";

    fn station() -> Element {
        let series = Element::new("TemperatureSeries").with(
            "values",
            NdArray::Float64(array![[10.0, 12.5], [11.0, 13.5]].into_dyn()),
        );
        Element::new("Station")
            .with("name", Scalar::from("st-7"))
            .with("active", Scalar::Bool(true))
            .with("temperature", series)
    }

    #[test]
    fn container_round_trip() {
        let schema = SchemaView::from_yaml_str(SCHEMA).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("station.h5");

        Hdf5Dumper::new().dump(&station(), &schema, &path).unwrap();
        let loaded = Hdf5Loader::new().load(&path, "Station", &schema).unwrap();
        assert_eq!(loaded, station());
    }

    #[test]
    fn dump_truncates_an_existing_file() {
        let schema = SchemaView::from_yaml_str(SCHEMA).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("station.h5");

        Hdf5Dumper::new().dump(&station(), &schema, &path).unwrap();
        let replacement = Element::new("Station")
            .with("name", Scalar::from("st-8"))
            .with("active", Scalar::Bool(false));
        Hdf5Dumper::new().dump(&replacement, &schema, &path).unwrap();

        let loaded = Hdf5Loader::new().load(&path, "Station", &schema).unwrap();
        assert_eq!(loaded, replacement);
        assert!(loaded.get("temperature").is_none());
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let schema = SchemaView::from_yaml_str(SCHEMA).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let bad = Element::new("Station")
            .with("name", Scalar::from("st-7"))
            .with("active", NdArray::Int64(array![1].into_dyn()));
        let err = Hdf5Dumper::new()
            .dump(&bad, &schema, dir.path().join("station.h5"))
            .unwrap_err();
        assert!(matches!(err, DumpError::KindMismatch { .. }));
    }
}
