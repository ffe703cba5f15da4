//! The dump tree walker and the YAML dump facades.
//!
//! One recursive walker serves every dump form. It visits the fields of an
//! [`Element`] in declared order and dispatches on the schema's
//! [`FieldDescriptor`](crate::schema::FieldDescriptor) tags: array fields are
//! handed to an array emitter (inline embedding or an
//! [`ArrayFileCodec`](crate::codec::ArrayFileCodec) write), nested elements
//! recurse, and scalars copy through. The historical dumper variants differ
//! only in the array emitter and the [`ReferenceShape`]/[`NamingOptions`]
//! strategy, not in the traversal.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::codec::{ArrayCodecError, ArrayFileCodec};
use crate::element::{Element, NdArray, Scalar, Value};
use crate::namer::{self, NamingContext, NamingOptions};
use crate::schema::{SchemaError, SchemaView};

/// The shape of the reference a file-externalizing dump records in place of
/// an array value.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ReferenceShape {
    /// A bare `file:./{path}` string.
    #[default]
    BarePath,
    /// A structured `{source: [{file, format}]}` mapping carrying an
    /// explicit format tag.
    StructuredSource,
}

/// A dump error.
#[derive(Debug, Error)]
pub enum DumpError {
    /// An array field must be externalized but no identifier is derivable
    /// anywhere in its ancestry.
    #[error("class {class} requires an identifier to name the array field {field}")]
    MissingIdentifier {
        /// The class owning the array field.
        class: String,
        /// The array field.
        field: String,
    },
    /// A field value does not match its schema declaration.
    #[error("field {field} of class {class} is declared as {expected} but holds a {found}")]
    KindMismatch {
        /// The class owning the field.
        class: String,
        /// The field.
        field: String,
        /// The declared kind.
        expected: &'static str,
        /// The kind of the value found.
        found: &'static str,
    },
    /// A schema lookup failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// An array codec failed.
    #[error(transparent)]
    Codec(#[from] ArrayCodecError),
    /// An I/O error (e.g. creating the output directory).
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A YAML emission error.
    #[error(transparent)]
    Emit(#[from] serde_yaml::Error),
    /// A Zarr group creation error.
    #[cfg(feature = "zarr")]
    #[error(transparent)]
    ZarrGroup(#[from] zarrs::group::GroupCreateError),
    /// A Zarr storage error.
    #[cfg(feature = "zarr")]
    #[error(transparent)]
    ZarrStorage(#[from] zarrs::storage::StorageError),
    /// An HDF5 error.
    #[cfg(feature = "hdf5")]
    #[error(transparent)]
    Hdf5(#[from] hdf5::Error),
}

/// Receives each array field reached by the dump walker, together with the
/// file stem the namer computed for it, and returns the YAML value recorded
/// in its place.
pub(crate) trait ArrayEmitter {
    fn emit(&mut self, field_name: &str, stem: &str, array: &NdArray)
        -> Result<serde_yaml::Value, DumpError>;
}

struct InlineEmitter;

impl ArrayEmitter for InlineEmitter {
    fn emit(
        &mut self,
        _field_name: &str,
        _stem: &str,
        array: &NdArray,
    ) -> Result<serde_yaml::Value, DumpError> {
        Ok(array.to_yaml_value())
    }
}

struct FileEmitter<'a> {
    codec: &'a dyn ArrayFileCodec,
    output_dir: PathBuf,
    reference_shape: ReferenceShape,
}

impl ArrayEmitter for FileEmitter<'_> {
    fn emit(
        &mut self,
        _field_name: &str,
        stem: &str,
        array: &NdArray,
    ) -> Result<serde_yaml::Value, DumpError> {
        std::fs::create_dir_all(&self.output_dir)?;
        let concrete = self.codec.write(array, &self.output_dir.join(stem))?;
        let display = concrete.to_string_lossy();
        let display = display.strip_prefix("./").unwrap_or(&display);
        Ok(match self.reference_shape {
            ReferenceShape::BarePath => serde_yaml::Value::String(format!("file:./{display}")),
            ReferenceShape::StructuredSource => {
                let mut source = serde_yaml::Mapping::new();
                source.insert("file".into(), format!("./{display}").into());
                source.insert("format".into(), self.codec.format().name().into());
                let mut reference = serde_yaml::Mapping::new();
                reference.insert(
                    "source".into(),
                    serde_yaml::Value::Sequence(vec![serde_yaml::Value::Mapping(source)]),
                );
                serde_yaml::Value::Mapping(reference)
            }
        })
    }
}

pub(crate) fn scalar_to_yaml(scalar: &Scalar) -> serde_yaml::Value {
    match scalar {
        Scalar::Bool(value) => serde_yaml::Value::Bool(*value),
        Scalar::Int(value) => serde_yaml::Value::Number((*value).into()),
        Scalar::Float(value) => serde_yaml::Value::Number((*value).into()),
        Scalar::Str(value) => serde_yaml::Value::String(value.clone()),
    }
}

/// Walk `element` and return its serialized mapping.
///
/// `ancestor_identifier` is the nearest identifier above `element`,
/// `enclosing_field` the field by which `element` was reached, and
/// `field_chain` the field names from the root to `element`.
pub(crate) fn walk(
    element: &Element,
    schema: &SchemaView,
    emitter: &mut dyn ArrayEmitter,
    options: &NamingOptions,
    ancestor_identifier: Option<&str>,
    enclosing_field: Option<&str>,
    field_chain: &mut Vec<String>,
) -> Result<serde_yaml::Mapping, DumpError> {
    let class = element.type_name();
    let identifier_value = schema
        .identifier_field(class)?
        .and_then(|field| element.scalar(field))
        .map(Scalar::to_string);

    let mut out = serde_yaml::Mapping::new();
    for (field_name, value) in element.fields() {
        let descriptor = schema.field_descriptor(class, field_name)?;
        if descriptor.is_array {
            let Value::Array(array) = value else {
                return Err(DumpError::KindMismatch {
                    class: class.to_string(),
                    field: field_name.clone(),
                    expected: "array",
                    found: value.kind(),
                });
            };
            let context = NamingContext {
                identifier: identifier_value.as_deref(),
                ancestor_identifier,
                enclosing_field,
                field_chain,
            };
            let Some(stem) = namer::file_stem(field_name, &context, options) else {
                return Err(DumpError::MissingIdentifier {
                    class: class.to_string(),
                    field: field_name.clone(),
                });
            };
            out.insert(
                field_name.as_str().into(),
                emitter.emit(field_name, &stem, array)?,
            );
        } else if let Value::Record(nested) = value {
            field_chain.push(field_name.clone());
            let nested_map = walk(
                nested,
                schema,
                emitter,
                options,
                identifier_value.as_deref().or(ancestor_identifier),
                Some(field_name),
                field_chain,
            )?;
            field_chain.pop();
            out.insert(
                field_name.as_str().into(),
                serde_yaml::Value::Mapping(nested_map),
            );
        } else {
            let Value::Scalar(scalar) = value else {
                return Err(DumpError::KindMismatch {
                    class: class.to_string(),
                    field: field_name.clone(),
                    expected: "scalar",
                    found: value.kind(),
                });
            };
            out.insert(field_name.as_str().into(), scalar_to_yaml(scalar));
        }
    }
    Ok(out)
}

/// Dumps an element to a YAML document with arrays embedded inline as nested
/// sequences.
#[derive(Debug)]
pub struct YamlDumper {
    naming: NamingOptions,
}

impl Default for YamlDumper {
    fn default() -> Self {
        Self::new()
    }
}

impl YamlDumper {
    /// Create a dumper. Arrays stay inline and no file names are derived,
    /// so identifiers are not required by default.
    #[must_use]
    pub fn new() -> Self {
        Self {
            naming: NamingOptions {
                require_identifier: false,
            },
        }
    }

    /// Override the naming strategy.
    #[must_use]
    pub fn with_naming_options(mut self, naming: NamingOptions) -> Self {
        self.naming = naming;
        self
    }

    /// Serialize `element` to a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`DumpError`] if a schema lookup fails or an array field has
    /// no usable identifier under the configured naming strategy.
    pub fn dumps(&self, element: &Element, schema: &SchemaView) -> Result<String, DumpError> {
        let mut emitter = InlineEmitter;
        let mut field_chain = Vec::new();
        let mapping = walk(
            element,
            schema,
            &mut emitter,
            &self.naming,
            None,
            None,
            &mut field_chain,
        )?;
        Ok(serde_yaml::to_string(&serde_yaml::Value::Mapping(mapping))?)
    }
}

/// Dumps an element to a YAML document with each array field externalized to
/// its own file beside the document.
pub struct YamlArrayFileDumper {
    codec: Box<dyn ArrayFileCodec>,
    output_dir: PathBuf,
    reference_shape: ReferenceShape,
    naming: NamingOptions,
}

impl YamlArrayFileDumper {
    /// Create a dumper writing arrays with `codec` into the current working
    /// directory, recording bare `file:./…` references.
    #[must_use]
    pub fn new(codec: impl ArrayFileCodec + 'static) -> Self {
        Self {
            codec: Box::new(codec),
            output_dir: PathBuf::from("."),
            reference_shape: ReferenceShape::default(),
            naming: NamingOptions::default(),
        }
    }

    /// A dumper externalizing arrays to NumPy `.npy` files.
    #[cfg(feature = "numpy")]
    #[must_use]
    pub fn numpy() -> Self {
        Self::new(crate::codec::NpyCodec::new())
    }

    /// A dumper externalizing arrays to HDF5 files.
    #[cfg(feature = "hdf5")]
    #[must_use]
    pub fn hdf5() -> Self {
        Self::new(crate::codec::Hdf5Codec::new())
    }

    /// A dumper externalizing arrays to NetCDF files.
    #[cfg(feature = "netcdf")]
    #[must_use]
    pub fn netcdf() -> Self {
        Self::new(crate::codec::NetcdfCodec::new())
    }

    /// A dumper externalizing arrays to Zarr stores.
    #[cfg(feature = "zarr")]
    #[must_use]
    pub fn zarr() -> Self {
        Self::new(crate::codec::ZarrCodec::new())
    }

    /// Write array files under `output_dir` instead of the current working
    /// directory. An absolute directory is rewritten relative to the current
    /// working directory; the directory is created if absent.
    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Record structured `{source: [{file, format}]}` references instead of
    /// bare path strings.
    #[must_use]
    pub fn with_reference_shape(mut self, reference_shape: ReferenceShape) -> Self {
        self.reference_shape = reference_shape;
        self
    }

    /// Override the naming strategy.
    #[must_use]
    pub fn with_naming_options(mut self, naming: NamingOptions) -> Self {
        self.naming = naming;
        self
    }

    /// Serialize `element` to a YAML string, writing one array file per
    /// array field.
    ///
    /// A failed dump may leave already-written array files behind; there is
    /// no rollback.
    ///
    /// # Errors
    ///
    /// Returns [`DumpError`] if a schema lookup fails, an array field has no
    /// usable identifier, or a codec write fails.
    pub fn dumps(&self, element: &Element, schema: &SchemaView) -> Result<String, DumpError> {
        let mut emitter = FileEmitter {
            codec: &*self.codec,
            output_dir: namer::relative_output_dir(&self.output_dir),
            reference_shape: self.reference_shape,
        };
        let mut field_chain = Vec::new();
        let mapping = walk(
            element,
            schema,
            &mut emitter,
            &self.naming,
            None,
            None,
            &mut field_chain,
        )?;
        Ok(serde_yaml::to_string(&serde_yaml::Value::Mapping(mapping))?)
    }

    /// The path the dumper would write for an array field named `stem`,
    /// before the codec appends its suffix.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use crate::element::NdArray;
    use crate::schema::SchemaView;

    use super::*;

    const SCHEMA: &str = r"
classes:
  Sample:
    attributes:
      name: {range: string, required: true}
      values: {range: integer, array: {rank: 1}}
";

    #[test]
    fn inline_dump_flat_record() {
        let schema = SchemaView::from_yaml_str(SCHEMA).unwrap();
        let element = Element::new("Sample")
            .with("name", Scalar::from("s1"))
            .with("values", NdArray::Int64(array![1, 2, 3].into_dyn()));
        let yaml = YamlDumper::new().dumps(&element, &schema).unwrap();
        assert_eq!(yaml, "name: s1\nvalues:\n- 1\n- 2\n- 3\n");
    }

    #[test]
    fn inline_dump_missing_identifier_fails() {
        let schema = SchemaView::from_yaml_str(SCHEMA).unwrap();
        let element = Element::new("Sample")
            .with("name", Scalar::from("s1"))
            .with("values", NdArray::Int64(array![1, 2, 3].into_dyn()));
        let err = YamlDumper::new()
            .with_naming_options(NamingOptions {
                require_identifier: true,
            })
            .dumps(&element, &schema)
            .unwrap_err();
        assert!(matches!(
            err,
            DumpError::MissingIdentifier { ref field, .. } if field == "values"
        ));
    }

    #[test]
    fn declared_scalar_holding_array_fails() {
        let schema = SchemaView::from_yaml_str(SCHEMA).unwrap();
        let element = Element::new("Sample")
            .with("name", NdArray::Int64(array![1].into_dyn()));
        let err = YamlDumper::new().dumps(&element, &schema).unwrap_err();
        assert!(matches!(err, DumpError::KindMismatch { expected: "scalar", .. }));
    }
}
