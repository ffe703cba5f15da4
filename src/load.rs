//! The load tree walker and the YAML load facades.
//!
//! The structural inverse of [`dump`](crate::dump): every key of a parsed
//! mapping is looked up against the target class, array-flagged keys are
//! dereferenced through an array resolver (inline parse, or a reference
//! followed through an [`ArrayFileCodec`](crate::codec::ArrayFileCodec)),
//! nested mappings recurse with the nested class, and scalars pass through.
//! The fully reconstructed field map is handed to
//! [`SchemaView::construct`], which validates it.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use thiserror::Error;

use crate::codec::{ArrayCodecError, ArrayFileCodec, ArrayFileFormat};
use crate::element::{yaml_kind, ArrayValueError, Element, NdArray, Scalar, Value};
use crate::schema::{FieldDescriptor, SchemaError, SchemaView, ValidationError};

/// A malformed external array reference encountered during a load.
#[derive(Debug, Error)]
pub enum MalformedArrayReferenceError {
    /// A structured reference has no `source` list, or the list is empty.
    #[error("array field {field} has no source")]
    MissingSource {
        /// The array field.
        field: String,
    },
    /// A source entry has no `format`.
    #[error("array field {field}: source has no format")]
    MissingFormat {
        /// The array field.
        field: String,
    },
    /// A source entry has no `file`.
    #[error("array field {field}: source has no file")]
    MissingFile {
        /// The array field.
        field: String,
    },
    /// A source entry carries a format tag this crate does not know.
    #[error("array field {field}: unrecognized format {format}")]
    UnknownFormat {
        /// The array field.
        field: String,
        /// The unrecognized tag.
        format: String,
    },
    /// A source entry carries a known format tag, but no codec for it is
    /// registered with this loader.
    #[error("array field {field}: format {format} is not registered with this loader")]
    UnregisteredFormat {
        /// The array field.
        field: String,
        /// The format.
        format: ArrayFileFormat,
    },
    /// A bare reference path matches no registered codec's suffix.
    #[error("array field {field}: path {path} matches no registered codec")]
    UnknownSuffix {
        /// The array field.
        field: String,
        /// The referenced path.
        path: String,
    },
    /// The reference is neither a path string nor a source mapping.
    #[error("array field {field} holds a {found}, expected a path string or a source mapping")]
    InvalidShape {
        /// The array field.
        field: String,
        /// The YAML kind found.
        found: &'static str,
    },
}

/// A load error.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A schema lookup failed (including keys the schema does not declare).
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// The reconstructed field map does not satisfy the target class.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// An external array reference is malformed.
    #[error(transparent)]
    MalformedReference(#[from] MalformedArrayReferenceError),
    /// An array codec failed.
    #[error(transparent)]
    Codec(#[from] ArrayCodecError),
    /// An inline array value is malformed.
    #[error(transparent)]
    ArrayValue(#[from] ArrayValueError),
    /// The document does not parse as YAML.
    #[error(transparent)]
    Parse(#[from] serde_yaml::Error),
    /// The serialized form of a class is not a mapping.
    #[error("the serialized form of class {class} is a {found}, expected a mapping")]
    NotAMapping {
        /// The target class.
        class: String,
        /// The YAML kind found.
        found: &'static str,
    },
    /// A mapping key is not a string.
    #[error("class {class} has a non-string key ({found})")]
    NonStringKey {
        /// The target class.
        class: String,
        /// The YAML kind of the key.
        found: &'static str,
    },
    /// A scalar field holds a non-scalar value.
    #[error("field {field} of class {class} holds a {found}, expected a scalar")]
    ExpectedScalar {
        /// The target class.
        class: String,
        /// The field.
        field: String,
        /// The YAML kind found.
        found: &'static str,
    },
    /// A Zarr group open error.
    #[cfg(feature = "zarr")]
    #[error(transparent)]
    ZarrGroup(#[from] zarrs::group::GroupCreateError),
    /// A Zarr storage error.
    #[cfg(feature = "zarr")]
    #[error(transparent)]
    ZarrStorage(#[from] zarrs::storage::StorageError),
    /// An invalid Zarr store key.
    #[cfg(feature = "zarr")]
    #[error(transparent)]
    ZarrStoreKey(#[from] zarrs::storage::StoreKeyError),
    /// An HDF5 error.
    #[cfg(feature = "hdf5")]
    #[error(transparent)]
    Hdf5(#[from] hdf5::Error),
}

/// Resolves the stored form of an array field back into a tensor.
pub(crate) trait ArrayResolver {
    fn resolve(
        &self,
        class: &str,
        descriptor: &FieldDescriptor,
        value: &serde_yaml::Value,
    ) -> Result<NdArray, LoadError>;
}

struct InlineResolver;

impl ArrayResolver for InlineResolver {
    fn resolve(
        &self,
        _class: &str,
        descriptor: &FieldDescriptor,
        value: &serde_yaml::Value,
    ) -> Result<NdArray, LoadError> {
        Ok(NdArray::from_yaml_value(value, descriptor.scalar_type)?)
    }
}

struct FileResolver<'a> {
    codecs: &'a [Box<dyn ArrayFileCodec>],
    base_dir: &'a Path,
}

impl FileResolver<'_> {
    fn codec_for_format(&self, format: ArrayFileFormat) -> Option<&dyn ArrayFileCodec> {
        self.codecs
            .iter()
            .map(AsRef::as_ref)
            .find(|codec| codec.format() == format)
    }

    fn codec_for_path(&self, path: &str) -> Option<&dyn ArrayFileCodec> {
        self.codecs
            .iter()
            .map(AsRef::as_ref)
            .find(|codec| path.ends_with(codec.suffix()))
    }

    fn read(&self, codec: &dyn ArrayFileCodec, path: &str) -> Result<NdArray, LoadError> {
        let relative = path.strip_prefix("./").unwrap_or(path);
        Ok(codec.read(&self.base_dir.join(relative))?)
    }
}

impl ArrayResolver for FileResolver<'_> {
    fn resolve(
        &self,
        _class: &str,
        descriptor: &FieldDescriptor,
        value: &serde_yaml::Value,
    ) -> Result<NdArray, LoadError> {
        let field = &descriptor.name;
        match value {
            serde_yaml::Value::String(reference) => {
                let path = reference.strip_prefix("file:").unwrap_or(reference);
                let codec = self.codec_for_path(path).ok_or_else(|| {
                    MalformedArrayReferenceError::UnknownSuffix {
                        field: field.clone(),
                        path: path.to_string(),
                    }
                })?;
                self.read(codec, path)
            }
            serde_yaml::Value::Mapping(mapping) => {
                let source = mapping
                    .get("source")
                    .and_then(serde_yaml::Value::as_sequence)
                    .and_then(|sources| sources.first())
                    .and_then(serde_yaml::Value::as_mapping)
                    .ok_or_else(|| MalformedArrayReferenceError::MissingSource {
                        field: field.clone(),
                    })?;
                let format = source
                    .get("format")
                    .and_then(serde_yaml::Value::as_str)
                    .ok_or_else(|| MalformedArrayReferenceError::MissingFormat {
                        field: field.clone(),
                    })?;
                let format = ArrayFileFormat::from_name(format).ok_or_else(|| {
                    MalformedArrayReferenceError::UnknownFormat {
                        field: field.clone(),
                        format: format.to_string(),
                    }
                })?;
                let file = source
                    .get("file")
                    .and_then(serde_yaml::Value::as_str)
                    .ok_or_else(|| MalformedArrayReferenceError::MissingFile {
                        field: field.clone(),
                    })?;
                let codec = self.codec_for_format(format).ok_or(
                    MalformedArrayReferenceError::UnregisteredFormat {
                        field: field.clone(),
                        format,
                    },
                )?;
                self.read(codec, file)
            }
            other => Err(MalformedArrayReferenceError::InvalidShape {
                field: field.clone(),
                found: yaml_kind(other),
            }
            .into()),
        }
    }
}

pub(crate) fn yaml_to_scalar(value: &serde_yaml::Value) -> Option<Scalar> {
    match value {
        serde_yaml::Value::Bool(b) => Some(Scalar::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Scalar::Int(i))
            } else {
                n.as_f64().map(Scalar::Float)
            }
        }
        serde_yaml::Value::String(s) => Some(Scalar::Str(s.clone())),
        _ => None,
    }
}

/// Walk a parsed mapping and reconstruct the field map of `class`.
pub(crate) fn walk(
    mapping: &serde_yaml::Mapping,
    schema: &SchemaView,
    class: &str,
    resolver: &dyn ArrayResolver,
) -> Result<IndexMap<String, Value>, LoadError> {
    let mut fields = IndexMap::with_capacity(mapping.len());
    for (key, value) in mapping {
        let serde_yaml::Value::String(field_name) = key else {
            return Err(LoadError::NonStringKey {
                class: class.to_string(),
                found: yaml_kind(key),
            });
        };
        let descriptor = schema.field_descriptor(class, field_name)?;
        let loaded = if descriptor.is_array {
            Value::Array(resolver.resolve(class, descriptor, value)?)
        } else if let (Some(nested_type), serde_yaml::Value::Mapping(nested)) =
            (&descriptor.nested_type, value)
        {
            let nested_fields = walk(nested, schema, nested_type, resolver)?;
            Value::Record(schema.construct(nested_type, nested_fields)?)
        } else {
            Value::Scalar(yaml_to_scalar(value).ok_or_else(|| LoadError::ExpectedScalar {
                class: class.to_string(),
                field: field_name.clone(),
                found: yaml_kind(value),
            })?)
        };
        fields.insert(field_name.clone(), loaded);
    }
    Ok(fields)
}

fn load_mapping(source: &str, class: &str) -> Result<serde_yaml::Mapping, LoadError> {
    let value: serde_yaml::Value = serde_yaml::from_str(source)?;
    match value {
        serde_yaml::Value::Mapping(mapping) => Ok(mapping),
        other => Err(LoadError::NotAMapping {
            class: class.to_string(),
            found: yaml_kind(&other),
        }),
    }
}

/// Loads an element from a YAML document with inline arrays.
#[derive(Debug, Default)]
pub struct YamlLoader;

impl YamlLoader {
    /// Create a loader.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Reconstruct an element of class `target_class` from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the document does not parse, a key is
    /// unknown to the schema, an inline array is malformed, or the
    /// reconstructed field map fails validation.
    pub fn loads(
        &self,
        source: &str,
        target_class: &str,
        schema: &SchemaView,
    ) -> Result<Element, LoadError> {
        let mapping = load_mapping(source, target_class)?;
        let fields = walk(&mapping, schema, target_class, &InlineResolver)?;
        Ok(schema.construct(target_class, fields)?)
    }
}

/// Loads an element from a YAML document whose array fields reference
/// sibling array files.
///
/// The loader holds a registry of codecs: bare `file:./…` references
/// dispatch on the path suffix, structured `source` references on the
/// explicit format tag. A reference to a format without a registered codec
/// fails with [`MalformedArrayReferenceError`]; bytes are never reinterpreted
/// by a mismatched codec.
#[derive(Default)]
pub struct YamlArrayFileLoader {
    codecs: Vec<Box<dyn ArrayFileCodec>>,
    base_dir: PathBuf,
}

impl YamlArrayFileLoader {
    /// Create a loader with no registered codecs, resolving references
    /// relative to the current working directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            codecs: Vec::new(),
            base_dir: PathBuf::from("."),
        }
    }

    /// A loader accepting only NumPy `.npy` references.
    #[cfg(feature = "numpy")]
    #[must_use]
    pub fn numpy() -> Self {
        Self::new().with_codec(crate::codec::NpyCodec::new())
    }

    /// A loader accepting only HDF5 references.
    #[cfg(feature = "hdf5")]
    #[must_use]
    pub fn hdf5() -> Self {
        Self::new().with_codec(crate::codec::Hdf5Codec::new())
    }

    /// A loader accepting only NetCDF references.
    #[cfg(feature = "netcdf")]
    #[must_use]
    pub fn netcdf() -> Self {
        Self::new().with_codec(crate::codec::NetcdfCodec::new())
    }

    /// A loader accepting only Zarr references.
    #[cfg(feature = "zarr")]
    #[must_use]
    pub fn zarr() -> Self {
        Self::new().with_codec(crate::codec::ZarrCodec::new())
    }

    /// Register an additional codec.
    #[must_use]
    pub fn with_codec(mut self, codec: impl ArrayFileCodec + 'static) -> Self {
        self.codecs.push(Box::new(codec));
        self
    }

    /// Resolve relative references against `base_dir` instead of the
    /// current working directory.
    #[must_use]
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Reconstruct an element of class `target_class` from a YAML string,
    /// reading every referenced array file fully into memory.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the document does not parse, a reference is
    /// malformed or unresolvable, a codec read fails, or the reconstructed
    /// field map fails validation.
    pub fn loads(
        &self,
        source: &str,
        target_class: &str,
        schema: &SchemaView,
    ) -> Result<Element, LoadError> {
        let mapping = load_mapping(source, target_class)?;
        let resolver = FileResolver {
            codecs: &self.codecs,
            base_dir: &self.base_dir,
        };
        let fields = walk(&mapping, schema, target_class, &resolver)?;
        Ok(schema.construct(target_class, fields)?)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

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
    fn inline_load_flat_record() {
        let schema = SchemaView::from_yaml_str(SCHEMA).unwrap();
        let element = YamlLoader::new()
            .loads("name: s1\nvalues:\n- 1\n- 2\n- 3\n", "Sample", &schema)
            .unwrap();
        assert_eq!(element.scalar("name"), Some(&Scalar::from("s1")));
        assert_eq!(
            element.get("values").and_then(Value::as_array),
            Some(&NdArray::Int64(array![1, 2, 3].into_dyn()))
        );
    }

    #[test]
    fn unknown_key_is_rejected() {
        let schema = SchemaView::from_yaml_str(SCHEMA).unwrap();
        let err = YamlLoader::new()
            .loads("name: s1\nbogus: 1\n", "Sample", &schema)
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::Schema(SchemaError::UnknownField { .. })
        ));
    }

    #[test]
    fn missing_required_field_fails_validation() {
        let schema = SchemaView::from_yaml_str(SCHEMA).unwrap();
        let err = YamlLoader::new()
            .loads("values:\n- 1\n", "Sample", &schema)
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::Validation(ValidationError::MissingRequiredField { .. })
        ));
    }

    #[test]
    fn reference_without_source_is_malformed() {
        let schema = SchemaView::from_yaml_str(SCHEMA).unwrap();
        let err = YamlArrayFileLoader::new()
            .loads("name: s1\nvalues: {}\n", "Sample", &schema)
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::MalformedReference(MalformedArrayReferenceError::MissingSource { .. })
        ));
    }

    #[test]
    fn reference_with_unrecognized_format_is_malformed() {
        let schema = SchemaView::from_yaml_str(SCHEMA).unwrap();
        let yaml = "name: s1\nvalues:\n  source:\n  - file: ./x.bin\n    format: parquet\n";
        let err = YamlArrayFileLoader::new()
            .loads(yaml, "Sample", &schema)
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::MalformedReference(MalformedArrayReferenceError::UnknownFormat { .. })
        ));
    }

    #[cfg(feature = "numpy")]
    #[test]
    fn foreign_suffix_is_rejected_by_a_numpy_only_loader() {
        let schema = SchemaView::from_yaml_str(SCHEMA).unwrap();
        let err = YamlArrayFileLoader::numpy()
            .loads("name: s1\nvalues: file:./s1.values.h5\n", "Sample", &schema)
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::MalformedReference(MalformedArrayReferenceError::UnknownSuffix { .. })
        ));
    }

    #[cfg(feature = "numpy")]
    #[test]
    fn foreign_format_tag_is_rejected_by_a_numpy_only_loader() {
        let schema = SchemaView::from_yaml_str(SCHEMA).unwrap();
        let yaml = "name: s1\nvalues:\n  source:\n  - file: ./s1.values.h5\n    format: hdf5\n";
        let err = YamlArrayFileLoader::numpy()
            .loads(yaml, "Sample", &schema)
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::MalformedReference(MalformedArrayReferenceError::UnregisteredFormat { .. })
        ));
    }
}
