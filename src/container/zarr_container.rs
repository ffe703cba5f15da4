//! The Zarr directory-store container.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use zarrs::group::{Group, GroupBuilder};
use zarrs::storage::{ReadableStorageTraits, StoreKey};

use zarrs::filesystem::FilesystemStore;

use crate::codec::zarr_codec::{read_array, write_array};
use crate::codec::ArrayCodecError;
use crate::dump::DumpError;
use crate::element::{Element, Scalar, Value};
use crate::load::LoadError;
use crate::schema::SchemaView;

fn child_path(parent: &str, field: &str) -> String {
    if parent == "/" {
        format!("/{field}")
    } else {
        format!("{parent}/{field}")
    }
}

fn scalar_to_json(scalar: &Scalar) -> Result<serde_json::Value, std::io::Error> {
    Ok(match scalar {
        Scalar::Bool(b) => serde_json::Value::Bool(*b),
        Scalar::Int(i) => serde_json::Value::Number((*i).into()),
        Scalar::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("non-finite float {f} cannot be stored as a group attribute"),
                )
            })?,
        Scalar::Str(s) => serde_json::Value::String(s.clone()),
    })
}

fn json_to_scalar(value: &serde_json::Value) -> Option<Scalar> {
    match value {
        serde_json::Value::Bool(b) => Some(Scalar::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Scalar::Int(i))
            } else {
                n.as_f64().map(Scalar::Float)
            }
        }
        serde_json::Value::String(s) => Some(Scalar::Str(s.clone())),
        _ => None,
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn write_element(
    store: &Arc<FilesystemStore>,
    node_path: &str,
    element: &Element,
    schema: &SchemaView,
) -> Result<(), DumpError> {
    let class = element.type_name();
    let mut group = GroupBuilder::new().build(store.clone(), node_path)?;
    for (field_name, value) in element.fields() {
        let descriptor = schema.field_descriptor(class, field_name)?;
        match value {
            Value::Scalar(scalar) if !descriptor.is_array && descriptor.nested_type.is_none() => {
                group
                    .attributes_mut()
                    .insert(field_name.clone(), scalar_to_json(scalar)?);
            }
            Value::Array(_) if descriptor.is_array => {}
            Value::Record(_) if descriptor.nested_type.is_some() => {}
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
    group.store_metadata()?;
    for (field_name, value) in element.fields() {
        let child = child_path(node_path, field_name);
        match value {
            Value::Array(array) => write_array(store.clone(), &child, array)?,
            Value::Record(nested) => write_element(store, &child, nested, schema)?,
            Value::Scalar(_) => {}
        }
    }
    Ok(())
}

fn descriptor_kind(descriptor: &crate::schema::FieldDescriptor) -> &'static str {
    if descriptor.is_array {
        "array"
    } else if descriptor.nested_type.is_some() {
        "record"
    } else {
        "scalar"
    }
}

fn node_exists(store: &Arc<FilesystemStore>, node_path: &str) -> Result<bool, LoadError> {
    let key = if node_path == "/" {
        StoreKey::new("zarr.json")?
    } else {
        StoreKey::new(format!("{}/zarr.json", node_path.trim_start_matches('/')))?
    };
    Ok(store.get(&key)?.is_some())
}

fn read_element(
    store: &Arc<FilesystemStore>,
    node_path: &str,
    schema: &SchemaView,
    class: &str,
) -> Result<Element, LoadError> {
    let group = Group::open(store.clone(), node_path)?;
    let mut fields = IndexMap::new();
    for descriptor in schema.fields(class)? {
        let name = descriptor.name.clone();
        if descriptor.is_array {
            let child = child_path(node_path, &name);
            if node_exists(store, &child)? {
                let array = read_array(store.clone(), &child).map_err(LoadError::Codec)?;
                fields.insert(name, Value::Array(array));
            }
        } else if let Some(nested_type) = descriptor.nested_type.clone() {
            let child = child_path(node_path, &name);
            if node_exists(store, &child)? {
                let nested = read_element(store, &child, schema, &nested_type)?;
                fields.insert(name, Value::Record(nested));
            }
        } else if let Some(value) = group.attributes().get(&name) {
            let scalar = json_to_scalar(value).ok_or_else(|| LoadError::ExpectedScalar {
                class: class.to_string(),
                field: name.clone(),
                found: json_kind(value),
            })?;
            fields.insert(name, Value::Scalar(scalar));
        }
    }
    Ok(schema.construct(class, fields)?)
}

/// Dumps a record tree into a single Zarr directory store.
///
/// The store is recreated from scratch on every dump; a pre-existing store
/// at the target path is removed first.
#[derive(Copy, Clone, Debug, Default)]
pub struct ZarrDumper;

impl ZarrDumper {
    /// Create a dumper.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Dump `element` into a Zarr store rooted at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DumpError`] if a field does not match its declaration or
    /// the store cannot be written.
    pub fn dump(
        &self,
        element: &Element,
        schema: &SchemaView,
        path: impl AsRef<Path>,
    ) -> Result<(), DumpError> {
        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }
        let store = Arc::new(FilesystemStore::new(path).map_err(ArrayCodecError::from)?);
        write_element(&store, "/", element, schema)
    }
}

/// Loads a record tree from a single Zarr directory store.
#[derive(Copy, Clone, Debug, Default)]
pub struct ZarrLoader;

impl ZarrLoader {
    /// Create a loader.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Reconstruct an element of class `target_class` from the Zarr store
    /// rooted at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the store cannot be read, a stored value
    /// does not match its declaration, or validation fails.
    pub fn load(
        &self,
        path: impl AsRef<Path>,
        target_class: &str,
        schema: &SchemaView,
    ) -> Result<Element, LoadError> {
        let store = Arc::new(FilesystemStore::new(path.as_ref()).map_err(ArrayCodecError::from)?);
        read_element(&store, "/", schema, target_class)
    }
}
