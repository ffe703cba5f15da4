//! Schema documents and the schema view consulted during dumps and loads.
//!
//! A [`SchemaDocument`] is a YAML document declaring named classes, their
//! ordered fields and, per class, an optional identifier field. For example:
//!
//! ```yaml
//! name: temperature_dataset
//! classes:
//!   TemperatureDataset:
//!     identifier: name
//!     attributes:
//!       name: {range: string, required: true}
//!       latitude_in_deg: {range: LatitudeSeries}
//!   LatitudeSeries:
//!     attributes:
//!       values: {range: float, array: {rank: 1}}
//! ```
//!
//! A [`SchemaView`] is built once from a document. It resolves every
//! `(class, field)` pair to a [`FieldDescriptor`] up front, so the tree
//! walkers dispatch on precomputed tags rather than re-deriving the kind of
//! each value at runtime.

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

use crate::element::{Element, Value};

/// The scalar type of a field or of an array's elements.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScalarType {
    /// A boolean.
    Bool,
    /// A signed integer.
    Integer,
    /// A floating point number.
    Float,
    /// A string.
    String,
}

impl ScalarType {
    fn from_range(range: &str) -> Option<Self> {
        match range {
            "boolean" => Some(Self::Bool),
            "integer" => Some(Self::Integer),
            "float" | "double" => Some(Self::Float),
            "string" | "date" | "datetime" => Some(Self::String),
            _ => None,
        }
    }
}

/// The declared array shape of an array field.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct ArraySpec {
    /// The declared rank, if any.
    #[serde(default)]
    pub rank: Option<usize>,
}

/// A field declaration within a class.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FieldDocument {
    /// The range: a scalar type name or the name of another class.
    #[serde(default)]
    pub range: Option<String>,
    /// Whether the field must be present on load.
    #[serde(default)]
    pub required: bool,
    /// Present iff the field holds an array; the range then declares the
    /// element type.
    #[serde(default)]
    pub array: Option<ArraySpec>,
}

/// A class declaration.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ClassDocument {
    /// A description, carried but not interpreted.
    #[serde(default)]
    pub description: Option<String>,
    /// The name of the field providing a unique, stable name for instances
    /// of this class, if the class declares one.
    #[serde(default)]
    pub identifier: Option<String>,
    /// The ordered field declarations.
    #[serde(default)]
    pub attributes: IndexMap<String, FieldDocument>,
}

/// A schema document: named classes with ordered fields.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SchemaDocument {
    /// The schema name, carried but not interpreted.
    #[serde(default)]
    pub name: Option<String>,
    /// The class declarations.
    #[serde(default)]
    pub classes: IndexMap<String, ClassDocument>,
}

/// The resolved metadata of one `(class, field)` pair.
///
/// Exactly one of [`is_array`](Self::is_array) and
/// [`nested_type`](Self::nested_type) is meaningfully set for a non-scalar
/// field; a field is scalar iff neither is.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    /// The field name.
    pub name: String,
    /// Whether the field holds an array.
    pub is_array: bool,
    /// The class of the nested element the field holds, if any.
    pub nested_type: Option<String>,
    /// The scalar type of the field, or of the array's elements.
    pub scalar_type: Option<ScalarType>,
    /// The declared array rank, if any.
    pub declared_rank: Option<usize>,
    /// Whether the field must be present on load.
    pub required: bool,
}

/// A schema lookup error.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema document does not parse.
    #[error(transparent)]
    Parse(#[from] serde_yaml::Error),
    /// A class name is not declared in the schema.
    #[error("unknown class {0}")]
    UnknownClass(String),
    /// A field name is not declared on a class.
    #[error("unknown field {field} on class {class}")]
    UnknownField {
        /// The class looked up.
        class: String,
        /// The field looked up.
        field: String,
    },
    /// A class declares an identifier field that it does not have, or that
    /// is not a scalar.
    #[error("class {class} declares identifier field {field} which is not a scalar field of the class")]
    InvalidIdentifier {
        /// The class.
        class: String,
        /// The declared identifier field.
        field: String,
    },
    /// A field's range is neither a scalar type name nor a declared class.
    #[error("field {field} of class {class} has unknown range {range}")]
    UnknownRange {
        /// The class.
        class: String,
        /// The field.
        field: String,
        /// The undeclared range.
        range: String,
    },
}

/// A validation error raised by [`SchemaView::construct`].
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The target class is not declared.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A required field is absent from the field map.
    #[error("missing required field {field} on class {class}")]
    MissingRequiredField {
        /// The class being constructed.
        class: String,
        /// The missing field.
        field: String,
    },
    /// A field value has the wrong kind for its declaration.
    #[error("field {field} on class {class} expects {expected}, found {found}")]
    KindMismatch {
        /// The class being constructed.
        class: String,
        /// The offending field.
        field: String,
        /// The declared kind.
        expected: &'static str,
        /// The kind found.
        found: &'static str,
    },
    /// A nested element is tagged with a class other than the declared one.
    #[error("field {field} on class {class} expects a {expected} element, found {found}")]
    NestedTypeMismatch {
        /// The class being constructed.
        class: String,
        /// The offending field.
        field: String,
        /// The declared nested class.
        expected: String,
        /// The class of the element found.
        found: String,
    },
}

/// A read-only view over a schema document with precomputed field
/// descriptors.
#[derive(Clone, Debug)]
pub struct SchemaView {
    classes: IndexMap<String, ClassView>,
}

#[derive(Clone, Debug)]
struct ClassView {
    identifier: Option<String>,
    fields: IndexMap<String, FieldDescriptor>,
}

impl SchemaView {
    /// Build a view from a parsed schema document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidIdentifier`] if a class declares an
    /// identifier field it does not have, or whose declaration is not
    /// scalar, and [`SchemaError::UnknownRange`] if a field's range names
    /// neither a scalar type nor a class declared in the document.
    pub fn new(document: &SchemaDocument) -> Result<Self, SchemaError> {
        let mut classes = IndexMap::with_capacity(document.classes.len());
        for (class_name, class) in &document.classes {
            let mut fields = IndexMap::with_capacity(class.attributes.len());
            for (field_name, field) in &class.attributes {
                let nested_type = field
                    .range
                    .as_deref()
                    .filter(|range| field.array.is_none() && document.classes.contains_key(*range))
                    .map(str::to_string);
                let scalar_type = field
                    .range
                    .as_deref()
                    .and_then(ScalarType::from_range)
                    .filter(|_| nested_type.is_none());
                if let Some(range) = field.range.as_deref() {
                    if nested_type.is_none() && scalar_type.is_none() {
                        return Err(SchemaError::UnknownRange {
                            class: class_name.clone(),
                            field: field_name.clone(),
                            range: range.to_string(),
                        });
                    }
                }
                fields.insert(
                    field_name.clone(),
                    FieldDescriptor {
                        name: field_name.clone(),
                        is_array: field.array.is_some(),
                        nested_type,
                        scalar_type,
                        declared_rank: field.array.as_ref().and_then(|array| array.rank),
                        required: field.required,
                    },
                );
            }
            if let Some(identifier) = &class.identifier {
                let valid = fields
                    .get(identifier)
                    .is_some_and(|descriptor| !descriptor.is_array && descriptor.nested_type.is_none());
                if !valid {
                    return Err(SchemaError::InvalidIdentifier {
                        class: class_name.clone(),
                        field: identifier.clone(),
                    });
                }
            }
            classes.insert(
                class_name.clone(),
                ClassView {
                    identifier: class.identifier.clone(),
                    fields,
                },
            );
        }
        Ok(Self { classes })
    }

    /// Build a view from a YAML schema document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if the document does not parse or is invalid.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SchemaError> {
        let document: SchemaDocument = serde_yaml::from_str(yaml)?;
        Self::new(&document)
    }

    /// Whether the schema declares class `class`.
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    /// The descriptor of field `field` on class `class`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if the class or field is not declared.
    pub fn field_descriptor(&self, class: &str, field: &str) -> Result<&FieldDescriptor, SchemaError> {
        self.class(class)?
            .fields
            .get(field)
            .ok_or_else(|| SchemaError::UnknownField {
                class: class.to_string(),
                field: field.to_string(),
            })
    }

    /// The declared field descriptors of class `class`, in declared order.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownClass`] if the class is not declared.
    pub fn fields(&self, class: &str) -> Result<impl Iterator<Item = &FieldDescriptor>, SchemaError> {
        Ok(self.class(class)?.fields.values())
    }

    /// The identifier field of class `class`, if the class declares one.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownClass`] if the class is not declared.
    pub fn identifier_field(&self, class: &str) -> Result<Option<&str>, SchemaError> {
        Ok(self.class(class)?.identifier.as_deref())
    }

    /// Construct a validated [`Element`] of class `class` from a field map.
    ///
    /// This is the record-layer constructor consumed by the loaders: it
    /// rejects unknown fields, missing required fields, and values whose
    /// kind does not match their declaration.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the field map does not satisfy the
    /// class declaration.
    pub fn construct(
        &self,
        class: &str,
        fields: IndexMap<String, Value>,
    ) -> Result<Element, ValidationError> {
        let view = self.class(class)?;
        for (field_name, value) in &fields {
            let descriptor =
                view.fields
                    .get(field_name)
                    .ok_or_else(|| SchemaError::UnknownField {
                        class: class.to_string(),
                        field: field_name.clone(),
                    })?;
            let expected = if descriptor.is_array {
                "array"
            } else if descriptor.nested_type.is_some() {
                "record"
            } else {
                "scalar"
            };
            if value.kind() != expected {
                return Err(ValidationError::KindMismatch {
                    class: class.to_string(),
                    field: field_name.clone(),
                    expected,
                    found: value.kind(),
                });
            }
            if let (Some(nested_type), Value::Record(nested)) = (&descriptor.nested_type, value) {
                if nested.type_name() != nested_type {
                    return Err(ValidationError::NestedTypeMismatch {
                        class: class.to_string(),
                        field: field_name.clone(),
                        expected: nested_type.clone(),
                        found: nested.type_name().to_string(),
                    });
                }
            }
        }
        for descriptor in view.fields.values() {
            if descriptor.required && !fields.contains_key(&descriptor.name) {
                return Err(ValidationError::MissingRequiredField {
                    class: class.to_string(),
                    field: descriptor.name.clone(),
                });
            }
        }
        Ok(Element::from_fields(class, fields))
    }

    fn class(&self, class: &str) -> Result<&ClassView, SchemaError> {
        self.classes
            .get(class)
            .ok_or_else(|| SchemaError::UnknownClass(class.to_string()))
    }
}
