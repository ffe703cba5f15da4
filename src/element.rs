//! In-memory record trees.
//!
//! An [`Element`] is one node of the tree being serialized: an ordered
//! field-name to [`Value`] mapping tagged with the name of its class in a
//! [`SchemaView`](crate::schema::SchemaView).
//! Values are scalars, N-dimensional arrays, or nested elements.
//! Instances always form a finite tree; the schema may express recursive
//! class definitions, but a concrete element never contains itself.

use derive_more::Display;
use indexmap::IndexMap;
use ndarray::{ArrayD, IxDyn};
use thiserror::Error;

use crate::schema::ScalarType;

/// A scalar field value.
#[derive(Clone, Debug, Display, PartialEq)]
pub enum Scalar {
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    Str(String),
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// A rectangular tensor held by an array field.
///
/// Rank and element values round-trip exactly through every backend that can
/// represent the element type; backends that cannot fail explicitly rather
/// than coerce.
#[derive(Clone, Debug, PartialEq)]
pub enum NdArray {
    /// A signed 64-bit integer tensor.
    Int64(ArrayD<i64>),
    /// A 64-bit floating point tensor.
    Float64(ArrayD<f64>),
    /// A string tensor (e.g. a date-like series).
    Str(ArrayD<String>),
}

/// An error converting between an [`NdArray`] and an inline YAML value.
#[derive(Debug, Error)]
pub enum ArrayValueError {
    /// A nested sequence is not rectangular.
    #[error("ragged array: expected a sequence of length {expected} at depth {depth}, found length {found}")]
    Ragged {
        /// The nesting depth of the offending sequence.
        depth: usize,
        /// The expected length at that depth.
        expected: usize,
        /// The length found.
        found: usize,
    },
    /// A leaf value is not a number or string, or leaves mix numbers and strings.
    #[error("unsupported array element: {0}")]
    UnsupportedElement(String),
    /// The value is not a sequence at all.
    #[error("expected an inline array (a YAML sequence), found {0}")]
    NotASequence(String),
    /// An empty sequence has no inferable shape or element type, so
    /// zero-element arrays cannot be expressed inline.
    #[error("cannot infer the shape of an empty array")]
    Empty,
}

impl NdArray {
    /// The shape of the tensor.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Int64(array) => array.shape(),
            Self::Float64(array) => array.shape(),
            Self::Str(array) => array.shape(),
        }
    }

    /// The rank (number of dimensions) of the tensor.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    /// A short name for the element type, used in error messages.
    #[must_use]
    pub fn dtype_name(&self) -> &'static str {
        match self {
            Self::Int64(_) => "int64",
            Self::Float64(_) => "float64",
            Self::Str(_) => "string",
        }
    }

    /// Convert the tensor to an inline YAML value: a nested
    /// sequence-of-sequences with the rank preserved.
    #[must_use]
    pub fn to_yaml_value(&self) -> serde_yaml::Value {
        fn nest<T: Clone, F: Copy + Fn(&T) -> serde_yaml::Value>(
            array: &ArrayD<T>,
            leaf: F,
        ) -> serde_yaml::Value {
            if array.ndim() <= 1 {
                serde_yaml::Value::Sequence(array.iter().map(leaf).collect())
            } else {
                serde_yaml::Value::Sequence(
                    array
                        .outer_iter()
                        .map(|subarray| nest(&subarray.to_owned(), leaf))
                        .collect(),
                )
            }
        }
        match self {
            Self::Int64(array) => nest(array, |v| serde_yaml::Value::Number((*v).into())),
            Self::Float64(array) => nest(array, |v| serde_yaml::Value::Number((*v).into())),
            Self::Str(array) => nest(array, |v| serde_yaml::Value::String(v.clone())),
        }
    }

    /// Parse an inline YAML value (a nested sequence-of-sequences) into a
    /// tensor.
    ///
    /// The element type is taken from `scalar_type` if the schema declares
    /// one, otherwise inferred: all-integer leaves parse as `int64`, any
    /// float leaf promotes to `float64`, all-string leaves parse as strings.
    ///
    /// Empty sequences are rejected: the shape probe walks first elements,
    /// so a zero-length dimension leaves both the rank below it and the
    /// element type underdetermined. Zero-element arrays therefore do not
    /// round-trip through the inline form.
    ///
    /// # Errors
    ///
    /// Returns [`ArrayValueError`] if the value is not a rectangular,
    /// non-empty sequence of numbers or strings.
    pub fn from_yaml_value(
        value: &serde_yaml::Value,
        scalar_type: Option<ScalarType>,
    ) -> Result<Self, ArrayValueError> {
        let serde_yaml::Value::Sequence(_) = value else {
            return Err(ArrayValueError::NotASequence(yaml_kind(value).to_string()));
        };

        let mut shape = Vec::new();
        let mut probe = value;
        while let serde_yaml::Value::Sequence(seq) = probe {
            if seq.is_empty() {
                return Err(ArrayValueError::Empty);
            }
            shape.push(seq.len());
            probe = &seq[0];
        }

        let mut leaves = Vec::new();
        flatten(value, &shape, 0, &mut leaves)?;

        let all_integral = leaves
            .iter()
            .all(|leaf| matches!(leaf, serde_yaml::Value::Number(n) if n.is_i64() || n.is_u64()));
        let shape = IxDyn(&shape);
        match scalar_type {
            Some(ScalarType::Float) => Ok(Self::Float64(shaped(
                shape,
                leaves
                    .iter()
                    .map(|leaf| leaf_f64(leaf))
                    .collect::<Result<_, _>>()?,
            )?)),
            Some(ScalarType::Integer) => Ok(Self::Int64(shaped(
                shape,
                leaves
                    .iter()
                    .map(|leaf| leaf_i64(leaf))
                    .collect::<Result<_, _>>()?,
            )?)),
            Some(ScalarType::String) => Ok(Self::Str(shaped(
                shape,
                leaves
                    .iter()
                    .map(|leaf| leaf_str(leaf))
                    .collect::<Result<_, _>>()?,
            )?)),
            Some(ScalarType::Bool) => Err(ArrayValueError::UnsupportedElement(
                "boolean arrays are not supported".to_string(),
            )),
            None => {
                if leaves
                    .iter()
                    .all(|leaf| matches!(leaf, serde_yaml::Value::String(_)))
                {
                    Self::from_yaml_value(value, Some(ScalarType::String))
                } else if all_integral {
                    Self::from_yaml_value(value, Some(ScalarType::Integer))
                } else {
                    Self::from_yaml_value(value, Some(ScalarType::Float))
                }
            }
        }
    }
}

impl From<ArrayD<i64>> for NdArray {
    fn from(array: ArrayD<i64>) -> Self {
        Self::Int64(array)
    }
}

impl From<ArrayD<f64>> for NdArray {
    fn from(array: ArrayD<f64>) -> Self {
        Self::Float64(array)
    }
}

impl From<ArrayD<String>> for NdArray {
    fn from(array: ArrayD<String>) -> Self {
        Self::Str(array)
    }
}

fn shaped<T>(shape: IxDyn, data: Vec<T>) -> Result<ArrayD<T>, ArrayValueError> {
    ArrayD::from_shape_vec(shape, data)
        .map_err(|err| ArrayValueError::UnsupportedElement(err.to_string()))
}

fn flatten<'a>(
    value: &'a serde_yaml::Value,
    shape: &[usize],
    depth: usize,
    leaves: &mut Vec<&'a serde_yaml::Value>,
) -> Result<(), ArrayValueError> {
    if depth == shape.len() {
        if matches!(value, serde_yaml::Value::Sequence(_)) {
            return Err(ArrayValueError::UnsupportedElement(
                "sequence deeper than the inferred rank".to_string(),
            ));
        }
        leaves.push(value);
        return Ok(());
    }
    let serde_yaml::Value::Sequence(seq) = value else {
        return Err(ArrayValueError::Ragged {
            depth,
            expected: shape[depth],
            found: 0,
        });
    };
    if seq.len() != shape[depth] {
        return Err(ArrayValueError::Ragged {
            depth,
            expected: shape[depth],
            found: seq.len(),
        });
    }
    for child in seq {
        flatten(child, shape, depth + 1, leaves)?;
    }
    Ok(())
}

fn leaf_i64(value: &serde_yaml::Value) -> Result<i64, ArrayValueError> {
    match value {
        serde_yaml::Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| ArrayValueError::UnsupportedElement(format!("{n} is not an integer"))),
        other => Err(ArrayValueError::UnsupportedElement(
            yaml_kind(other).to_string(),
        )),
    }
}

fn leaf_f64(value: &serde_yaml::Value) -> Result<f64, ArrayValueError> {
    match value {
        serde_yaml::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ArrayValueError::UnsupportedElement(format!("{n} is not a number"))),
        other => Err(ArrayValueError::UnsupportedElement(
            yaml_kind(other).to_string(),
        )),
    }
}

fn leaf_str(value: &serde_yaml::Value) -> Result<String, ArrayValueError> {
    match value {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        other => Err(ArrayValueError::UnsupportedElement(
            yaml_kind(other).to_string(),
        )),
    }
}

pub(crate) fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "bool",
        serde_yaml::Value::Number(_) => "number",
        serde_yaml::Value::String(_) => "string",
        serde_yaml::Value::Sequence(_) => "sequence",
        serde_yaml::Value::Mapping(_) => "mapping",
        serde_yaml::Value::Tagged(_) => "tagged value",
    }
}

/// A field value: a scalar, an array, or a nested element.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// A scalar.
    Scalar(Scalar),
    /// An N-dimensional array.
    Array(NdArray),
    /// A nested element.
    Record(Element),
}

impl Value {
    /// A short name for the value kind, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Array(_) => "array",
            Self::Record(_) => "record",
        }
    }

    /// The scalar, if this value is one.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// The array, if this value is one.
    #[must_use]
    pub fn as_array(&self) -> Option<&NdArray> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    /// The nested element, if this value is one.
    #[must_use]
    pub fn as_record(&self) -> Option<&Element> {
        match self {
            Self::Record(element) => Some(element),
            _ => None,
        }
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        Self::Scalar(scalar)
    }
}

impl From<NdArray> for Value {
    fn from(array: NdArray) -> Self {
        Self::Array(array)
    }
}

impl From<Element> for Value {
    fn from(element: Element) -> Self {
        Self::Record(element)
    }
}

/// One node of a record tree: an ordered field map tagged with a class name.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    type_name: String,
    fields: IndexMap<String, Value>,
}

impl Element {
    /// Create an empty element of class `type_name`.
    ///
    /// Construction does not validate against a schema; use
    /// [`SchemaView::construct`](crate::schema::SchemaView::construct) to
    /// build a validated element from a field map.
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: IndexMap::new(),
        }
    }

    pub(crate) fn from_fields(type_name: impl Into<String>, fields: IndexMap<String, Value>) -> Self {
        Self {
            type_name: type_name.into(),
            fields,
        }
    }

    /// The class name of this element.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The ordered field map.
    #[must_use]
    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    /// Set field `name` to `value`, appending it to the field order if new.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Set field `name` to `value`, by value (builder form).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// The value of field `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The scalar value of field `name`, if present and a scalar.
    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<&Scalar> {
        self.fields.get(name).and_then(Value::as_scalar)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn array_yaml_round_trip_1d_int() {
        let array = NdArray::Int64(array![1, 2, 3].into_dyn());
        let yaml = array.to_yaml_value();
        assert_eq!(serde_yaml::to_string(&yaml).unwrap(), "- 1\n- 2\n- 3\n");
        let back = NdArray::from_yaml_value(&yaml, None).unwrap();
        assert_eq!(back, array);
    }

    #[test]
    fn array_yaml_round_trip_3d_float() {
        let array = NdArray::Float64(ArrayD::from_shape_vec(IxDyn(&[2, 2, 2]), vec![0.5; 8]).unwrap());
        let yaml = array.to_yaml_value();
        let back = NdArray::from_yaml_value(&yaml, None).unwrap();
        assert_eq!(back.rank(), 3);
        assert_eq!(back, array);
    }

    #[test]
    fn array_yaml_round_trip_2d_strings() {
        let array = NdArray::Str(
            array![
                ["a".to_string(), "b".to_string()],
                ["c".to_string(), "d".to_string()]
            ]
            .into_dyn(),
        );
        let back = NdArray::from_yaml_value(&array.to_yaml_value(), None).unwrap();
        assert_eq!(back, array);
    }

    #[test]
    fn empty_sequences_are_rejected() {
        let value: serde_yaml::Value = serde_yaml::from_str("[]").unwrap();
        assert!(matches!(
            NdArray::from_yaml_value(&value, None),
            Err(ArrayValueError::Empty)
        ));
        let value: serde_yaml::Value = serde_yaml::from_str("[[], []]").unwrap();
        assert!(matches!(
            NdArray::from_yaml_value(&value, None),
            Err(ArrayValueError::Empty)
        ));
    }

    #[test]
    fn array_yaml_string_series() {
        let array = NdArray::Str(
            array!["2024-01-01".to_string(), "2024-01-02".to_string()].into_dyn(),
        );
        let back = NdArray::from_yaml_value(&array.to_yaml_value(), None).unwrap();
        assert_eq!(back, array);
    }

    #[test]
    fn array_yaml_declared_float_promotes_integers() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("[1, 2, 3]").unwrap();
        let array = NdArray::from_yaml_value(&yaml, Some(ScalarType::Float)).unwrap();
        assert_eq!(array, NdArray::Float64(array![1.0, 2.0, 3.0].into_dyn()));
    }

    #[test]
    fn array_yaml_ragged_rejected() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("[[1, 2], [3]]").unwrap();
        assert!(matches!(
            NdArray::from_yaml_value(&yaml, None),
            Err(ArrayValueError::Ragged { depth: 1, expected: 2, found: 1 })
        ));
    }

    #[test]
    fn element_field_order_is_insertion_order() {
        let element = Element::new("TemperatureDataset")
            .with("name", Scalar::from("s1"))
            .with("zeta", Scalar::from(1i64))
            .with("alpha", Scalar::from(2i64));
        let order: Vec<&str> = element.fields().keys().map(String::as_str).collect();
        assert_eq!(order, vec!["name", "zeta", "alpha"]);
    }
}
