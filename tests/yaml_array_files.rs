#![cfg(feature = "numpy")]

use ndarray::array;

use arraydoc::{
    Element, NdArray, ReferenceShape, Scalar, SchemaView, Value, YamlArrayFileDumper,
    YamlArrayFileLoader,
};

const SCHEMA: &str = r"
classes:
  Temperature:
    identifier: id
    attributes:
      id: {range: string, required: true}
      latitude_in_deg:
        range: LatitudeSeries
      temperatures_in_K: {range: float, array: {rank: 3}}
  LatitudeSeries:
    attributes:
      values: {range: float, array: {rank: 1}}
";

fn temperature() -> Element {
    let latitude = Element::new("LatitudeSeries").with(
        "values",
        NdArray::Float64(array![51.0, 51.5, 52.0].into_dyn()),
    );
    Element::new("Temperature")
        .with("id", Scalar::from("my_temperature"))
        .with("latitude_in_deg", latitude)
        .with(
            "temperatures_in_K",
            NdArray::Float64(array![[[272.0, 273.0], [274.0, 275.0]]].into_dyn()),
        )
}

// Array file output must land under the crate root so the recorded
// references stay relative to the current working directory.
fn scratch_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("arraydoc-test-")
        .tempdir_in(".")
        .unwrap()
}

#[test]
fn array_files_are_named_from_the_nearest_identifier() {
    let schema = SchemaView::from_yaml_str(SCHEMA).unwrap();
    let dir = scratch_dir();
    let yaml = YamlArrayFileDumper::numpy()
        .with_output_dir(dir.path())
        .dumps(&temperature(), &schema)
        .unwrap();

    // The element's own identifier names its array; the identifier-less
    // nested series borrows it, qualified by the field that holds it.
    assert!(yaml.contains("my_temperature.temperatures_in_K.npy"));
    assert!(yaml.contains("my_temperature.latitude_in_deg.values.npy"));
    assert!(dir
        .path()
        .join("my_temperature.latitude_in_deg.values.npy")
        .exists());
}

#[test]
fn bare_path_references_round_trip() {
    let schema = SchemaView::from_yaml_str(SCHEMA).unwrap();
    let dir = scratch_dir();
    let element = temperature();

    let yaml = YamlArrayFileDumper::numpy()
        .with_output_dir(dir.path())
        .dumps(&element, &schema)
        .unwrap();
    assert!(yaml.contains("file:./"));

    let loaded = YamlArrayFileLoader::numpy()
        .loads(&yaml, "Temperature", &schema)
        .unwrap();
    assert_eq!(loaded, element);
}

#[test]
fn absolute_output_dirs_outside_the_cwd_record_relative_references() {
    let schema = SchemaView::from_yaml_str(SCHEMA).unwrap();
    // Not under the crate root, so the rewrite needs `..` components.
    let dir = tempfile::tempdir().unwrap();
    let element = temperature();

    let yaml = YamlArrayFileDumper::numpy()
        .with_output_dir(dir.path())
        .dumps(&element, &schema)
        .unwrap();
    // An absolute directory must never be embedded verbatim.
    assert!(!yaml.contains("file:.//"));
    assert!(yaml.contains("file:./.."));

    let loaded = YamlArrayFileLoader::numpy()
        .loads(&yaml, "Temperature", &schema)
        .unwrap();
    assert_eq!(loaded, element);
}

#[test]
fn structured_references_carry_the_format_tag() {
    let schema = SchemaView::from_yaml_str(SCHEMA).unwrap();
    let dir = scratch_dir();
    let element = temperature();

    let yaml = YamlArrayFileDumper::numpy()
        .with_output_dir(dir.path())
        .with_reference_shape(ReferenceShape::StructuredSource)
        .dumps(&element, &schema)
        .unwrap();
    assert!(yaml.contains("format: numpy"));
    assert!(!yaml.contains("file:./"));

    let loaded = YamlArrayFileLoader::numpy()
        .loads(&yaml, "Temperature", &schema)
        .unwrap();
    assert_eq!(loaded, element);
}

#[test]
fn repeated_dumps_overwrite_array_files_in_place() {
    let schema = SchemaView::from_yaml_str(SCHEMA).unwrap();
    let dir = scratch_dir();
    let dumper = YamlArrayFileDumper::numpy().with_output_dir(dir.path());

    dumper.dumps(&temperature(), &schema).unwrap();
    let mut updated = temperature();
    updated.insert(
        "temperatures_in_K",
        NdArray::Float64(array![[[300.0, 301.0]]].into_dyn()),
    );
    let yaml = dumper.dumps(&updated, &schema).unwrap();

    let loaded = YamlArrayFileLoader::numpy()
        .loads(&yaml, "Temperature", &schema)
        .unwrap();
    assert_eq!(loaded, updated);
}

#[cfg(feature = "zarr")]
#[test]
fn zarr_array_files_round_trip_string_arrays() {
    const SERIES_SCHEMA: &str = r"
classes:
  Series:
    identifier: id
    attributes:
      id: {range: string, required: true}
      dates: {range: string, array: {rank: 1}}
";
    let schema = SchemaView::from_yaml_str(SERIES_SCHEMA).unwrap();
    let dir = scratch_dir();
    let element = Element::new("Series")
        .with("id", Scalar::from("s1"))
        .with(
            "dates",
            NdArray::Str(array!["2024-01-01".to_string(), "2024-01-02".to_string()].into_dyn()),
        );

    let yaml = YamlArrayFileDumper::zarr()
        .with_output_dir(dir.path())
        .dumps(&element, &schema)
        .unwrap();
    assert!(yaml.contains("s1.dates.zarr"));

    let loaded = YamlArrayFileLoader::zarr()
        .loads(&yaml, "Series", &schema)
        .unwrap();
    assert_eq!(
        loaded.get("dates").and_then(Value::as_array),
        element.get("dates").and_then(Value::as_array)
    );
}
