use ndarray::array;

use arraydoc::{Element, NdArray, Scalar, SchemaView, Value, YamlDumper, YamlLoader};

const SCHEMA: &str = r"
classes:
  Temperature:
    identifier: id
    attributes:
      id: {range: string, required: true}
      date: {range: string}
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
        .with("date", Scalar::from("2024-01-01"))
        .with("latitude_in_deg", latitude)
        .with(
            "temperatures_in_K",
            NdArray::Float64(array![[[272.0, 273.0], [274.0, 275.0]]].into_dyn()),
        )
}

#[test]
fn inline_dump_then_load_preserves_the_tree() {
    let schema = SchemaView::from_yaml_str(SCHEMA).unwrap();
    let element = temperature();

    let yaml = YamlDumper::new().dumps(&element, &schema).unwrap();
    let loaded = YamlLoader::new()
        .loads(&yaml, "Temperature", &schema)
        .unwrap();

    assert_eq!(loaded, element);
}

#[test]
fn inline_dump_embeds_arrays_as_nested_sequences() {
    let schema = SchemaView::from_yaml_str(SCHEMA).unwrap();
    let yaml = YamlDumper::new().dumps(&temperature(), &schema).unwrap();

    assert!(yaml.contains("id: my_temperature"));
    assert!(yaml.contains("latitude_in_deg:\n  values:\n  - 51.0\n"));
    // Rank 3 nests three levels of sequences.
    assert!(yaml.contains("- - - 272.0\n"));
}

#[test]
fn inline_load_preserves_declared_float_ranges() {
    let schema = SchemaView::from_yaml_str(SCHEMA).unwrap();
    // Whole-number floats serialize without a fractional part in some
    // hand-written documents; the declared range still wins.
    let yaml = "id: t0\ntemperatures_in_K:\n- - - 272\n    - 273\n  - - 274\n    - 275\n";
    let loaded = YamlLoader::new()
        .loads(yaml, "Temperature", &schema)
        .unwrap();

    assert_eq!(
        loaded.get("temperatures_in_K").and_then(Value::as_array),
        Some(&NdArray::Float64(
            array![[[272.0, 273.0], [274.0, 275.0]]].into_dyn()
        ))
    );
}
