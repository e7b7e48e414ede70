// Tokenizer and offsetter property tests
// Round-trips generated lines through parse/serialize and checks that
// offsets are invertible.

use asmbl_gcode::{format_float, offset, parse_line, to_relative_extrusion, ParamValue};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn param_value() -> impl Strategy<Value = ParamValue> {
    prop_oneof![
        (-100_000i64..100_000).prop_map(ParamValue::Int),
        (-10_000.0f64..10_000.0).prop_map(ParamValue::Float),
    ]
}

fn render(letter: char, number: u32, params: &BTreeMap<char, ParamValue>, comment: &str) -> String {
    let mut text = format!("{}{}", letter, number);
    for (key, value) in params {
        let value = match value {
            ParamValue::Float(v) => format_float(*v),
            other => other.to_string(),
        };
        text.push_str(&format!(" {}{}", key, value));
    }
    if !comment.is_empty() {
        text.push_str(&format!(" ; {}", comment));
    }
    text
}

proptest! {
    #[test]
    fn roundtrip_preserves_record(
        letter in prop::sample::select(vec!['G', 'M', 'T']),
        number in 0u32..200,
        params in prop::collection::btree_map(
            prop::sample::select(vec!['X', 'Y', 'Z', 'E', 'F', 'S', 'I', 'J']),
            param_value(),
            0..6,
        ),
        comment in "([a-z]{1,8}( [a-z0-9]{1,8}){0,3})?",
    ) {
        let text = render(letter, number, &params, &comment);
        let parsed = parse_line(&text, false).expect("generated line must parse");
        let reparsed = parse_line(&parsed.to_gcode(), false).expect("serialized line must parse");

        prop_assert_eq!(&parsed, &reparsed);
        prop_assert_eq!(parsed.params.len(), params.len());
        prop_assert_eq!(parsed.comment.as_str(), comment.as_str());
    }

    #[test]
    fn offset_is_invertible(
        x in -500.0f64..500.0,
        z in -50.0f64..50.0,
        dx in -200.0f64..200.0,
        dy in -200.0f64..200.0,
        dz in -5.0f64..5.0,
    ) {
        let line = parse_line(&format!("G1 X{} Z{} F900", format_float(x), format_float(z)), false)
            .expect("move must parse");

        let restored = offset(&offset(&line, dx, dy, dz), -dx, -dy, -dz);

        prop_assert!((restored.param_f64('X').unwrap() - x).abs() < 1e-9);
        prop_assert!((restored.param_f64('Z').unwrap() - z).abs() < 1e-9);
        prop_assert!(!restored.has_param('Y'));
        prop_assert_eq!(restored.param('F'), Some(&ParamValue::Int(900)));
    }

    #[test]
    fn relative_normalization_is_idempotent(
        moves in prop::collection::vec((0.0f64..200.0, 0.0f64..2.0), 1..20),
    ) {
        let mut gcode = String::from("M83\nT0\n");
        for (x, e) in &moves {
            gcode.push_str(&format!("G1 X{} E{}\n", format_float(*x), format_float(*e)));
        }

        let once = to_relative_extrusion(&gcode).unwrap();
        let twice = to_relative_extrusion(&once).unwrap();
        prop_assert_eq!(&once, &gcode);
        prop_assert_eq!(once, twice);
    }
}

#[test]
fn absolute_stream_normalizes_once() {
    let gcode = "M82\nT0\nG92 E0\nG1 X1 E1.0\nG1 X2 E3.0\n";
    let once = to_relative_extrusion(gcode).unwrap();
    assert_eq!(once, "M83\nT0\nG92 E0\nG1 X1 E1.0\nG1 X2 E2.0\n");
    assert_eq!(to_relative_extrusion(&once).unwrap(), once);
}
