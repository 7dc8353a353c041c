//! Materialise the parser's event stream into [`Value`] trees.
//!
//! Plain scalars are classified into null, bool, integer, double or string;
//! every other style yields a string unconditionally. Anchored nodes are
//! recorded in a per-document table and aliases resolve to clones, so an
//! aliased object is a snapshot of the anchored one.

use std::path::Path;

use crate::value::{Object, Value};
use crate::{BinderError, EventData, Mark, Parser, ScalarStyle};

struct AnchorData {
    anchor: String,
    value: Value,
    mark: Mark,
}

fn set_binder_error<T>(problem: impl Into<String>, mark: Mark) -> Result<T, BinderError> {
    Err(BinderError::Problem {
        problem: problem.into(),
        mark,
    })
}

/// Load the next document from the stream, or `None` at stream end.
pub fn load_document(parser: &mut Parser<'_>) -> Result<Option<Value>, BinderError> {
    let mut event = parser.parse()?;
    if let EventData::StreamStart { .. } = event.data {
        event = parser.parse()?;
    }
    match event.data {
        EventData::StreamEnd => return Ok(None),
        EventData::DocumentStart { .. } => {}
        _ => return set_binder_error("did not find expected <document start>", event.start_mark),
    }

    let mut anchors = Vec::new();
    let event = parser.parse()?;
    let value = bind_node(parser, &mut anchors, event)?;

    let event = parser.parse()?;
    if let EventData::DocumentEnd { .. } = event.data {
        Ok(Some(value))
    } else {
        set_binder_error("did not find expected <document end>", event.start_mark)
    }
}

fn bind_node(
    parser: &mut Parser<'_>,
    anchors: &mut Vec<AnchorData>,
    event: crate::Event,
) -> Result<Value, BinderError> {
    let mark = event.start_mark;
    match event.data {
        EventData::Alias { anchor } => {
            for data in anchors.iter() {
                if data.anchor == anchor {
                    return Ok(data.value.clone());
                }
            }
            set_binder_error(format!("unknown anchor '{anchor}'"), mark)
        }
        EventData::Scalar {
            anchor,
            value,
            style,
            ..
        } => {
            let value = scalar_value(&value, style);
            register_anchor(anchors, anchor, &value, mark)?;
            Ok(value)
        }
        EventData::SequenceStart { anchor, .. } => {
            let mut elts = Vec::new();
            loop {
                let event = parser.parse()?;
                if let EventData::SequenceEnd = event.data {
                    break;
                }
                elts.push(bind_node(parser, anchors, event)?);
            }
            let value = Value::from(elts);
            register_anchor(anchors, anchor, &value, mark)?;
            Ok(value)
        }
        EventData::MappingStart { anchor, .. } => {
            let mut object = Object::new();
            loop {
                let key_event = parser.parse()?;
                if let EventData::MappingEnd = key_event.data {
                    break;
                }
                let key_mark = key_event.start_mark;
                let EventData::Scalar {
                    value: key,
                    style: key_style,
                    ..
                } = key_event.data
                else {
                    return set_binder_error("did not find expected scalar key", key_mark);
                };

                let value_event = parser.parse()?;
                let value_mark = value_event.start_mark;
                let value = bind_node(parser, anchors, value_event)?;

                if key == "<<" && key_style == ScalarStyle::Plain {
                    merge_key(&mut object, &value, value_mark)?;
                } else {
                    object.insert(key, value);
                }
            }
            let value = Value::Object(object);
            register_anchor(anchors, anchor, &value, mark)?;
            Ok(value)
        }
        EventData::StreamStart { .. }
        | EventData::StreamEnd
        | EventData::DocumentStart { .. }
        | EventData::DocumentEnd { .. }
        | EventData::SequenceEnd
        | EventData::MappingEnd => {
            set_binder_error("did not find expected node content", mark)
        }
    }
}

/// Apply `<<` merge-key semantics: fill the current mapping from a mapping
/// or a list of mappings, never overwriting keys that are already present.
fn merge_key(object: &mut Object, source: &Value, mark: Mark) -> Result<(), BinderError> {
    match source {
        Value::Object(src) => {
            for (key, value) in src.iter() {
                if object.lookup(key).is_none() {
                    object.insert(key, value.clone());
                }
            }
            Ok(())
        }
        Value::Array(elts) => {
            for elt in elts.iter() {
                merge_key(object, elt, mark)?;
            }
            Ok(())
        }
        _ => set_binder_error(
            format!("cannot merge a {} into a mapping", source.type_name()),
            mark,
        ),
    }
}

fn register_anchor(
    anchors: &mut Vec<AnchorData>,
    anchor: Option<String>,
    value: &Value,
    mark: Mark,
) -> Result<(), BinderError> {
    let Some(anchor) = anchor else {
        return Ok(());
    };
    for data in anchors.iter() {
        if data.anchor == anchor {
            return set_binder_error(
                format!(
                    "found duplicate anchor '{}'; first occurrence at {}",
                    anchor, data.mark
                ),
                mark,
            );
        }
    }
    anchors.push(AnchorData {
        anchor,
        value: value.clone(),
        mark,
    });
    Ok(())
}

/// Classify a plain scalar into a typed value.
fn scalar_value(text: &str, style: ScalarStyle) -> Value {
    if style != ScalarStyle::Plain {
        return Value::from(text);
    }
    if text.is_empty() || text == "~" || text.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if text.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if text.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    // The float keywords are case-sensitive, unlike the booleans.
    match text {
        ".inf" => return Value::Double(f64::INFINITY),
        "-.inf" => return Value::Double(f64::NEG_INFINITY),
        ".nan" => return Value::Double(f64::NAN),
        _ => {}
    }

    let number;
    let mut digits = if text.contains('_') {
        number = text.replace('_', "");
        number.as_str()
    } else {
        text
    };
    let rewritten;
    if let Some(rest) = digits.strip_prefix("0o") {
        // Rewrite the 0o prefix into the classic leading-zero octal form.
        rewritten = format!("0{rest}");
        digits = &rewritten;
    }

    if let Some(parsed) = parse_integer(digits) {
        return if parsed >= i64::from(i32::MIN) && parsed <= i64::from(i32::MAX) {
            Value::Int32(parsed as i32)
        } else {
            Value::Int64(parsed)
        };
    }
    if digits.bytes().any(|byte| byte.is_ascii_digit()) {
        if let Ok(parsed) = digits.parse::<f64>() {
            return Value::Double(parsed);
        }
    }
    Value::from(text)
}

/// Parse a signed integer with base detection: `0x` hex, a leading zero
/// octal, decimal otherwise. The whole text must be consumed.
fn parse_integer(text: &str) -> Option<i64> {
    let (negative, unsigned) = match text.as_bytes().first()? {
        b'+' => (false, &text[1..]),
        b'-' => (true, &text[1..]),
        _ => (false, text),
    };
    let (radix, digits) = if let Some(rest) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        (16, rest)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (8, &unsigned[1..])
    } else {
        (10, unsigned)
    };
    if digits.is_empty() || digits.starts_with('+') || digits.starts_with('-') {
        return None;
    }
    let magnitude = i64::from_str_radix(digits, radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Load the first document of a YAML stream.
pub fn load_yaml(input: &mut dyn std::io::BufRead) -> Result<Value, BinderError> {
    let mut parser = Parser::new();
    parser.set_input(input);
    Ok(load_document(&mut parser)?.unwrap_or(Value::Null))
}

/// Load the first document of a YAML string.
pub fn load_yaml_text(text: &str) -> Result<Value, BinderError> {
    let mut bytes = text.as_bytes();
    load_yaml(&mut bytes)
}

/// Load the first document of a YAML file.
pub fn load_yaml_file(path: &Path) -> Result<Value, BinderError> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    load_yaml(&mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_scalar_typing() {
        let value = load_yaml_text("key: 0o17").unwrap();
        assert_eq!(value.member("key"), &Value::Int32(15));

        let value = load_yaml_text("key: 0x1F").unwrap();
        assert_eq!(value.member("key"), &Value::Int32(31));

        let value = load_yaml_text("key: 010").unwrap();
        assert_eq!(value.member("key"), &Value::Int32(8));

        let value = load_yaml_text("key: 1_000_000").unwrap();
        assert_eq!(value.member("key"), &Value::Int32(1_000_000));

        let value = load_yaml_text("key: -12").unwrap();
        assert_eq!(value.member("key"), &Value::Int32(-12));

        let value = load_yaml_text("key: 5000000000").unwrap();
        assert_eq!(value.member("key"), &Value::Int64(5_000_000_000));

        let value = load_yaml_text("key: 2.5").unwrap();
        assert_eq!(value.member("key"), &Value::Double(2.5));

        let value = load_yaml_text("key: 1e3").unwrap();
        assert_eq!(value.member("key"), &Value::Double(1000.0));
    }

    #[test]
    fn null_and_bool_forms() {
        for text in ["key:", "key: ~", "key: null", "key: NULL"] {
            let value = load_yaml_text(text).unwrap();
            assert!(value.member("key").is_null(), "for input {text:?}");
        }
        assert_eq!(
            load_yaml_text("key: True").unwrap().member("key"),
            &Value::Bool(true)
        );
        assert_eq!(
            load_yaml_text("key: FALSE").unwrap().member("key"),
            &Value::Bool(false)
        );
    }

    #[test]
    fn float_keywords_are_case_sensitive() {
        let value = load_yaml_text("key: .inf").unwrap();
        assert_eq!(value.member("key").as_f64(0.0), f64::INFINITY);
        let value = load_yaml_text("key: -.inf").unwrap();
        assert_eq!(value.member("key").as_f64(0.0), f64::NEG_INFINITY);
        let value = load_yaml_text("key: .nan").unwrap();
        assert!(value.member("key").as_f64(0.0).is_nan());

        // Other spellings stay strings.
        let value = load_yaml_text("key: -Inf").unwrap();
        assert!(value.member("key").is_string());
        let value = load_yaml_text("key: .Inf").unwrap();
        assert!(value.member("key").is_string());
    }

    #[test]
    fn quoted_scalars_bypass_classification() {
        let value = load_yaml_text("key: '15'").unwrap();
        assert_eq!(value.member("key").as_str(""), "15");
        let value = load_yaml_text("key: \"true\"").unwrap();
        assert!(value.member("key").is_string());
    }

    #[test]
    fn flow_mapping_with_missing_value() {
        let value = load_yaml_text("{ a: 1, b: [2, 3], c: }").unwrap();
        assert_eq!(value.member("a"), &Value::Int32(1));
        assert_eq!(value.member_path("b[1]"), &Value::Int32(3));
        assert!(value.member("c").is_null());
        assert_eq!(value.member("b").num_elts(), 2);
    }

    #[test]
    fn anchor_alias_and_merge_key() {
        let value = load_yaml_text(indoc! {"
            defaults: &d
              colour: red
              size: 1
            item:
              <<: *d
              size: 2
        "})
        .unwrap();
        assert_eq!(value.member_path("item.colour").as_str(""), "red");
        assert_eq!(value.member_path("item.size").as_i32(0), 2);
        assert_eq!(value.member_path("defaults.size").as_i32(0), 1);
    }

    #[test]
    fn merge_key_accepts_a_list_of_mappings() {
        let value = load_yaml_text(indoc! {"
            a: &a {x: 1}
            b: &b {x: 9, y: 2}
            item:
              <<: [*a, *b]
        "})
        .unwrap();
        assert_eq!(value.member_path("item.x").as_i32(0), 1);
        assert_eq!(value.member_path("item.y").as_i32(0), 2);
    }

    #[test]
    fn merge_key_rejects_scalars() {
        let err = load_yaml_text(indoc! {"
            item:
              <<: 5
        "})
        .unwrap_err();
        assert!(err.to_string().contains("cannot merge"));
    }

    #[test]
    fn unknown_alias_is_an_error() {
        let err = load_yaml_text("item: *nowhere").unwrap_err();
        assert!(err.to_string().contains("unknown anchor 'nowhere'"));
    }

    #[test]
    fn aliased_objects_are_snapshots() {
        let mut value = load_yaml_text(indoc! {"
            a: &x {k: 1}
            b: *x
        "})
        .unwrap();
        assert_eq!(value.member_path("a.k"), value.member_path("b.k"));
        if let Some(slot) = value.update_member_path("a.k") {
            *slot = Value::Int32(5);
        }
        assert_eq!(value.member_path("a.k").as_i32(0), 5);
        assert_eq!(value.member_path("b.k").as_i32(0), 1);
    }

    #[test]
    fn multiple_documents() {
        let mut bytes: &[u8] = b"---\nfirst\n---\nsecond\n";
        let mut parser = Parser::new();
        parser.set_input(&mut bytes);
        let first = load_document(&mut parser).unwrap().unwrap();
        let second = load_document(&mut parser).unwrap().unwrap();
        assert_eq!(first.as_str(""), "first");
        assert_eq!(second.as_str(""), "second");
        assert!(load_document(&mut parser).unwrap().is_none());
    }

    #[test]
    fn folded_block_scalar_with_chomping() {
        let value = load_yaml_text(indoc! {"
            value: >-
              one
              two

              three
        "})
        .unwrap();
        assert_eq!(value.member("value").as_str(""), "one two\nthree");
    }

    #[test]
    fn duplicate_anchor_is_an_error() {
        let err = load_yaml_text("a: &x 1\nb: &x 2\n").unwrap_err();
        assert!(err.to_string().contains("duplicate anchor"));
    }
}
