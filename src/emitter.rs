//! Render values as a minimal YAML dialect.
//!
//! Output is block style throughout. Non-collection leaves reuse the JSON
//! scalar emission, so strings come out double-quoted and numbers match the
//! JSON writer exactly. Root-level members are separated by one blank line.

use crate::json::{self, JsonFormat};
use crate::value::{Object, Value};

fn push_spaces(out: &mut String, count: usize) {
    for _ in 0..count {
        out.push(' ');
    }
}

fn write_key(out: &mut String, key: &str) {
    if json::is_bare_key(key) {
        out.push_str(key);
    } else {
        json::write_json_string(out, key);
    }
}

fn write_leaf(out: &mut String, value: &Value, format: &JsonFormat) {
    match value {
        Value::Object(_) => out.push_str("{}"),
        Value::Array(_) => out.push_str("[]"),
        _ => json::write_json_scalar(out, value, format),
    }
}

/// Write one `key: value` member. The current line is already indented to
/// `col`; nested blocks indent to `col + width`.
fn write_member(
    out: &mut String,
    key: &str,
    value: &Value,
    width: usize,
    col: usize,
    format: &JsonFormat,
) {
    write_key(out, key);
    match value {
        Value::Object(object) if !object.is_empty() => {
            out.push_str(":\n");
            write_object_body(out, object, width, col + width, format);
        }
        Value::Array(elts) if !elts.is_empty() => {
            out.push_str(":\n");
            write_array_body(out, elts.as_ref(), width, col + width, format);
        }
        other => {
            out.push_str(": ");
            write_leaf(out, other, format);
            out.push('\n');
        }
    }
}

fn write_object_body(
    out: &mut String,
    object: &Object,
    width: usize,
    col: usize,
    format: &JsonFormat,
) {
    for (key, value) in object.iter() {
        push_spaces(out, col);
        write_member(out, key, value, width, col, format);
    }
}

fn write_array_body(
    out: &mut String,
    elts: &[Value],
    width: usize,
    col: usize,
    format: &JsonFormat,
) {
    for elt in elts {
        push_spaces(out, col);
        out.push('-');
        match elt {
            Value::Object(object) if !object.is_empty() => {
                // The first member shares the dash line; the rest align
                // under it.
                out.push(' ');
                for (i, (key, value)) in object.iter().enumerate() {
                    if i > 0 {
                        push_spaces(out, col + 2);
                    }
                    write_member(out, key, value, width, col + 2, format);
                }
            }
            Value::Array(nested) if !nested.is_empty() => {
                out.push('\n');
                write_array_body(out, nested.as_ref(), width, col + width, format);
            }
            other => {
                out.push(' ');
                write_leaf(out, other, format);
                out.push('\n');
            }
        }
    }
}

/// Render a value as block-style YAML with the given indentation width
/// (two spaces when `indent` is not positive).
pub fn as_yaml(value: &Value, indent: i32) -> String {
    let width = if indent >= 1 { indent as usize } else { 2 };
    let format = JsonFormat::default();
    let mut out = String::new();
    match value {
        Value::Object(object) if !object.is_empty() => {
            for (i, (key, member)) in object.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                write_member(&mut out, key, member, width, 0, &format);
            }
        }
        Value::Array(elts) if !elts.is_empty() => {
            write_array_body(&mut out, elts.as_ref(), width, 0, &format);
        }
        other => {
            write_leaf(&mut out, other, &format);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_yaml_text;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn nested_objects_and_blank_root_separators() {
        let value = load_yaml_text(indoc! {"
            model:
              mesh: a
              lods: 3
            paint: red
        "})
        .unwrap();
        assert_eq!(
            as_yaml(&value, 2),
            indoc! {r#"
                model:
                  mesh: "a"
                  lods: 3

                paint: "red"
            "#}
        );
    }

    #[test]
    fn arrays_and_scalars() {
        let value = load_yaml_text(indoc! {"
            items:
              - 1
              - two
            empty: []
            nothing:
        "})
        .unwrap();
        assert_eq!(
            as_yaml(&value, 2),
            indoc! {r#"
                items:
                  - 1
                  - "two"

                empty: []

                nothing: null
            "#}
        );
    }

    #[test]
    fn objects_in_arrays_share_the_dash_line() {
        let value = load_yaml_text(indoc! {"
            list:
              - x: 1
                y: 2
        "})
        .unwrap();
        assert_eq!(
            as_yaml(&value, 2),
            indoc! {"
                list:
                  - x: 1
                    y: 2
            "}
        );
    }

    #[test]
    fn awkward_keys_are_quoted() {
        let mut value = Value::Null;
        value.set_member("needs quotes", Value::from(1i32));
        assert_eq!(as_yaml(&value, 2), "\"needs quotes\": 1\n");
    }

    #[test]
    fn custom_indent_width() {
        let value = load_yaml_text("a:\n  b: 1\n").unwrap();
        assert_eq!(as_yaml(&value, 4), "a:\n    b: 1\n");
    }

    #[test]
    fn emitted_yaml_reparses_equal() {
        let value = load_yaml_text(indoc! {"
            model:
              mesh: a
              weights: [0.5, 1.5]
            tags:
              - one
              - two
        "})
        .unwrap();
        let reparsed = load_yaml_text(&as_yaml(&value, 2)).unwrap();
        assert_eq!(value, reparsed);
    }
}
