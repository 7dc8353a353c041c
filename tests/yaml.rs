//! End-to-end YAML ingestion scenarios.

use configtree::{load_yaml, load_yaml_text, Value};
use indoc::indoc;
use pretty_assertions::assert_eq;

#[test]
fn octal_prefix_rewrite() {
    let value = load_yaml_text("key: 0o17").unwrap();
    assert_eq!(value.member("key"), &Value::Int32(15));
}

#[test]
fn folded_scalar_with_strip_chomping() {
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
fn literal_scalar_with_keep_chomping() {
    let value = load_yaml_text("value: |+\n  line\n\n\n").unwrap();
    assert_eq!(value.member("value").as_str(""), "line\n\n\n");
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
}

#[test]
fn flow_mapping_with_implicit_null() {
    let value = load_yaml_text("{ a: 1, b: [2, 3], c: }").unwrap();
    assert_eq!(value.member("a"), &Value::Int32(1));
    assert_eq!(value.member_path("b[0]"), &Value::Int32(2));
    assert_eq!(value.member_path("b[1]"), &Value::Int32(3));
    assert!(value.member("c").is_null());
}

#[test]
fn double_quoted_unicode_escapes() {
    let value = load_yaml_text("v: \"\\x41\\u00e9\\U0001F600\"").unwrap();
    assert_eq!(value.member("v").as_str(""), "A\u{e9}\u{1F600}");
}

#[test]
fn utf16le_input_with_bom() {
    let text = "key: 1\n";
    let mut bytes = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    let mut input: &[u8] = &bytes;
    let value = load_yaml(&mut input).unwrap();
    assert_eq!(value.member("key"), &Value::Int32(1));
}

#[test]
fn utf16be_input_with_bom() {
    let text = "key: marble\n";
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    let mut input: &[u8] = &bytes;
    let value = load_yaml(&mut input).unwrap();
    assert_eq!(value.member("key").as_str(""), "marble");
}

#[test]
fn nested_block_structures() {
    let value = load_yaml_text(indoc! {"
        scene:
          props:
            - name: crate
              mass: 12.5
            - name: barrel
              mass: 40
          flags:
            visible: true
    "})
    .unwrap();
    assert_eq!(value.member_path("scene.props[0].name").as_str(""), "crate");
    assert_eq!(value.member_path("scene.props[1].mass").as_i32(0), 40);
    assert_eq!(value.member_path("scene.flags.visible").as_bool(false), true);
    assert_eq!(value.member_path("scene.props").num_elts(), 2);
}

#[test]
fn comments_are_skipped() {
    let value = load_yaml_text(indoc! {"
        # leading comment
        key: 1 # trailing comment
        other: 2
    "})
    .unwrap();
    assert_eq!(value.member("key").as_i32(0), 1);
    assert_eq!(value.member("other").as_i32(0), 2);
}

#[test]
fn sequence_of_scalars_at_root() {
    let value = load_yaml_text("- 1\n- two\n- 3.5\n").unwrap();
    assert_eq!(value.num_elts(), 3);
    assert_eq!(value.elt(0), &Value::Int32(1));
    assert_eq!(value.elt(1).as_str(""), "two");
    assert_eq!(value.elt(2), &Value::Double(3.5));
}

#[test]
fn anchored_scalar_reuse() {
    let value = load_yaml_text(indoc! {"
        first: &n 42
        second: *n
    "})
    .unwrap();
    assert_eq!(value.member("first"), value.member("second"));
}

#[test]
fn empty_document_is_null() {
    assert!(load_yaml_text("").unwrap().is_null());
    assert!(load_yaml_text("---\n").unwrap().is_null());
}

#[test]
fn scanner_errors_carry_positions() {
    let err = load_yaml_text("key: \"unterminated").unwrap_err();
    let text = err.to_string();
    assert!(text.contains("unexpected end of stream"), "{text}");
}

#[test]
fn tab_indentation_in_block_scalar_is_rejected() {
    let err = load_yaml_text("v: |\n\tx\n").unwrap_err();
    assert!(err.to_string().contains("tab character"), "{err}");
}

#[test]
fn explicit_version_directive() {
    let value = load_yaml_text("%YAML 1.1\n---\nkey: 1\n").unwrap();
    assert_eq!(value.member("key").as_i32(0), 1);

    let err = load_yaml_text("%YAML 1.2\n---\nkey: 1\n").unwrap_err();
    assert!(err.to_string().contains("incompatible YAML document"));
}
