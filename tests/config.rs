//! Composer scenarios across real files, plus writer round-trips.

use std::fs;
use std::path::{Path, PathBuf};

use configtree::{
    apply_settings, as_json, as_yaml, load_config, load_yaml_text, ConfigLoad, JsonFormat,
};
use indoc::indoc;
use pretty_assertions::assert_eq;

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write test file");
    path
}

#[test]
fn import_base_with_override() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "base.yml",
        indoc! {r#"
            model:
              mesh: "a"
              colour: "red"
        "#},
    );
    let main = write(
        dir.path(),
        "main.yml",
        indoc! {r#"
            import: "base.yml"
            model:
              colour: "blue"
        "#},
    );

    let mut load = ConfigLoad::default();
    let value = load_config(&main, &mut load);
    assert!(load.errors.is_empty(), "{:?}", load.errors);
    assert_eq!(value.member_path("model.mesh").as_str(""), "a");
    assert_eq!(value.member_path("model.colour").as_str(""), "blue");
    assert_eq!(load.main_path, main);
}

#[test]
fn imports_inside_arrays_are_expanded() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "item.yml", "kind: prop\n");
    let main = write(
        dir.path(),
        "main.yml",
        indoc! {"
            items:
              - import: item.yml
                name: one
              - import: item.yml
                name: two
        "},
    );

    let mut load = ConfigLoad::default();
    let value = load_config(&main, &mut load);
    assert!(load.errors.is_empty(), "{:?}", load.errors);
    assert_eq!(value.member_path("items[0].kind").as_str(""), "prop");
    assert_eq!(value.member_path("items[0].name").as_str(""), "one");
    assert_eq!(value.member_path("items[1].name").as_str(""), "two");
}

#[test]
fn mixed_json_and_yaml_imports() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "physics.json",
        "{\n  gravity: -9.81, // relaxed JSON\n  substeps: 4,\n}",
    );
    write(dir.path(), "render.yml", "fov: 90\n");
    let main = write(
        dir.path(),
        "main.yml",
        "import: [physics.json, render.yml]\nsubsteps: 8\n",
    );

    let mut load = ConfigLoad::default();
    let value = load_config(&main, &mut load);
    assert!(load.errors.is_empty(), "{:?}", load.errors);
    assert_eq!(value.member("gravity").as_f64(0.0), -9.81);
    assert_eq!(value.member("substeps").as_i32(0), 8);
    assert_eq!(value.member("fov").as_i32(0), 90);
}

#[test]
fn variant_import_overlays() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "gfx.yml", "shadows: low\ntextures: low\n");
    write(dir.path(), "gfx_ultra.yml", "shadows: high\n");
    let main = write(dir.path(), "main.yml", "import: gfx.yml\n");

    let mut load = ConfigLoad::with_variant("ultra");
    let value = load_config(&main, &mut load);
    assert_eq!(value.member("shadows").as_str(""), "high");
    assert_eq!(value.member("textures").as_str(""), "low");
    assert!(load.imports.iter().any(|p| p.ends_with("gfx_ultra.yml")));
}

#[test]
fn template_and_import_compose() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "library.yml",
        indoc! {"
            wooden:
              material: wood
              density: 0.6
        "},
    );
    let main = write(
        dir.path(),
        "main.yml",
        indoc! {"
            import: library.yml
            barrel:
              template: wooden
              shape: cylinder
        "},
    );

    let mut load = ConfigLoad::default();
    let value = load_config(&main, &mut load);
    assert!(load.errors.is_empty(), "{:?}", load.errors);
    assert_eq!(value.member_path("barrel.material").as_str(""), "wood");
    assert_eq!(value.member_path("barrel.shape").as_str(""), "cylinder");
    assert_eq!(value.member_path("barrel.density").as_f64(0.0), 0.6);
}

#[test]
fn null_overrides_remove_imported_keys() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "base.yml", "debug: true\nname: base\n");
    let main = write(
        dir.path(),
        "main.yml",
        "import: base.yml\ndebug: null\n",
    );

    let mut load = ConfigLoad::default();
    let value = load_config(&main, &mut load);
    assert!(!value.has_member("debug"));
    assert_eq!(value.member("name").as_str(""), "base");
}

#[test]
fn settings_after_composition() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.yml", "render:\n  width: 640\n");

    let mut load = ConfigLoad::default();
    let mut value = load_config(&main, &mut load);
    let ok = apply_settings(&["render.width=1920", "render.vsync"], &mut value);
    assert!(ok);
    assert_eq!(value.member_path("render.width").as_i32(0), 1920);
    assert_eq!(value.member_path("render.vsync").as_bool(false), true);
}

#[test]
fn yaml_and_json_writers_round_trip() {
    let value = load_yaml_text(indoc! {"
        model:
          mesh: crate
          lods: [1, 2, 3]
        paint:
          colour: red
    "})
    .unwrap();

    let yaml = as_yaml(&value, 2);
    assert_eq!(load_yaml_text(&yaml).unwrap(), value);

    let json = as_json(&value, &JsonFormat::default());
    assert_eq!(configtree::load_json_text(&json).unwrap(), value);
}

#[test]
fn composed_config_survives_emission() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "base.yml", "model:\n  mesh: a\n  colour: red\n");
    let main = write(
        dir.path(),
        "main.yml",
        "import: base.yml\nmodel:\n  colour: blue\n",
    );

    let mut load = ConfigLoad::default();
    let value = load_config(&main, &mut load);
    let reloaded = load_yaml_text(&as_yaml(&value, 2)).unwrap();
    assert_eq!(reloaded, value);
    assert_eq!(reloaded.member_path("model.colour").as_str(""), "blue");
}

#[test]
fn unknown_extension_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.toml", "x = 1\n");

    let mut load = ConfigLoad::default();
    let value = load_config(&main, &mut load);
    assert!(value.is_null());
    assert!(load.errors[0].contains("unrecognised config extension"));
}

#[test]
fn parse_errors_become_config_errors() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.yml", "key: [unclosed\n");

    let mut load = ConfigLoad::default();
    let value = load_config(&main, &mut load);
    assert!(value.is_null());
    assert_eq!(load.errors.len(), 1);
    assert!(load.errors[0].contains("main.yml"), "{:?}", load.errors);
}
