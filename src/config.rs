//! The configuration composer.
//!
//! [`load_config`] loads one file (dispatching on its extension), then
//! resolves `import` members bottom-up and `template` members within each
//! document, merging everything into a single value. Composition is
//! best-effort: problems are recorded as strings in the [`ConfigLoad`]
//! buffer and the remaining layers still apply.

use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::value::{Object, Value};
use crate::{binder, json};

/// Inputs and outputs of one [`load_config`] run.
#[derive(Default, Debug)]
pub struct ConfigLoad {
    /// Optional variant name; every import additionally tries a
    /// `name_{variant}.ext` sibling merged on top of the primary file.
    pub variant: String,
    /// The main file path, recorded by [`load_config`].
    pub main_path: PathBuf,
    /// Every imported file, in load order.
    pub imports: Vec<PathBuf>,
    /// Accumulated non-fatal error descriptions, with file-path context.
    pub errors: Vec<String>,
    /// Import files currently being expanded, for cycle detection.
    active: Vec<PathBuf>,
}

impl ConfigLoad {
    /// A load with a variant suffix.
    pub fn with_variant(variant: impl Into<String>) -> ConfigLoad {
        ConfigLoad {
            variant: variant.into(),
            ..ConfigLoad::default()
        }
    }

    fn record(&mut self, error: String) {
        warn!("{error}");
        self.errors.push(error);
    }
}

/// Load a configuration file and resolve its `import` and `template`
/// directives. Problems are recorded in `load.errors`; the returned value
/// is the best-effort composition (null when nothing could be read).
pub fn load_config(path: &Path, load: &mut ConfigLoad) -> Value {
    load.main_path = path.to_path_buf();
    let mut value = load_file(path, load);
    let dir = path.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
    expand_imports(&mut value, &dir, load);
    expand_templates(&mut value, load);
    value
}

fn load_file(path: &Path, load: &mut ConfigLoad) -> Value {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .unwrap_or("");
    debug!("loading {} ({extension})", path.display());
    let result = match extension {
        "yaml" | "yml" => binder::load_yaml_file(path).map_err(|err| err.to_string()),
        "json" | "jsn" | "json5" => json::load_json_file(path).map_err(|err| err.to_string()),
        _ => Err(String::from("unrecognised config extension")),
    };
    match result {
        Ok(value) => value,
        Err(err) => {
            load.record(format!("{}: {err}", path.display()));
            Value::Null
        }
    }
}

/// The `name_{variant}.ext` sibling of a path.
fn variant_sibling(path: &Path, variant: &str) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    let extension = path.extension()?.to_str()?;
    Some(path.with_file_name(format!("{stem}_{variant}.{extension}")))
}

fn import_path_list(import: &Value, dir: &Path, load: &mut ConfigLoad) -> Vec<String> {
    match import {
        Value::String(text) => vec![text.to_string()],
        Value::Array(elts) => {
            let mut paths = Vec::with_capacity(elts.len());
            for elt in elts.iter() {
                if let Value::String(text) = elt {
                    paths.push(text.to_string());
                } else {
                    load.record(format!(
                        "{}: import entries must be strings, found {}",
                        dir.display(),
                        elt.type_name()
                    ));
                }
            }
            paths
        }
        _ => {
            load.record(format!(
                "{}: import must be a string or a list of strings, found {}",
                dir.display(),
                import.type_name()
            ));
            vec![]
        }
    }
}

/// Load one import target, expanding its own imports first, and merge its
/// variant sibling on top when one exists.
fn load_import(path: &Path, load: &mut ConfigLoad) -> Value {
    if load.active.iter().any(|active| active == path) {
        load.record(format!("{}: circular import", path.display()));
        return Value::Null;
    }
    if !path.is_file() {
        load.record(format!("{}: missing import", path.display()));
        return Value::Null;
    }
    load.active.push(path.to_path_buf());
    load.imports.push(path.to_path_buf());

    let dir = path.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
    let mut value = load_file(path, load);
    expand_imports(&mut value, &dir, load);

    if !load.variant.is_empty() {
        if let Some(sibling) = variant_sibling(path, &load.variant) {
            if sibling.is_file() {
                debug!("variant import {}", sibling.display());
                load.imports.push(sibling.clone());
                let mut overlay = load_file(&sibling, load);
                expand_imports(&mut overlay, &dir, load);
                value.merge(&overlay);
            }
        }
    }

    load.active.pop();
    value
}

/// Resolve `import` members depth-first, post-order: imports form the base
/// and the importing object overrides.
fn expand_imports(value: &mut Value, dir: &Path, load: &mut ConfigLoad) {
    match value {
        Value::Object(object) => {
            for member in object.values_mut() {
                expand_imports(member, dir, load);
            }
            let Some(import) = object.lookup("import").cloned() else {
                return;
            };
            object.remove("import");
            let mut base = Value::Null;
            for text in import_path_list(&import, dir, load) {
                let target = dir.join(&text);
                let loaded = load_import(&target, load);
                base.merge(&loaded);
            }
            let current = Value::Object(std::mem::take(object));
            base.merge(&current);
            *value = base;
        }
        Value::Array(elts) => {
            for elt in crate::value::exclusive_elts(elts).iter_mut() {
                expand_imports(elt, dir, load);
            }
        }
        _ => {}
    }
}

/// Resolve `template` members: a member object naming a sibling inherits
/// the sibling's (itself expanded) content, with the local members winning.
fn expand_templates(value: &mut Value, load: &mut ConfigLoad) {
    match value {
        Value::Object(object) => {
            let keys: Vec<String> = object.iter().map(|(key, _)| key.to_string()).collect();
            for key in &keys {
                let mut chain = Vec::new();
                expand_template_member(object, key, &mut chain, load);
            }
            for member in object.values_mut() {
                expand_templates(member, load);
            }
        }
        Value::Array(elts) => {
            for elt in crate::value::exclusive_elts(elts).iter_mut() {
                expand_templates(elt, load);
            }
        }
        _ => {}
    }
}

fn template_name(object: &Object, key: &str) -> Option<String> {
    let Some(Value::Object(member)) = object.lookup(key) else {
        return None;
    };
    match member.lookup("template") {
        Some(Value::String(name)) => Some(name.to_string()),
        _ => None,
    }
}

fn expand_template_member(
    object: &mut Object,
    key: &str,
    chain: &mut Vec<String>,
    load: &mut ConfigLoad,
) {
    let Some(name) = template_name(object, key) else {
        return;
    };
    if chain.iter().any(|entry| entry == key) {
        load.record(format!("circular template '{key}'"));
        if let Some(Value::Object(member)) = object.lookup_mut(key) {
            member.remove("template");
        }
        return;
    }

    // The named sibling expands first, so inheritance chains compose.
    chain.push(key.to_string());
    expand_template_member(object, &name, chain, load);
    chain.pop();

    let Some(sibling) = object.lookup(&name).cloned() else {
        load.record(format!("unknown template '{name}'"));
        if let Some(Value::Object(member)) = object.lookup_mut(key) {
            member.remove("template");
        }
        return;
    };

    let Some(mut overlay) = object.lookup(key).cloned() else {
        return;
    };
    overlay.remove_member("template");
    let mut merged = sibling;
    merged.merge(&overlay);
    if let Some(slot) = object.lookup_mut(key) {
        *slot = merged;
    }
}

/// Apply CLI-style `<path>[=<jsonValue>]` settings to a value.
///
/// A missing `=<value>` sets `true`. Texts that do not look like a JSON
/// literal are treated as bare strings. Returns whether every entry
/// applied.
pub fn apply_settings<S: AsRef<str>>(settings: &[S], value: &mut Value) -> bool {
    let mut ok = true;
    for setting in settings {
        let setting = setting.as_ref();
        let (path, text) = match setting.split_once('=') {
            Some((path, text)) => (path, Some(text)),
            None => (setting, None),
        };
        let parsed = match text {
            None => Value::Bool(true),
            Some(text) => {
                let looks_like_json = matches!(
                    text.as_bytes().first(),
                    Some(b'[' | b'{' | b'"' | b'-' | b'0'..=b'9')
                ) || matches!(text, "null" | "true" | "false");
                let json_text = if looks_like_json {
                    text.to_string()
                } else {
                    let mut quoted = String::new();
                    json::write_json_string(&mut quoted, text);
                    quoted
                };
                match json::parse_json(&json_text, false) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        warn!("bad -set value for '{path}': {err}");
                        ok = false;
                        continue;
                    }
                }
            }
        };
        match value.update_member_path(path) {
            Some(slot) => *slot = parsed,
            None => {
                warn!("cannot set '{path}': not an object path");
                ok = false;
            }
        }
    }
    ok
}
