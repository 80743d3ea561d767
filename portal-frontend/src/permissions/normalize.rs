//! Boundary adapter for content-store payloads.
//!
//! The content store is not consistent about field casing (`moduleId`,
//! `ModuleID`, `module_id`), sends ids as numbers or numeric strings, and
//! sometimes wraps lists in `{ "data": ... }` or records in
//! `{ "attributes": ... }`. Everything is converted to the fixed shapes in
//! [`crate::models::catalog`] here; records without a usable identifier are
//! dropped and counted, never passed on.

use serde_json::{Map, Value};

use crate::models::{EntityType, Module, Page, ViewMatrix, ViewMatrixEntry};

/// Keys under which list payloads are commonly wrapped.
const LIST_WRAPPERS: &[&str] = &["data", "items", "value", "values", "results", "records", "content"];

/// Keys under which a single record's fields are commonly nested.
const RECORD_WRAPPERS: &[&str] = &["attributes", "fields", "properties"];

/// Wrapper depth is bounded; payloads nested deeper than this are ignored.
const MAX_UNWRAP_DEPTH: usize = 4;

pub fn normalize_modules(payload: &Value) -> Vec<Module> {
    let records = list_records(payload, &["modules"]);
    let total = records.len();

    let modules: Vec<Module> = records.iter().filter_map(module_from_record).collect();
    report_dropped("module", total, modules.len());
    modules
}

pub fn normalize_pages(payload: &Value) -> Vec<Page> {
    let records = list_records(payload, &["pages"]);
    let total = records.len();

    let pages: Vec<Page> = records.iter().filter_map(page_from_record).collect();
    report_dropped("page", total, pages.len());
    pages
}

/// Accepts `{ "MODULE": [...], "PAGE": [...] }` (any casing, optionally
/// wrapped) or a flat list of entries carrying their own `entityType`.
pub fn normalize_view_matrix(payload: &Value) -> ViewMatrix {
    let mut matrix = ViewMatrix::default();
    let mut total = 0;

    match matrix_root(payload, 0) {
        Some(Value::Object(root)) => {
            for (kind, names) in [
                (EntityType::Module, ["module", "modules"]),
                (EntityType::Page, ["page", "pages"]),
            ] {
                let Some(entries) = get_field(root, &names).and_then(Value::as_array) else {
                    continue;
                };
                total += entries.len();
                for entry in entries {
                    if let Some(entry) = matrix_entry(entry, Some(kind)) {
                        push_entry(&mut matrix, entry);
                    }
                }
            }
        }
        Some(Value::Array(entries)) => {
            total = entries.len();
            for entry in entries {
                if let Some(entry) = matrix_entry(entry, None) {
                    push_entry(&mut matrix, entry);
                }
            }
        }
        _ => {}
    }

    report_dropped("view matrix entry", total, matrix.modules.len() + matrix.pages.len());
    matrix
}

fn push_entry(matrix: &mut ViewMatrix, entry: ViewMatrixEntry) {
    match entry.entity_type {
        EntityType::Module => matrix.modules.push(entry),
        EntityType::Page => matrix.pages.push(entry),
    }
}

fn module_from_record(record: &Value) -> Option<Module> {
    let module_id = lookup(record, &["moduleId", "id"]).and_then(as_id)?;
    let module_code = lookup(record, &["moduleCode", "code"]).and_then(as_text)?;
    let module_name = lookup(record, &["moduleName", "name", "title"])
        .and_then(as_text)
        .unwrap_or_else(|| module_code.clone());

    Some(Module {
        module_id,
        module_code,
        module_name,
    })
}

fn page_from_record(record: &Value) -> Option<Page> {
    let page_id = lookup(record, &["pageId", "id"]).and_then(as_id)?;
    let page_code = lookup(record, &["pageCode", "code", "slug"]).and_then(as_text)?;
    let page_name = lookup(record, &["pageName", "name", "title"])
        .and_then(as_text)
        .unwrap_or_else(|| page_code.clone());
    let module_id = lookup(record, &["moduleId", "module"]).and_then(|value| match value {
        Value::Object(module) => get_field(module, &["moduleId", "id"]).and_then(as_id),
        other => as_id(other),
    })?;

    Some(Page {
        page_id,
        page_code,
        page_name,
        module_id,
    })
}

fn matrix_entry(record: &Value, kind: Option<EntityType>) -> Option<ViewMatrixEntry> {
    let entity_type = match kind {
        Some(kind) => kind,
        None => lookup(record, &["entityType", "type"])
            .and_then(Value::as_str)
            .and_then(parse_entity_type)?,
    };
    let target = lookup(record, &["target", "targetId", "entityId", "id"]).and_then(as_id)?;
    let can_view = lookup(record, &["canView", "view", "allowed"]).and_then(as_bool)?;

    Some(ViewMatrixEntry {
        entity_type,
        target,
        can_view,
    })
}

fn parse_entity_type(raw: &str) -> Option<EntityType> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "MODULE" => Some(EntityType::Module),
        "PAGE" => Some(EntityType::Page),
        _ => None,
    }
}

/// Find the list of records inside a (possibly wrapped) list payload.
fn list_records<'a>(payload: &'a Value, named: &[&str]) -> &'a [Value] {
    fn walk<'a>(value: &'a Value, named: &[&str], depth: usize) -> Option<&'a [Value]> {
        match value {
            Value::Array(items) => Some(items.as_slice()),
            Value::Object(map) if depth < MAX_UNWRAP_DEPTH => named
                .iter()
                .chain(LIST_WRAPPERS)
                .find_map(|key| get_field(map, &[*key]))
                .and_then(|inner| walk(inner, named, depth + 1)),
            _ => None,
        }
    }

    walk(payload, named, 0).unwrap_or(&[])
}

/// Find the object (or flat list) holding matrix entries.
fn matrix_root(payload: &Value, depth: usize) -> Option<&Value> {
    match payload {
        Value::Array(_) => Some(payload),
        Value::Object(map) => {
            if get_field(map, &["module", "modules", "page", "pages"]).is_some() {
                return Some(payload);
            }
            if depth >= MAX_UNWRAP_DEPTH {
                return None;
            }
            LIST_WRAPPERS
                .iter()
                .find_map(|key| get_field(map, &[*key]))
                .and_then(|inner| matrix_root(inner, depth + 1))
        }
        _ => None,
    }
}

/// Look a field up on a record, then inside its common nesting wrappers.
fn lookup<'a>(record: &'a Value, names: &[&str]) -> Option<&'a Value> {
    let map = record.as_object()?;
    get_field(map, names).or_else(|| {
        RECORD_WRAPPERS
            .iter()
            .filter_map(|wrapper| get_field(map, &[*wrapper]).and_then(Value::as_object))
            .find_map(|inner| get_field(inner, names))
    })
}

/// Case-, underscore- and hyphen-insensitive key lookup; first listed name wins.
fn get_field<'a>(map: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| {
        let wanted = fold_key(name);
        map.iter()
            .find(|(key, value)| !value.is_null() && fold_key(key) == wanted)
            .map(|(_, value)| value)
    })
}

fn fold_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Integer ids, accepting numeric strings and integral floats.
pub fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            // `as` saturates, so out-of-range floats must be rejected first
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(f))
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn report_dropped(kind: &str, total: usize, kept: usize) {
    if kept < total {
        tracing::warn!(
            kind = kind,
            total = total,
            dropped = total - kept,
            "Dropped malformed content-store records"
        );
    }
}
