//! Dotted-path row extraction over fetched JSON pages
//!
//! Dependent endpoints need rows ("one request per carrier") pulled out of
//! the pages a prior load returned. [`quick_query`] does just enough for
//! that: each page is an object whose `content` property holds an array of
//! row objects; columns are dotted paths into each row, with a single
//! `[*]` segment expanding an embedded array. Multiple columns sharing an
//! array prefix walk it in lockstep; distinct array prefixes multiply out
//! cartesian-style.

use std::collections::BTreeMap;

use serde_json::Value;

/// Column definition: output name plus the dotted path that fills it.
pub type ColumnDef<'a> = (&'a str, &'a str);

/// Extract rows from `pages_json` per `columns`. With `distinct`, rows
/// whose column values all match an earlier row are dropped.
pub fn quick_query<'a>(
    pages_json: impl IntoIterator<Item = &'a str>,
    columns: &[ColumnDef<'_>],
    distinct: bool,
    content_property: &str,
) -> Vec<BTreeMap<String, String>> {
    if columns.is_empty() {
        return Vec::new();
    }

    let mut results = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for page_json in pages_json {
        if page_json.trim().is_empty() {
            continue;
        }
        let Ok(root) = serde_json::from_str::<Value>(page_json) else {
            continue;
        };
        let Some(content) = root.get(content_property).and_then(|v| v.as_array()) else {
            continue;
        };

        for row_object in content {
            for row in expand_one_row(row_object, columns) {
                if distinct {
                    let key: String = columns
                        .iter()
                        .map(|(name, _)| row.get(*name).map(String::as_str).unwrap_or(""))
                        .collect::<Vec<_>>()
                        .join("\u{1f}");
                    if !seen.insert(key) {
                        continue;
                    }
                }
                results.push(row);
            }
        }
    }

    results
}

fn expand_one_row(
    row_object: &Value,
    columns: &[ColumnDef<'_>],
) -> Vec<BTreeMap<String, String>> {
    let mut scalar_columns: Vec<(&str, &str)> = Vec::new();
    // (name, array path without the star, suffix inside each element)
    let mut array_columns: Vec<(&str, String, String)> = Vec::new();

    for (name, path) in columns {
        match path.find("[*]") {
            None => scalar_columns.push((name, path)),
            Some(star) => {
                let prefix = path[..star + 3].to_string();
                let suffix = path[star + 3..].trim_start_matches('.').to_string();
                array_columns.push((name, prefix, suffix));
            }
        }
    }

    let mut base_row = BTreeMap::new();
    for (name, path) in &scalar_columns {
        base_row.insert((*name).to_string(), get_scalar(row_object, path));
    }

    if array_columns.is_empty() {
        return vec![base_row];
    }

    // Group columns by their array prefix; columns sharing a prefix walk
    // the same array index together, distinct prefixes multiply out.
    let mut unique_prefixes: Vec<&str> = Vec::new();
    for (_, prefix, _) in &array_columns {
        if !unique_prefixes.contains(&prefix.as_str()) {
            unique_prefixes.push(prefix.as_str());
        }
    }

    let mut expanded = vec![base_row];
    for prefix in unique_prefixes {
        let group: Vec<&(&str, String, String)> = array_columns
            .iter()
            .filter(|(_, p, _)| p == prefix)
            .collect();
        let elements = get_array(row_object, prefix);

        let mut values_by_column: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (name, _, suffix) in &group {
            let values: Vec<String> = elements
                .iter()
                .map(|element| {
                    if suffix.is_empty() {
                        element_to_string(element)
                    } else {
                        get_scalar(element, suffix)
                    }
                })
                .collect();
            values_by_column.insert(name, values);
        }
        let max_len = values_by_column.values().map(Vec::len).max().unwrap_or(0);

        let mut next_expanded = Vec::new();
        for index in 0..max_len.max(1) {
            for existing in &expanded {
                let mut clone = existing.clone();
                for (name, _, _) in &group {
                    let values = &values_by_column[*name];
                    let value = values.get(index).cloned().unwrap_or_default();
                    clone.insert((*name).to_string(), value);
                }
                next_expanded.push(clone);
            }
        }
        expanded = next_expanded;
    }

    expanded
}

fn get_scalar(root: &Value, dotted_path: &str) -> String {
    let mut current = root;
    for part in dotted_path.split('.').filter(|p| !p.trim().is_empty()) {
        match current.get(part.trim()) {
            Some(next) => current = next,
            None => return String::new(),
        }
    }
    element_to_string(current)
}

fn get_array<'v>(root: &'v Value, prefix_with_star: &str) -> Vec<&'v Value> {
    let path = prefix_with_star.replace("[*]", "");
    let mut current = root;
    for part in path.split('.').filter(|p| !p.trim().is_empty()) {
        match current.get(part.trim()) {
            Some(next) => current = next,
            None => return Vec::new(),
        }
    }
    match current.as_array() {
        Some(array) => array.iter().collect(),
        None => Vec::new(),
    }
}

fn element_to_string(element: &Value) -> String {
    match element {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
