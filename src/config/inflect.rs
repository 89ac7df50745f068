//! Table-name inflection for models that do not set `table_name`.

/// Pluralise a model name, preserving its casing (`Photo` -> `Photos`, `Category` -> `Categories`).
pub fn pluralize(singular: &str) -> String {
    if singular.is_empty() {
        return String::new();
    }
    let lower = singular.to_lowercase();
    let vowel_y = ["ay", "ey", "iy", "oy", "uy"].iter().any(|e| lower.ends_with(e));
    if lower.ends_with('y') && !vowel_y && singular.len() > 1 {
        return format!("{}ies", &singular[..singular.len() - 1]);
    }
    if ["s", "sh", "ch", "x", "z"].iter().any(|e| lower.ends_with(e)) {
        return format!("{}es", singular);
    }
    format!("{}s", singular)
}
