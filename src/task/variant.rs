//! Variant suffixes on task names

/// Splits `name:variant` into its base name and optional variant
pub fn split_variant(name: &str) -> (&str, Option<&str>) {
    match name.split_once(':') {
        Some((base, variant)) => (base, Some(variant)),
        None => (name, None),
    }
}

/// Name with any variant suffix removed
pub fn base_name(name: &str) -> &str {
    split_variant(name).0
}
