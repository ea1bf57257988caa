//! Name-variant heuristics for matching `$ref` targets to model names.
//!
//! Backends generated from different model layers disagree on naming
//! (`BikeStock`, `bike_stock`, `RootModel_BikeStock`), so lookups try a fixed
//! list of spellings before giving up.

use heck::{ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};

/// Prefix some generators add to nested model names.
pub const ROOT_MODEL_PREFIX: &str = "RootModel_";

/// Spellings tried for a bare reference name, in priority order, without duplicates:
/// the literal name, the `RootModel_`-prefixed form, the name with that prefix
/// stripped, then camelCase, snake_case, and PascalCase conversions.
pub fn reference_name_variants(name: &str) -> Vec<String> {
    let stripped = name.strip_prefix(ROOT_MODEL_PREFIX).unwrap_or(name);
    let candidates = [
        name.to_string(),
        format!("{ROOT_MODEL_PREFIX}{name}"),
        stripped.to_string(),
        stripped.to_lower_camel_case(),
        stripped.to_snake_case(),
        stripped.to_upper_camel_case(),
    ];

    let mut variants: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !candidate.is_empty() && !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_start_with_literal_name() {
        let variants = reference_name_variants("BikeStock");
        assert_eq!(
            variants,
            vec!["BikeStock", "RootModel_BikeStock", "bikeStock", "bike_stock"]
        );
    }

    #[test]
    fn prefixed_names_are_stripped() {
        let variants = reference_name_variants("RootModel_Store");
        assert_eq!(variants[0], "RootModel_Store");
        assert!(variants.contains(&"Store".to_string()));
        assert!(variants.contains(&"store".to_string()));
    }

    #[test]
    fn snake_case_names_gain_pascal_variant() {
        let variants = reference_name_variants("bike_stock");
        assert!(variants.contains(&"BikeStock".to_string()));
        assert!(variants.contains(&"bikeStock".to_string()));
    }
}
