//! Naming conventions shared by the domain and plugin subsystems

/// Strip any module path, returning the short type name ("app::Author" -> "Author")
pub fn short_name(type_name: &str) -> &str {
    type_name.rsplit("::").next().unwrap_or(type_name)
}

/// Property-style name of a type: lower-case the first letter unless the
/// name starts with two capitals ("Author" -> "author", "URLMapping" -> "URLMapping")
pub fn property_name(type_name: &str) -> String {
    let name = short_name(type_name);
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(first), Some(second)) if first.is_uppercase() && second.is_uppercase() => {
            name.to_string()
        }
        (Some(first), _) => first.to_lowercase().chain(name.chars().skip(1)).collect(),
        (None, _) => String::new(),
    }
}

/// Logical name of a type: the short name with `suffix` removed, property-cased
/// ("UrlMappingsPlugin" with suffix "Plugin" -> "urlMappings")
pub fn logical_property_name(type_name: &str, suffix: &str) -> String {
    let name = short_name(type_name);
    let logical = match name.strip_suffix(suffix) {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => name,
    };
    property_name(logical)
}
