//! Property and type name normalization.

/// Clean a declared property name into an accessor identifier.
///
/// Drops any namespace prefix up to the last `:`, removes characters
/// outside `[A-Za-z0-9_-]`, turns `-` into `_`, and prefixes `_` when the
/// result would start with a digit.
pub fn clean_identifier(name: &str) -> String {
    let tail = name.rsplit(':').next().unwrap_or(name);
    let mut out: String = tail
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .map(|c| if c == '-' { '_' } else { c })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// `point-2d` / `line_segment` / `Point` → `Point2d` / `LineSegment` / `Point`.
pub fn camelize(name: &str) -> String {
    name.split(|c: char| c == '-' || c == '_' || c == ' ' || c == '.')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}
