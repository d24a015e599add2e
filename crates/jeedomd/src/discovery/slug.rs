/// Canonicalize free text into a stable ASCII identifier.
///
/// Diacritics are stripped, everything is lowercased, and runs of
/// non-alphanumeric characters collapse to a single underscore. Used for
/// device identifiers and for keyword matching against French/English
/// command names, so it must be deterministic and locale independent.
pub fn slugify(value: &str) -> String {
    let slug = slug::slugify(value).replace('-', "_");
    if slug.is_empty() {
        "item".to_string()
    } else {
        slug
    }
}
