const EDITION_WIDTH: usize = 3;
const DEFAULT_EDITION: &str = "000";
const DEFAULT_SLUG: &str = "Unknown";

/// Canonical filename: `DB_{edition}_{slug}.pdf`.
///
/// The edition keeps only ASCII digits and is left-padded with zeros to three
/// characters; the slug keeps only ASCII letters, digits and underscores.
/// Feeding the normalized parts back in yields the same name.
pub fn derive_name(edition_raw: &str, slug_raw: &str) -> String {
    format!(
        "DB_{}_{}.pdf",
        normalize_edition(edition_raw),
        sanitize_slug(slug_raw)
    )
}

pub fn normalize_edition(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return DEFAULT_EDITION.to_string();
    }
    format!("{:0>width$}", digits, width = EDITION_WIDTH)
}

pub fn sanitize_slug(raw: &str) -> String {
    let slug: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if slug.is_empty() {
        DEFAULT_SLUG.to_string()
    } else {
        slug
    }
}

/// A name that stays in the file's own folder: no separators, not `.` or `..`.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
