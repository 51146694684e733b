//! Assessment Identity
//!
//! Derives the stable archive key for "this company, analyzed by this
//! operator". Pure string work; the same logical input always produces
//! the same key, so re-analyzing a company overwrites its archive entry
//! instead of duplicating it. Collisions between distinct companies that
//! normalize to the same identifier are accepted and overwrite.

use url::Url;

/// Derive the archive key from the assessment's input and operator.
///
/// A URL contributes its host with any leading `www.` stripped; absent a
/// URL, the file name contributes its extension-stripped slug; absent
/// both, the identifier is empty. The operator name is slugged the same
/// way and appended with an underscore.
pub fn derive_key(url: Option<&str>, operator: &str, file_name: Option<&str>) -> String {
    let identifier = match url {
        Some(raw) if !raw.trim().is_empty() => host_identifier(raw),
        _ => file_name
            .map(|name| slugify(strip_extension(name)))
            .unwrap_or_default(),
    };
    format!("{}_{}", identifier, slugify(operator))
}

/// Extract the normalized host from a raw URL, tolerating a missing
/// scheme. Unparseable input falls back to slugging the raw string.
fn host_identifier(raw: &str) -> String {
    let trimmed = raw.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    match Url::parse(&candidate) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => {
                let host = host.to_lowercase();
                host.strip_prefix("www.").unwrap_or(&host).to_string()
            }
            None => slugify(trimmed),
        },
        Err(_) => slugify(trimmed),
    }
}

/// Drop the final extension from a file name, if any
fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// Lowercase alphanumeric with single hyphens; everything else collapses
fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_hyphen = true;
    for c in text.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_hyphen = false;
        } else if !last_hyphen {
            slug.push('-');
            last_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
