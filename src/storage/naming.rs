use chrono::Utc;
use rand::Rng;

/// Stem used when the client-supplied name has nothing usable left
const FALLBACK_STEM: &str = "document";

const SEPARATORS: &[char] = &['/', '\\'];

/// Split a client-supplied filename into a safe `(stem, extension)` pair.
///
/// Only the last path component survives (both `/` and `\` count as
/// separators), so a name can never climb out of the upload directory.
/// Control characters and double quotes are dropped because the name is
/// echoed back inside a `Content-Disposition` header. The extension keeps its
/// leading dot and is empty when the name has none.
pub fn sanitize_filename(original: &str) -> (String, String) {
    let base = original
        .rsplit(SEPARATORS)
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect();
    let cleaned = cleaned.trim();

    // A leading dot marks a hidden file, not an extension
    let (stem, ext) = match cleaned.rfind('.') {
        Some(idx) if idx > 0 => (&cleaned[..idx], &cleaned[idx..]),
        _ => (cleaned, ""),
    };

    let stem = stem.trim_matches('.').trim();
    let stem = if stem.is_empty() { FALLBACK_STEM } else { stem };
    let ext = if ext.len() > 1 { ext } else { "" };

    (stem.to_string(), ext.to_string())
}

/// Build the on-disk name for an upload: `<millis>-<random>-<stem><ext>`
pub fn unique_filename(original: &str) -> String {
    let (stem, ext) = sanitize_filename(original);
    let millis = Utc::now().timestamp_millis();
    let nonce: u32 = rand::thread_rng().gen_range(0..=1_000_000_000);
    format!("{}-{}-{}{}", millis, nonce, stem, ext)
}

/// True when `name` is a single, non-special path component
pub fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(SEPARATORS)
        && !name.chars().any(char::is_control)
}
