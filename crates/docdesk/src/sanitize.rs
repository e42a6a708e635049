//! Helpers for sanitizing user-supplied names before they touch the
//! filesystem or tracing span attributes.

use std::collections::HashSet;
use std::path::Path;

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals file name without exposing the full path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Reduces an uploaded filename to a safe single path component.
///
/// Directory parts are dropped, accented Latin letters are folded to ASCII,
/// whitespace becomes `_` and anything outside `[A-Za-z0-9._-]` is removed.
/// Leading dots are stripped so the result can never be hidden or `..`.
pub fn secure_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let mut out = String::with_capacity(base.len());
    for c in base.chars() {
        let c = fold_accent(c);
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            out.push(c);
        } else if c.is_whitespace() && !out.ends_with('_') {
            out.push('_');
        }
    }

    let trimmed = out.trim_start_matches(['.', '_']).trim_end_matches('_');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'Á' | 'À' | 'Ä' | 'Â' => 'A',
        'É' | 'È' | 'Ë' | 'Ê' => 'E',
        'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
        'Ó' | 'Ò' | 'Ö' | 'Ô' => 'O',
        'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
        'ñ' => 'n',
        'Ñ' => 'N',
        other => other,
    }
}

/// Returns `candidate` or, if already taken, `stem_1.ext`, `stem_2.ext`, ...
/// and records the chosen name in `taken`.
pub fn unique_name(taken: &mut HashSet<String>, candidate: &str) -> String {
    if taken.insert(candidate.to_string()) {
        return candidate.to_string();
    }

    let (stem, ext) = match candidate.rfind('.') {
        Some(idx) if idx > 0 => (&candidate[..idx], &candidate[idx..]),
        _ => (candidate, ""),
    };

    let mut n = 1;
    loop {
        let name = format!("{}_{}{}", stem, n, ext);
        if taken.insert(name.clone()) {
            return name;
        }
        n += 1;
    }
}

/// Filename without its final extension.
pub fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// Lowercased final extension, empty when there is none.
pub fn extension(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[idx + 1..].to_ascii_lowercase(),
        _ => String::new(),
    }
}
