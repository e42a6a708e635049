//! Company, bank and period detection for bank statements.
//!
//! Statements are expected to be named `EMPRESA-BANCO-[EXTRAS]-PERIODO.pdf`.
//! When the name does not follow that shape the bank is guessed from the
//! filename and then from keywords near the top of the document.

use std::sync::LazyLock;

use regex::Regex;

use crate::sanitize::file_stem;

pub const GENERIC_BANK: &str = "GENERICO";

/// Galicia Más statements use their own layout but name themselves Galicia.
pub const GALICIA_MAS: &str = "GALICIA_MAS";

const GALICIA_MAS_HINTS: &[&str] = &["GALICIA MAS", "GALICIA MÁS", "DETALLE DE OPERACIONES"];

pub const KNOWN_BANKS: &[&str] = &[
    "BBVA",
    "BPN",
    "CIUDAD",
    "COMAFI",
    "CREDICOOP",
    "GALICIA",
    "HIPOTECARIO",
    "HSBC",
    "ICBC",
    "ITAU",
    "MACRO",
    "MERCADOPAGO",
    "NACION",
    "PATAGONIA",
    "PROVINCIA",
    "RIOJA",
    "SANJUAN",
    "SANTANDER",
    "SUPERVIELLE",
];

/// Keyword hints checked in order; the first hit wins.
const BANK_HINTS: &[(&str, &[&str])] = &[
    ("ITAU", &["ITAU", "ITAÚ"]),
    ("RIOJA", &["BANCO RIOJA", "RIOJA"]),
    ("BPN", &["BPN", "BANCO PROVINCIA DEL NEUQUEN", "BANCO PROVINCIA DEL NEUQUÉN"]),
    ("NACION", &["BANCO DE LA NACION", "BANCO DE LA NACIÓN", "BNA"]),
    ("MACRO", &["BANCO MACRO", "MACRO"]),
    ("PATAGONIA", &["BANCO PATAGONIA", "PATAGONIA"]),
    ("SANJUAN", &["BANCO SAN JUAN", "SAN JUAN"]),
    ("BBVA", &["BBVA", "FRANCES", "FRANCÉS"]),
    (GALICIA_MAS, GALICIA_MAS_HINTS),
    ("GALICIA", &["GALICIA"]),
    ("SUPERVIELLE", &["SUPERVIELLE"]),
    ("HIPOTECARIO", &["HIPOTECARIO"]),
    ("ICBC", &["ICBC"]),
    ("HSBC", &["HSBC"]),
    ("COMAFI", &["COMAFI"]),
    ("CREDICOOP", &["CREDICOOP"]),
    ("SANTANDER", &["SANTANDER"]),
    ("CIUDAD", &["BANCO CIUDAD", "BANCO DE LA CIUDAD"]),
    ("PROVINCIA", &["BANCO PROVINCIA", "BAPRO"]),
    ("MERCADOPAGO", &["MERCADO PAGO", "MERCADOPAGO"]),
];

/// Lines of the document scanned for bank hints.
const HINT_SCAN_LINES: usize = 250;

static RE_MONTH_OR_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{4}|ENE|FEB|MAR|ABR|MAY|JUN|JUL|AGO|SEP|SET|OCT|NOV|DIC)").unwrap()
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementMeta {
    pub company: String,
    pub bank: Option<String>,
    pub period: String,
}

/// Parses `EMPRESA-BANCO-[EXTRAS]-PERIODO` from a filename. `_` and spaces
/// count as separators; `+` in the period stands for `/`.
pub fn parse_filename(filename: &str) -> StatementMeta {
    let stem = file_stem(filename).to_uppercase().replace(['_', ' '], "-");
    let parts: Vec<&str> = stem.split('-').filter(|p| !p.is_empty()).collect();

    if parts.len() < 3 {
        return StatementMeta::default();
    }

    let Some(bank_idx) = parts
        .iter()
        .position(|p| KNOWN_BANKS.contains(p))
        .filter(|idx| *idx + 1 < parts.len())
    else {
        return StatementMeta::default();
    };

    let company = parts[..bank_idx]
        .iter()
        .map(|p| title_case(p))
        .collect::<Vec<_>>()
        .join(" ");

    let last = parts[parts.len() - 1].replace('+', "/");
    let period = if !RE_MONTH_OR_YEAR.is_match(&last) && parts.len() - bank_idx > 2 {
        format!("{}/{}", parts[parts.len() - 2].replace('+', "/"), last)
    } else {
        last
    };

    let bank = match (parts[bank_idx], parts.get(bank_idx + 1)) {
        ("GALICIA", Some(&"MAS")) => GALICIA_MAS.to_string(),
        (code, _) => code.to_string(),
    };

    StatementMeta {
        company,
        bank: Some(bank),
        period,
    }
}

/// Bank code for a statement: filename metadata, then any known code in the
/// filename, then keyword hints, then [`GENERIC_BANK`]. A Galicia statement
/// whose text names Galicia Más is reported as [`GALICIA_MAS`].
pub fn detect_bank(filename: &str, meta: &StatementMeta, lines: &[String]) -> String {
    let head = lines
        .iter()
        .take(HINT_SCAN_LINES)
        .map(|l| l.to_uppercase())
        .collect::<Vec<_>>()
        .join("\n");

    let upper_name = filename.to_uppercase();
    let bank = meta
        .bank
        .clone()
        .or_else(|| {
            KNOWN_BANKS
                .iter()
                .find(|b| upper_name.contains(**b))
                .map(|b| b.to_string())
        })
        .or_else(|| {
            BANK_HINTS
                .iter()
                .find(|(_, keywords)| keywords.iter().any(|k| contains_word(&head, k)))
                .map(|(bank, _)| bank.to_string())
        })
        .unwrap_or_else(|| GENERIC_BANK.to_string());

    if bank == "GALICIA" && GALICIA_MAS_HINTS.iter().any(|k| contains_word(&head, k)) {
        return GALICIA_MAS.to_string();
    }
    bank
}

/// Whole-word containment, so `BNA` does not match inside `CABNAL`.
pub(crate) fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(idx, _)| {
        let before = haystack[..idx].chars().next_back();
        let after = haystack[idx + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
