//! Best-effort split of a free-text address into street and house number.
//!
//! Only used to build structured queries for providers that accept them;
//! this is a heuristic, not an address parser.

use regex::Regex;
use std::sync::LazyLock;

/// `Calle 123`, `Calle 123A`, `Calle 12-B`
static TRAILING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-zÁÉÍÓÚÑáéíóúüÜ0-9.\s]+?)\s+(\d+[A-Za-z/-]?)\s*$")
        .expect("trailing number pattern")
});

/// `Calle Nº 123`, `Calle N° 123`, `Calle No. 123`
static NUMBER_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(.+?)\s+(?:Nº|N°|No\.|No\b)\s*(\d+[A-Za-z/-]?)\s*$")
        .expect("number marker pattern")
});

/// Street name and optional house number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressParts {
    pub street: String,
    pub house_number: Option<String>,
}

/// Split `address` into street and house number. Never fails: without a
/// recognisable number the trimmed input comes back as the street.
pub fn split_address(address: &str) -> AddressParts {
    let cleaned = address.trim().trim_matches(',').trim();

    for pattern in [&*TRAILING_NUMBER, &*NUMBER_MARKER] {
        if let Some(caps) = pattern.captures(cleaned) {
            let street = caps[1].trim().trim_matches(',').trim().to_string();
            return AddressParts {
                street,
                house_number: Some(caps[2].trim().to_string()),
            };
        }
    }

    AddressParts {
        street: cleaned.to_string(),
        house_number: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(s: &str) -> (String, Option<String>) {
        let parts = split_address(s);
        (parts.street, parts.house_number)
    }

    #[test]
    fn test_trailing_number() {
        assert_eq!(split("Las Naciones 857"), ("Las Naciones".into(), Some("857".into())));
        assert_eq!(split("  Pajaritos 1234B, "), ("Pajaritos".into(), Some("1234B".into())));
        assert_eq!(split("Av. Los Pajaritos 12/"), ("Av. Los Pajaritos".into(), Some("12/".into())));
    }

    #[test]
    fn test_number_marker() {
        assert_eq!(split("Los Aromos Nº 45"), ("Los Aromos".into(), Some("45".into())));
        assert_eq!(split("Los Aromos N° 45"), ("Los Aromos".into(), Some("45".into())));
        assert_eq!(split("Los Aromos, no. 45"), ("Los Aromos".into(), Some("45".into())));
        // "no" inside a word is not a marker
        assert_eq!(split("Camino 45"), ("Camino".into(), Some("45".into())));
    }

    #[test]
    fn test_trailing_form_wins_over_marker() {
        // Both patterns match; the plain trailing number is tried first
        assert_eq!(split("Las Naciones No 857"), ("Las Naciones No".into(), Some("857".into())));
        assert_eq!(split("Las Naciones No. 857"), ("Las Naciones No.".into(), Some("857".into())));
    }

    #[test]
    fn test_no_number() {
        assert_eq!(split("Plaza Central"), ("Plaza Central".into(), None));
        assert_eq!(split("   "), (String::new(), None));
        assert_eq!(split(""), (String::new(), None));
    }
}
