use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::FieldMap;

pub const FIELD_FULL_NAME: &str = "full_name";
pub const FIELD_FULL_NAME_ARABIC: &str = "full_name_arabic";
pub const FIELD_DATE_OF_BIRTH: &str = "date_of_birth";
pub const FIELD_PLACE_OF_BIRTH: &str = "place_of_birth";
pub const FIELD_DOCUMENT_NUMBER: &str = "document_number";

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_latin_name,
    r"[A-ZÀ-ÖØ-Þ][A-ZÀ-ÖØ-Þ']*\s+[A-ZÀ-ÖØ-Þ][A-ZÀ-ÖØ-Þ']*");
re!(re_arabic_name,
    r"[ء-ي]+\s+[ء-ي]+");
re!(re_birth_date,
    r"(?:Née le|the|مزدادة بتاريخ)[:\s]*(\d{2}\.\d{2}\.\d{4}|\d{2}/\d{2}/\d{4})");
re!(re_birth_place,
    r"(?:à|ب)\s+([A-ZÀ-ÖØ-Þ][A-ZÀ-ÖØ-Þ']*)");
re!(re_digit_run,
    r"\d{4,10}");
re!(re_prefixed_serial,
    r"[A-Z]{2}\d{6}");

// ── Public extraction API ─────────────────────────────────────────────────────

/// Which document-number pattern the extractor applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberRule {
    /// First run of 4–10 consecutive digits anywhere in the text. Unanchored,
    /// so an earlier numeric run (the year inside a birth date, say) wins
    /// over the actual card number.
    #[default]
    DigitRun,
    /// Two uppercase letters immediately followed by six digits.
    PrefixedSerial,
}

/// Applies the field rules to cleaned text, in a fixed order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Extractor {
    number_rule: NumberRule,
}

impl Extractor {
    pub fn new(number_rule: NumberRule) -> Self {
        Self { number_rule }
    }

    /// Run every rule over `text`. Fields whose pattern found nothing are
    /// simply absent from the map; matching never fails.
    pub fn extract(&self, text: &str) -> FieldMap {
        let mut fields = FieldMap::new();
        if let Some(v) = full_name(text) {
            fields.insert(FIELD_FULL_NAME.to_string(), v);
        }
        if let Some(v) = full_name_arabic(text) {
            fields.insert(FIELD_FULL_NAME_ARABIC.to_string(), v);
        }
        if let Some(v) = date_of_birth(text) {
            fields.insert(FIELD_DATE_OF_BIRTH.to_string(), v);
        }
        if let Some(v) = place_of_birth(text) {
            fields.insert(FIELD_PLACE_OF_BIRTH.to_string(), v);
        }
        if let Some(v) = self.document_number(text) {
            fields.insert(FIELD_DOCUMENT_NUMBER.to_string(), v);
        }
        fields
    }

    fn document_number(&self, text: &str) -> Option<String> {
        let re = match self.number_rule {
            NumberRule::DigitRun => re_digit_run(),
            NumberRule::PrefixedSerial => re_prefixed_serial(),
        };
        re.find(text).map(|m| m.as_str().to_string())
    }
}

// ── Field rules ───────────────────────────────────────────────────────────────

/// First pair of uppercase-starting Latin tokens, apostrophes allowed.
fn full_name(text: &str) -> Option<String> {
    re_latin_name().find(text).map(|m| m.as_str().to_string())
}

fn full_name_arabic(text: &str) -> Option<String> {
    re_arabic_name().find(text).map(|m| m.as_str().to_string())
}

/// Date following one of the birth labels, `DD.MM.YYYY` or `DD/MM/YYYY`.
fn date_of_birth(text: &str) -> Option<String> {
    re_birth_date()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Uppercase token after the locative particle `à` (or `ب`).
fn place_of_birth(text: &str) -> Option<String> {
    re_birth_place()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const CARD_TEXT: &str = "JEAN DUPONT Née le 12.09.1980 à PARIS CIN1234567";

    fn extract(text: &str) -> FieldMap {
        Extractor::default().extract(text)
    }

    // ── Names ─────────────────────────────────────────────────────────────────

    #[test]
    fn full_name_takes_leftmost_uppercase_pair() {
        // Leftmost pair wins, even when it is a printed header rather than
        // the holder's name.
        let fields = extract("CARTE NATIONALE JEAN DUPONT");
        assert_eq!(fields[FIELD_FULL_NAME], "CARTE NATIONALE");
    }

    #[test]
    fn full_name_supports_accents_and_apostrophes() {
        let fields = extract("AMÉLIE D'ALEMBERT née à LYON");
        assert_eq!(fields[FIELD_FULL_NAME], "AMÉLIE D'ALEMBERT");
    }

    #[test]
    fn full_name_ignores_lowercase_words() {
        let fields = extract("la carte de JEAN DUPONT");
        assert_eq!(fields[FIELD_FULL_NAME], "JEAN DUPONT");
    }

    #[test]
    fn arabic_name_pair() {
        let fields = extract("محمد العلوي");
        assert_eq!(fields[FIELD_FULL_NAME_ARABIC], "محمد العلوي");
        assert!(!fields.contains_key(FIELD_FULL_NAME));
    }

    // ── Birth date ────────────────────────────────────────────────────────────

    #[test]
    fn birth_date_after_french_label() {
        let fields = extract("Née le 12.09.1980");
        assert_eq!(fields[FIELD_DATE_OF_BIRTH], "12.09.1980");
    }

    #[test]
    fn birth_date_after_english_label_slash_format() {
        let fields = extract("the 12/09/1980");
        assert_eq!(fields[FIELD_DATE_OF_BIRTH], "12/09/1980");
    }

    #[test]
    fn birth_date_after_arabic_label() {
        let fields = extract("مزدادة بتاريخ 01/02/1995");
        assert_eq!(fields[FIELD_DATE_OF_BIRTH], "01/02/1995");
    }

    #[test]
    fn unlabeled_date_is_not_a_birth_date() {
        let fields = extract("expire 12.09.2030");
        assert!(!fields.contains_key(FIELD_DATE_OF_BIRTH));
    }

    // ── Birth place ───────────────────────────────────────────────────────────

    #[test]
    fn birth_place_after_particle() {
        let fields = extract("Née le 12.09.1980 à PARIS");
        assert_eq!(fields[FIELD_PLACE_OF_BIRTH], "PARIS");
    }

    #[test]
    fn birth_place_after_arabic_particle() {
        let fields = extract("ب RABAT");
        assert_eq!(fields[FIELD_PLACE_OF_BIRTH], "RABAT");
    }

    // ── Document number ───────────────────────────────────────────────────────

    #[test]
    fn digit_run_takes_leftmost_run() {
        let fields = extract("CIN 1234567 tel 0600000000");
        assert_eq!(fields[FIELD_DOCUMENT_NUMBER], "1234567");
    }

    #[test]
    fn digit_run_ignores_short_runs() {
        let fields = extract("rue 12 num 345");
        assert!(!fields.contains_key(FIELD_DOCUMENT_NUMBER));
    }

    #[test]
    fn prefixed_serial_rule() {
        let extractor = Extractor::new(NumberRule::PrefixedSerial);
        let fields = extractor.extract("CIN FK922301 tel 0600000000");
        assert_eq!(fields[FIELD_DOCUMENT_NUMBER], "FK922301");
    }

    #[test]
    fn prefixed_serial_matches_inside_longer_token() {
        // Unanchored: "CIN1234567" yields "IN123456", letters from the label
        // included. The rule trades precision for tolerance of missing spaces.
        let extractor = Extractor::new(NumberRule::PrefixedSerial);
        let fields = extractor.extract(CARD_TEXT);
        assert_eq!(fields[FIELD_DOCUMENT_NUMBER], "IN123456");
    }

    // ── Whole-card behavior ───────────────────────────────────────────────────

    #[test]
    fn card_text_extracts_expected_fields() {
        let fields = extract(CARD_TEXT);
        assert_eq!(fields[FIELD_FULL_NAME], "JEAN DUPONT");
        assert_eq!(fields[FIELD_DATE_OF_BIRTH], "12.09.1980");
        assert_eq!(fields[FIELD_PLACE_OF_BIRTH], "PARIS");
        // The leftmost digit run is the birth year, not the card number.
        assert_eq!(fields[FIELD_DOCUMENT_NUMBER], "1980");
        assert!(!fields.contains_key(FIELD_FULL_NAME_ARABIC));
    }

    #[test]
    fn fields_keep_rule_application_order() {
        let fields = extract(CARD_TEXT);
        let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            [
                FIELD_FULL_NAME,
                FIELD_DATE_OF_BIRTH,
                FIELD_PLACE_OF_BIRTH,
                FIELD_DOCUMENT_NUMBER
            ]
        );
    }

    #[test]
    fn extraction_is_deterministic() {
        let a = extract(CARD_TEXT);
        let b = extract(CARD_TEXT);
        let pairs_a: Vec<_> = a.iter().collect();
        let pairs_b: Vec<_> = b.iter().collect();
        assert_eq!(pairs_a, pairs_b);
    }

    #[test]
    fn no_matches_yields_empty_map() {
        assert!(extract("texte illisible").is_empty());
        assert!(extract("").is_empty());
    }

    #[test]
    fn no_panic_on_garbage_input() {
        let _ = extract("!@#$%^&*()\n\0\x01\x02");
    }
}
