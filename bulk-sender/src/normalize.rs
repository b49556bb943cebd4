//! Per-field normalization applied to selected recipients.

use crate::table::CellValue;

/// Capitalizes every whitespace-separated word (first character upper, the
/// rest lower) and rejoins the words with single spaces.
///
/// Idempotent: `capitalize(&capitalize(s)) == capitalize(s)`.
pub fn capitalize(text: &str) -> String {
    text.split_whitespace()
        .map(capitalize_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize_word(word: &str) -> String {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let mut out = String::with_capacity(word.len());
    // Characters like 'ß' uppercase to several characters; keep only the
    // leading one upper so the result is stable under a second pass.
    let mut upper = first.to_uppercase();
    if let Some(head) = upper.next() {
        out.push(head);
    }
    out.extend(upper.flat_map(char::to_lowercase));
    out.extend(chars.flat_map(char::to_lowercase));
    out
}

/// Normalizes a name-like cell. Only text is accepted; anything else is absent.
pub fn name_field(value: &CellValue) -> Option<String> {
    value.as_text().map(capitalize)
}

/// Normalizes a phone-like cell to its string form. Text and integers are
/// accepted; blank text and every other kind of value are absent. Text is
/// kept exactly as stored.
pub fn phone_field(value: &CellValue) -> Option<String> {
    match value {
        CellValue::Text(text) => (!text.trim().is_empty()).then(|| text.clone()),
        CellValue::Integer(number) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize_words() {
        assert_eq!(capitalize("john smith"), "John Smith");
        assert_eq!(capitalize("  mARIA   de la  CRUZ "), "Maria De La Cruz");
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("élodie"), "Élodie");
    }

    #[test]
    fn test_capitalize_is_idempotent() {
        for sample in [
            "john smith",
            "ÉLODIE o'NEIL",
            "straße",
            "ßtraße",
            "ŉ test",
            "İstanbul",
            "\tmixed\nwhite   space ",
            "123 abc",
        ] {
            let once = capitalize(sample);
            assert_eq!(capitalize(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn test_name_field_requires_text() {
        assert_eq!(name_field(&CellValue::text("ann lee")), Some("Ann Lee".to_string()));
        assert_eq!(name_field(&CellValue::Integer(5)), None);
        assert_eq!(name_field(&CellValue::Empty), None);
    }

    #[test]
    fn test_phone_field_accepts_text_and_integers() {
        assert_eq!(phone_field(&CellValue::text("+39 333 1234567")), Some("+39 333 1234567".to_string()));
        assert_eq!(phone_field(&CellValue::Integer(3331234567)), Some("3331234567".to_string()));
        assert_eq!(phone_field(&CellValue::text("   ")), None);
        assert_eq!(phone_field(&CellValue::Float(3.5)), None);
        assert_eq!(phone_field(&CellValue::Empty), None);
        assert_eq!(phone_field(&CellValue::Bool(true)), None);
    }

    #[test]
    fn test_phone_field_keeps_text_verbatim() {
        assert_eq!(phone_field(&CellValue::text(" 333 123 ")), Some(" 333 123 ".to_string()));
        assert_eq!(phone_field(&CellValue::text("\t")), None);
    }
}
