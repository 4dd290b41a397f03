//! Deterministic normalization of identity fields.

/// Lowercase and collapse runs of whitespace to single spaces.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Bring common Egyptian phone formats to a comparable local form:
/// spaces and hyphens are removed, and a `+20` / `20` country prefix
/// becomes a leading `0`.
pub fn normalize_phone(phone: &str) -> String {
    let compact: String = phone
        .trim()
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .collect();

    if let Some(rest) = compact.strip_prefix("+20") {
        return format!("0{rest}");
    }
    if compact.len() >= 12 {
        if let Some(rest) = compact.strip_prefix("20") {
            return format!("0{rest}");
        }
    }
    compact
}

/// Case-insensitive comparison key for national IDs.
pub fn national_id_key(national_id: &str) -> String {
    national_id.trim().to_lowercase()
}

/// Split an uploaded filename into a filesystem-safe stem (alphanumerics,
/// space, `-`, `_`) and its lowercased extension including the dot.
pub fn sanitize_filename(filename: &str) -> (String, String) {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    let (stem, ext) = match base.rfind('.') {
        Some(idx) if idx > 0 => (&base[..idx], &base[idx..]),
        _ => (base, ""),
    };
    let safe: String = stem
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let ext: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
        .collect::<String>()
        .to_lowercase();
    (safe.trim().to_string(), ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_lowercased_and_collapsed() {
        assert_eq!(normalize_name("  Ahmed   MOHAMED\tAli "), "ahmed mohamed ali");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn phone_country_code_becomes_leading_zero() {
        assert_eq!(normalize_phone("+201012345678"), "01012345678");
        assert_eq!(normalize_phone("201012345678"), "01012345678");
        assert_eq!(normalize_phone("010-1234 5678"), "01012345678");
        assert_eq!(normalize_phone("01012345678"), "01012345678");
    }

    #[test]
    fn short_twenty_prefix_is_kept() {
        assert_eq!(normalize_phone("2012345"), "2012345");
        assert_eq!(normalize_phone(""), "");
    }

    #[test]
    fn national_id_key_ignores_case_and_padding() {
        assert_eq!(national_id_key(" AB123 "), "ab123");
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(
            sanitize_filename("Chest X-Ray (final).PNG"),
            ("Chest X-Ray final".to_string(), ".png".to_string())
        );
        assert_eq!(
            sanitize_filename("../../etc/passwd"),
            ("passwd".to_string(), String::new())
        );
        assert_eq!(
            sanitize_filename("report.v2.pdf"),
            ("reportv2".to_string(), ".pdf".to_string())
        );
    }
}
