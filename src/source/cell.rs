// src/source/cell.rs

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Like `clean_str`, but drops the `.0` a float round-trip leaves on numeric codes.
pub fn clean_code(raw: &str) -> String {
    let cleaned = clean_str(raw);
    match cleaned.strip_suffix(".0") {
        Some(digits) if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
            digits.to_string()
        }
        _ => cleaned,
    }
}

/// Parse an integer cell; integral floats (`2022.0`) are accepted.
pub fn parse_integer(cleaned: &str) -> Option<i64> {
    if let Ok(v) = cleaned.parse::<i64>() {
        return Some(v);
    }
    let f = cleaned.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Parse a decimal cell. Thousands separators are tolerated; NaN and infinities are not.
pub fn parse_decimal(cleaned: &str) -> Option<f64> {
    let v = if cleaned.contains(',') {
        cleaned.replace(',', "").parse::<f64>().ok()?
    } else {
        cleaned.parse::<f64>().ok()?
    };
    v.is_finite().then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_quotes_and_codes() {
        assert_eq!(clean_str("  \" Maharashtra \" "), "Maharashtra");
        assert_eq!(clean_str("\""), "\"");
        assert_eq!(clean_code("560001.0"), "560001");
        assert_eq!(clean_code("\"110001\""), "110001");
        assert_eq!(clean_code("12.05"), "12.05");
        assert_eq!(clean_code(".0"), ".0");
    }

    #[test]
    fn parses_numbers() {
        assert_eq!(parse_integer("2022"), Some(2022));
        assert_eq!(parse_integer("2022.0"), Some(2022));
        assert_eq!(parse_integer("2022.5"), None);
        assert_eq!(parse_integer("Q1"), None);
        assert_eq!(parse_decimal("1,234.5"), Some(1234.5));
        assert_eq!(parse_decimal("NaN"), None);
        assert_eq!(parse_decimal("inf"), None);
    }
}
