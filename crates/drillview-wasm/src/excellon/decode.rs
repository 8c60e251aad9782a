//! Coordinate decoding.
//!
//! Tokens with a decimal point are taken literally. Tokens without one are
//! fixed point: with `N` digits and an `upper:lower` format, leading-zero
//! files divide by `10^(N - upper)` and trailing-zero files by `10^lower`.

use super::types::{CoordinateFormat, ZeroMode};

/// Decode a single coordinate or diameter token.
///
/// Returns `None` when the token is not a number.
pub fn decode_coordinate(token: &str, format: CoordinateFormat, zeros: ZeroMode) -> Option<f64> {
    if token.contains('.') {
        return decode_decimal(token);
    }

    let (sign, digits) = split_sign(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let raw: f64 = digits.parse().ok()?;
    let exponent = match zeros {
        ZeroMode::Leading => i32::try_from(digits.len()).ok()? - i32::from(format.upper),
        ZeroMode::Trailing => i32::from(format.lower),
    };
    Some(sign * raw / 10_f64.powi(exponent))
}

/// Parse a literal decimal number such as `01.5000`, `-.25` or `3.`.
pub fn decode_decimal(token: &str) -> Option<f64> {
    let (sign, body) = split_sign(token);
    if body.is_empty() || body == "." {
        return None;
    }
    if !body.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    let value: f64 = body.parse().ok()?;
    value.is_finite().then_some(sign * value)
}

fn split_sign(raw: &str) -> (f64, &str) {
    match (raw.strip_prefix('-'), raw.strip_prefix('+')) {
        (Some(rest), _) => (-1.0, rest),
        (None, Some(rest)) => (1.0, rest),
        (None, None) => (1.0, raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;
    const INCH_2_4: CoordinateFormat = CoordinateFormat::new(2, 4);
    const METRIC_3_3: CoordinateFormat = CoordinateFormat::new(3, 3);

    fn decode(token: &str, format: CoordinateFormat, zeros: ZeroMode) -> f64 {
        let value = decode_coordinate(token, format, zeros);
        assert!(value.is_some(), "`{token}` should decode");
        value.unwrap_or(f64::NAN)
    }

    /// Print `value` the way a CAM tool would for the given format.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )]
    fn encode(value: f64, format: CoordinateFormat, zeros: ZeroMode) -> String {
        let width = usize::from(format.upper + format.lower);
        let scaled = (value.abs() * 10_f64.powi(i32::from(format.lower))).round() as u64;
        let padded = format!("{scaled:0width$}");
        let body = match zeros {
            ZeroMode::Leading => padded.trim_end_matches('0').to_string(),
            ZeroMode::Trailing => padded.trim_start_matches('0').to_string(),
        };
        let body = if body.is_empty() { "0".to_string() } else { body };
        if value < 0.0 {
            format!("-{body}")
        } else {
            body
        }
    }

    #[test]
    fn ut_dec_001_leading_zero_inch() {
        assert!((decode("001000", INCH_2_4, ZeroMode::Leading) - 0.1).abs() < EPSILON);
        assert!((decode("015000", INCH_2_4, ZeroMode::Leading) - 1.5).abs() < EPSILON);
        // trailing zeros omitted
        assert!((decode("015", INCH_2_4, ZeroMode::Leading) - 1.5).abs() < EPSILON);
    }

    #[test]
    fn ut_dec_002_trailing_zero_metric() {
        assert!((decode("1500", METRIC_3_3, ZeroMode::Trailing) - 1.5).abs() < EPSILON);
        assert!((decode("-250", METRIC_3_3, ZeroMode::Trailing) + 0.25).abs() < EPSILON);
    }

    #[test]
    fn ut_dec_003_decimal_tokens_are_literal() {
        assert!((decode("01.5000", INCH_2_4, ZeroMode::Trailing) - 1.5).abs() < EPSILON);
        assert!((decode("-.25", METRIC_3_3, ZeroMode::Leading) + 0.25).abs() < EPSILON);
        assert!((decode("+3.", METRIC_3_3, ZeroMode::Leading) - 3.0).abs() < EPSILON);
    }

    #[test]
    fn ut_dec_004_encode_then_decode_recovers_value_within_precision() {
        let cases = [
            (INCH_2_4, ZeroMode::Leading, 0.1234),
            (INCH_2_4, ZeroMode::Trailing, 12.5),
            (METRIC_3_3, ZeroMode::Leading, 101.6),
            (METRIC_3_3, ZeroMode::Trailing, -0.508),
            (CoordinateFormat::new(2, 5), ZeroMode::Leading, 3.14159),
        ];
        for (format, zeros, value) in cases {
            let token = encode(value, format, zeros);
            let tolerance = 10_f64.powi(-i32::from(format.lower)) / 2.0;
            let decoded = decode(&token, format, zeros);
            assert!(
                (decoded - value).abs() <= tolerance,
                "{value} -> `{token}` -> {decoded}"
            );
        }
    }

    #[test]
    fn bc_dec_001_garbage_tokens_do_not_decode() {
        assert_eq!(decode_coordinate("", INCH_2_4, ZeroMode::Leading), None);
        assert_eq!(decode_coordinate("-", INCH_2_4, ZeroMode::Leading), None);
        assert_eq!(decode_coordinate("1.2.3", INCH_2_4, ZeroMode::Leading), None);
        assert_eq!(decode_coordinate(".", INCH_2_4, ZeroMode::Leading), None);
        assert_eq!(decode_coordinate("12A", INCH_2_4, ZeroMode::Leading), None);
    }
}
