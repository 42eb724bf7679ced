/// Literal the feed sends when a runner has no live price yet.
pub const STARTING_PRICE_SENTINEL: &str = "SP";

/// Convert a feed price string to decimal odds rounded to 2dp.
///
/// `"N/D"` is fractional and becomes `N/D + 1`; anything else is read as a
/// decimal price. Returns `None` for the starting-price sentinel, garbage,
/// a zero or negative denominator, or any result that is not a finite
/// positive number.
pub fn parse_decimal_odds(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case(STARTING_PRICE_SENTINEL) {
        return None;
    }

    let decimal = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den <= 0.0 {
                return None;
            }
            num / den + 1.0
        }
        None => raw.parse::<f64>().ok()?,
    };

    if !decimal.is_finite() || decimal <= 0.0 {
        return None;
    }
    Some(round_2dp(decimal))
}

/// Rounds the stored binary value half away from zero, so a literal such as
/// "1.005" (held just below the half) rounds down to 1.0.
pub fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
