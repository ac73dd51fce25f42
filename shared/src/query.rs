use crate::config::ResizerConfig;
use std::collections::HashMap;

/// Parse a raw query string (`w=50&h=50`) into a map.
/// Keys and values are percent-decoded, `+` reads as a space and the first
/// occurrence of a repeated key wins.
pub fn parse_query(querystring: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    for pair in querystring.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key);
        if key.is_empty() {
            continue;
        }
        params.entry(key).or_insert_with(|| decode_component(value));
    }

    params
}

fn decode_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    match urlencoding::decode(&raw) {
        Ok(decoded) => decoded.into_owned(),
        // Keep malformed escapes as-is rather than dropping the parameter
        Err(_) => raw,
    }
}

/// Lenient integer parse: leading whitespace, optional sign, optional `0x`
/// prefix, then as many digits as are present. Trailing junk is ignored
/// (`"50px"` reads as 50). Magnitudes beyond `i64` saturate.
pub fn parse_leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let (radix, s) = match s.get(..2) {
        Some("0x") | Some("0X") => (16, &s[2..]),
        _ => (10, s),
    };

    let digits: Vec<u32> = s.chars().map_while(|c| c.to_digit(radix)).collect();
    if digits.is_empty() {
        return None;
    }

    let magnitude = digits.iter().try_fold(0i64, |acc, d| {
        acc.checked_mul(radix as i64)?.checked_add(*d as i64)
    });

    Some(match (magnitude, negative) {
        (Some(m), false) => m,
        (Some(m), true) => -m,
        (None, false) => i64::MAX,
        (None, true) => i64::MIN,
    })
}

/// Resolve one requested bound.
/// Missing, non-numeric or non-positive values fall back to `max`; anything
/// larger than `max` is clamped to it. The result is always in `[1, max]`.
pub fn parse_dimension(raw: Option<&str>, max: u32) -> u32 {
    match raw.and_then(parse_leading_int) {
        Some(value) if value > 0 => value.min(max as i64) as u32,
        _ => max,
    }
}

/// Requested output bounds after defaulting and clamping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedSize {
    pub width: u32,
    pub height: u32,
}

impl RequestedSize {
    pub fn from_query(params: &HashMap<String, String>, config: &ResizerConfig) -> Self {
        Self {
            width: parse_dimension(params.get("w").map(String::as_str), config.max_width),
            height: parse_dimension(params.get("h").map(String::as_str), config.max_height),
        }
    }

    pub fn from_querystring(querystring: &str, config: &ResizerConfig) -> Self {
        Self::from_query(&parse_query(querystring), config)
    }
}
