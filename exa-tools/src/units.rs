//! Conversions between human readable quantities and plain numbers.

use lazy_static::lazy_static;
use regex::Regex;

use crate::{parse_err, ParseError};

const SECONDS_IN_MINUTE: u64 = 60;
const SECONDS_IN_HOUR: u64 = SECONDS_IN_MINUTE * 60;
const SECONDS_IN_DAY: u64 = SECONDS_IN_HOUR * 24;
const SECONDS_IN_WEEK: u64 = SECONDS_IN_DAY * 7;

const BINARY_UNITS: [&str; 9] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB", "YiB"];

lazy_static! {
    static ref QUANTITY_REGEX: Regex =
        Regex::new(r"^\s*([0-9]+)(?:[.]([0-9]+))?\s*(?:([KkMmGgTtPpEeZzYy])(i)?)?[Bb]?\s*$")
            .unwrap();
    static ref DURATION_TOKEN_REGEX: [(Regex, u64); 5] = [
        (Regex::new(r"^([0-9]+)w\s*").unwrap(), SECONDS_IN_WEEK),
        (Regex::new(r"^([0-9]+)d\s*").unwrap(), SECONDS_IN_DAY),
        (Regex::new(r"^([0-9]+)h\s*").unwrap(), SECONDS_IN_HOUR),
        (Regex::new(r"^([0-9]+)m\s*").unwrap(), SECONDS_IN_MINUTE),
        (Regex::new(r"^([0-9]+)s\s*").unwrap(), 1),
    ];
}

fn unit_exponent(unit: &str) -> u32 {
    match unit.to_ascii_lowercase().as_str() {
        "k" => 1,
        "m" => 2,
        "g" => 3,
        "t" => 4,
        "p" => 5,
        "e" => 6,
        "z" => 7,
        "y" => 8,
        _ => 0,
    }
}

/// Parse a size like `"1.5 GiB"`, `"300g"` or `"4096"` into bytes.
///
/// A unit followed by `i` uses powers of 1024, otherwise powers of 1000. The
/// fractional part is evaluated exactly and truncated towards zero.
pub fn bytes_from_quantity(text: &str) -> Result<u64, ParseError> {
    let caps = QUANTITY_REGEX
        .captures(text)
        .ok_or_else(|| parse_err!("could not parse '{}' as number with units", text))?;

    let base: u128 = if caps.get(4).is_some() { 1024 } else { 1000 };
    let exponent = caps.get(3).map(|m| unit_exponent(m.as_str())).unwrap_or(0);
    let multiplier = base.pow(exponent);

    let overflow = || parse_err!("quantity '{}' is too large", text.trim());

    let integer: u128 = caps[1].parse().map_err(|_| overflow())?;
    let mut fraction: u128 = 0;
    if let Some(digits) = caps.get(2) {
        // floor(m * 0.d1..dn) == floor((m * d1 + floor(m * 0.d2..dn)) / 10)
        for digit in digits.as_str().bytes().rev() {
            fraction = (multiplier * u128::from(digit - b'0') + fraction) / 10;
        }
    }

    let bytes = integer
        .checked_mul(multiplier)
        .and_then(|v| v.checked_add(fraction))
        .ok_or_else(overflow)?;

    u64::try_from(bytes).map_err(|_| overflow())
}

/// Format a byte count with the largest binary unit keeping the value below 1024.
///
/// Four fractional digits are kept and truncated, so parsing the result never
/// yields more than `bytes`.
pub fn quantity_from_bytes(bytes: u64) -> String {
    let bytes = u128::from(bytes);

    let mut exponent = 0;
    while exponent + 1 < BINARY_UNITS.len() && bytes >= 1024u128.pow(exponent as u32 + 1) {
        exponent += 1;
    }

    let divisor = 1024u128.pow(exponent as u32);
    let integer = bytes / divisor;
    let fraction = (bytes % divisor) * 10_000 / divisor;

    let text = format!("{}.{:04}", integer, fraction);
    format!("{} {}", trim_fraction(&text), BINARY_UNITS[exponent])
}

fn trim_fraction(text: &str) -> &str {
    if !text.contains('.') {
        return text;
    }
    text.trim_end_matches('0').trim_end_matches('.')
}

/// Parse a duration like `"1w 2d 3h 4m 5s"` (each part optional, in that order)
/// or a plain number of seconds. Empty input is zero.
pub fn seconds_from_duration(text: &str) -> Result<u64, ParseError> {
    let too_large = || parse_err!("duration '{}' is too large", text);

    if let Ok(seconds) = text.trim().parse::<u64>() {
        return Ok(seconds);
    }

    let mut seconds: u64 = 0;
    let mut rest = text;

    for (regex, factor) in DURATION_TOKEN_REGEX.iter() {
        if let Some(caps) = regex.captures(rest) {
            let value: u64 = caps[1].parse().map_err(|_| too_large())?;
            seconds = value
                .checked_mul(*factor)
                .and_then(|v| v.checked_add(seconds))
                .ok_or_else(too_large)?;
            rest = &rest[caps[0].len()..];
        }
    }

    if !rest.is_empty() {
        if let Ok(value) = rest.trim().parse::<u64>() {
            seconds = seconds.checked_add(value).ok_or_else(too_large)?;
            rest = "";
        }
    }

    if !rest.is_empty() {
        return Err(parse_err!(
            "invalid duration '{}' - format must be: <num>w <num>d <num>h <num>m <num>s",
            text
        ));
    }

    Ok(seconds)
}

/// Inverse of [`seconds_from_duration`]. Zero is rendered as `"0s"`.
pub fn duration_from_seconds(seconds: u64) -> String {
    let mut rest = seconds;
    let mut parts = Vec::new();

    for (factor, suffix) in [
        (SECONDS_IN_WEEK, 'w'),
        (SECONDS_IN_DAY, 'd'),
        (SECONDS_IN_HOUR, 'h'),
        (SECONDS_IN_MINUTE, 'm'),
        (1, 's'),
    ] {
        let value = rest / factor;
        rest %= factor;
        if value > 0 {
            parts.push(format!("{}{}", value, suffix));
        }
    }

    if parts.is_empty() {
        return String::from("0s");
    }
    parts.join(" ")
}

/// Parse an owner given as `"uid:gid"`.
pub fn parse_owner(text: &str) -> Result<(u32, u32), ParseError> {
    let parts: Vec<&str> = text
        .split(':')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if let [uid, gid] = parts[..] {
        if let (Ok(uid), Ok(gid)) = (uid.parse(), gid.parse()) {
            return Ok((uid, gid));
        }
    }

    Err(parse_err!(
        "invalid owner '{}' - please specify user and group ID (e.g. 1000:1000)",
        text
    ))
}

/// Split a comma separated list, dropping empty entries.
pub fn parse_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}
