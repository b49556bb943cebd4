use anyhow::{anyhow, Result};
use std::time::Duration;

/// Parse human-readable duration strings such as "500", "500ms", "1s", "1.5s"
/// or "2m". A bare number is taken as milliseconds.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();

    if let Ok(ms) = input.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }

    let (number_part, unit_part) = split_number_and_unit(input)?;
    let value: f64 = number_part
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid number in duration: {}", number_part))?;
    if !value.is_finite() || value < 0.0 {
        return Err(anyhow!("Duration must be a positive number: {}", input));
    }

    let multiplier = match unit_part {
        "ms" | "milliseconds" | "millisecond" => 1.0,
        "s" | "sec" | "secs" | "second" | "seconds" => 1000.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60_000.0,
        "" => 1.0,
        _ => return Err(anyhow!("Unknown time unit: {}", unit_part)),
    };

    Ok(Duration::from_millis((value * multiplier) as u64))
}

fn split_number_and_unit(input: &str) -> Result<(&str, &str)> {
    let split_pos = input
        .char_indices()
        .find(|(_, ch)| ch.is_alphabetic())
        .map(|(i, _)| i)
        .unwrap_or(input.len());

    let number_part = &input[..split_pos];
    let unit_part = &input[split_pos..];

    if number_part.is_empty() {
        return Err(anyhow!("No numeric value in duration: {}", input));
    }

    Ok((number_part, unit_part))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_milliseconds() {
        assert_eq!(parse_duration("500").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("750ms").unwrap(), Duration::from_millis(750));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_seconds_and_minutes() {
        assert_eq!(parse_duration("1s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn test_parse_duration_errors() {
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("2h").is_err());
    }
}
