//! Kubernetes-style duration strings (`30s`, `5m`, `1h`, `1d`).

use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static DURATION_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?P<number>\d+)(?P<unit>[smhd])$").ok());

/// Parse a Kubernetes duration string
///
/// Accepts `<number><unit>` with unit `s`, `m`, `h` or `d` (case insensitive).
/// Zero durations are rejected.
pub fn parse_kubernetes_duration(duration_str: &str) -> Result<Duration> {
    let duration_trimmed = duration_str.trim();

    if duration_trimmed.is_empty() {
        return Err(anyhow::anyhow!("Duration string cannot be empty"));
    }

    let duration_regex = DURATION_REGEX
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Failed to compile duration regex"))?;

    let interval_lower = duration_trimmed.to_lowercase();
    let captures = duration_regex.captures(&interval_lower).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid duration format '{}'. Expected format: <number><unit> (e.g., '30s', '5m', '1h')",
            duration_trimmed
        )
    })?;

    let number: u64 = captures["number"].parse().map_err(|e| {
        anyhow::anyhow!(
            "Invalid duration number '{}' in '{}': {}",
            &captures["number"],
            duration_trimmed,
            e
        )
    })?;

    if number == 0 {
        return Err(anyhow::anyhow!(
            "Duration number must be greater than 0, got '{}'",
            duration_trimmed
        ));
    }

    let multiplier = match &captures["unit"] {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => 24 * 60 * 60,
    };

    number
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| anyhow::anyhow!("Duration '{}' is too large", duration_trimmed))
}
