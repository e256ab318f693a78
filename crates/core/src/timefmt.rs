use thiserror::Error;

/// A clock string that could not be read as "hh:mm:ss" or "mm:ss".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed clock string {text:?}")]
pub struct MalformedTime {
    pub text: String,
}

/// Parses "hh:mm:ss" or "mm:ss" into milliseconds. The hour field is optional
/// and defaults to zero.
pub fn parse_clock(text: &str) -> Result<u64, MalformedTime> {
    let malformed = || MalformedTime {
        text: text.to_string(),
    };

    let parts: Vec<&str> = text.trim().split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(malformed());
    }

    // hours, minutes, seconds; the hour slot stays zero for "mm:ss".
    let mut fields = [0u64; 3];
    let offset = 3 - parts.len();
    for (i, part) in parts.iter().enumerate() {
        fields[offset + i] = part.parse().map_err(|_| malformed())?;
    }
    let [hours, minutes, seconds] = fields;

    Ok((hours * 3_600 + minutes * 60 + seconds) * 1_000)
}

/// Renders milliseconds as "mm:ss", or "hh:mm:ss" once a full hour is reached.
/// Zero renders as "00:00".
pub fn format_duration(ms: u64) -> String {
    let total_seconds = ms / 1_000;
    let hours = total_seconds / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Drops an exactly-"00" hour field from an "hh:mm:ss" string, leaving any
/// other input unchanged.
pub fn strip_leading_zero_hour(text: &str) -> &str {
    match text.split_once(':') {
        Some(("00", rest)) if rest.contains(':') => rest,
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::{format_duration, parse_clock, strip_leading_zero_hour};

    #[test]
    fn parses_with_and_without_hours() {
        assert_eq!(parse_clock("01:40:00"), Ok(6_000_000));
        assert_eq!(parse_clock("50:00"), Ok(3_000_000));
        assert_eq!(parse_clock("00:07"), Ok(7_000));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_clock("90").is_err());
        assert!(parse_clock("").is_err());
        assert!(parse_clock("aa:bb").is_err());
        assert!(parse_clock("1:2:3:4").is_err());
        assert!(parse_clock("12:").is_err());
    }

    #[test]
    fn formats_below_and_above_one_hour() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(7_000), "00:07");
        assert_eq!(format_duration(3_000_000), "50:00");
        assert_eq!(format_duration(6_000_000), "01:40:00");
    }

    #[test]
    fn round_trips_whole_seconds() {
        for ms in [0, 1_000, 59_000, 60_000, 3_599_000, 3_600_000, 86_399_000] {
            assert_eq!(parse_clock(&format_duration(ms)), Ok(ms));
        }
    }

    #[test]
    fn strips_only_a_zero_hour_field() {
        assert_eq!(strip_leading_zero_hour("00:05:30"), "05:30");
        assert_eq!(strip_leading_zero_hour("01:05:30"), "01:05:30");
        assert_eq!(strip_leading_zero_hour("00:30"), "00:30");
        assert_eq!(strip_leading_zero_hour("05:30"), "05:30");
    }
}
