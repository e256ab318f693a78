use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One poll of the player's status page. Captured once per cycle and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObservation {
    /// File path as reported; may contain separators and bracketed tags.
    pub filename: String,
    /// Playback state code, one of "-1", "0", "1", "2".
    pub state_code: String,
    /// Total duration as a clock string, e.g. "01:40:00".
    pub duration_text: String,
    /// Current position as a clock string.
    pub position_text: String,
    /// Reporting server identity, used only for icon selection.
    pub server: String,
}

/// A state code outside the closed set the player is known to emit. This is a
/// contract violation between the player and this bridge, not a recoverable
/// runtime case.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown playback state code {code:?}")]
pub struct UnknownState {
    pub code: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Stopped,
    Paused,
    Playing,
}

impl PlaybackState {
    pub fn from_code(code: &str) -> Result<Self, UnknownState> {
        match code.trim() {
            "-1" => Ok(Self::Idle),
            "0" => Ok(Self::Stopped),
            "1" => Ok(Self::Paused),
            "2" => Ok(Self::Playing),
            _ => Err(UnknownState {
                code: code.to_string(),
            }),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idling",
            Self::Stopped => "Stopped",
            Self::Paused => "Paused",
            Self::Playing => "Playing",
        }
    }

    /// Small status icon shown next to the large player icon.
    pub fn icon_key(self) -> &'static str {
        match self {
            Self::Idle | Self::Stopped => "stop_small",
            Self::Paused => "pause_small",
            Self::Playing => "play_small",
        }
    }
}

/// Which player fork reported, per the web server identity string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerFork {
    MpcHc,
    MpcBe,
    Unknown,
}

impl PlayerFork {
    pub fn from_server(server: &str) -> Self {
        match server {
            "MPC-HC" => Self::MpcHc,
            "MPC-BE" => Self::MpcBe,
            _ => Self::Unknown,
        }
    }

    pub fn icon_key(self) -> &'static str {
        match self {
            Self::MpcHc => "mpchc_logo",
            Self::MpcBe => "mpcbe_logo",
            Self::Unknown => "default",
        }
    }
}

/// Metrics derived from the parsed duration and position of one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackMetrics {
    pub duration_ms: u64,
    pub position_ms: u64,
    /// 0..=100; zero whenever the duration is unknown.
    pub percent_complete: u8,
    pub remaining_ms: u64,
}

impl PlaybackMetrics {
    pub fn derive(duration_ms: u64, position_ms: u64) -> Self {
        let percent_complete = if duration_ms == 0 {
            0
        } else {
            let ratio = position_ms as f64 / duration_ms as f64;
            (ratio * 100.0).round().min(100.0) as u8
        };
        Self {
            duration_ms,
            position_ms,
            percent_complete,
            remaining_ms: duration_ms.saturating_sub(position_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PlaybackMetrics, PlaybackState, PlayerFork};

    #[test]
    fn classifies_every_known_code() {
        assert_eq!(PlaybackState::from_code("-1"), Ok(PlaybackState::Idle));
        assert_eq!(PlaybackState::from_code("0"), Ok(PlaybackState::Stopped));
        assert_eq!(PlaybackState::from_code("1"), Ok(PlaybackState::Paused));
        assert_eq!(PlaybackState::from_code("2"), Ok(PlaybackState::Playing));
    }

    #[test]
    fn rejects_codes_outside_the_set() {
        let err = PlaybackState::from_code("3").unwrap_err();
        assert_eq!(err.code, "3");
        assert!(PlaybackState::from_code("").is_err());
    }

    #[test]
    fn state_display_metadata() {
        assert_eq!(PlaybackState::Playing.label(), "Playing");
        assert_eq!(PlaybackState::Playing.icon_key(), "play_small");
        assert_eq!(PlaybackState::Idle.icon_key(), "stop_small");
    }

    #[test]
    fn fork_icon_selection() {
        assert_eq!(PlayerFork::from_server("MPC-BE").icon_key(), "mpcbe_logo");
        assert_eq!(PlayerFork::from_server("MPC-HC").icon_key(), "mpchc_logo");
        assert_eq!(PlayerFork::from_server("VLC").icon_key(), "default");
    }

    #[test]
    fn percent_is_zero_without_a_duration() {
        let metrics = PlaybackMetrics::derive(0, 45_000);
        assert_eq!(metrics.percent_complete, 0);
    }

    #[test]
    fn percent_rounds_from_the_ratio() {
        assert_eq!(PlaybackMetrics::derive(100_000, 45_000).percent_complete, 45);
        assert_eq!(PlaybackMetrics::derive(3_000, 1_000).percent_complete, 33);
    }

    #[test]
    fn remaining_floors_at_zero() {
        assert_eq!(PlaybackMetrics::derive(10_000, 12_000).remaining_ms, 0);
        assert_eq!(PlaybackMetrics::derive(10_000, 4_000).remaining_ms, 6_000);
    }
}
