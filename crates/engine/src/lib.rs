use mpc_presence_core::{
    timefmt, urls, AppConfig, DisplayConfig, MalformedTime, NormalizedTrack, PlaybackMetrics,
    PlaybackState, PlayerFork, RawObservation, UnknownState,
};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceButton {
    pub label: String,
    pub url: String,
}

/// Progress indicator piggybacking on the party slot: size is
/// [percent complete, 100].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceParty {
    pub id: String,
    pub size: [u32; 2],
}

/// Outbound presence activity. Absent fields and empty collections are
/// stripped at this serialization boundary; the wire form never carries
/// explicit nulls or empty containers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresencePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<i64>,
    pub large_image_key: String,
    pub large_image_text: String,
    pub small_image_key: String,
    pub small_image_text: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub buttons: Vec<PresenceButton>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party: Option<PresenceParty>,
}

/// Why one observation cycle could not produce a payload.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The cycle is abandoned and the gate stays untouched.
    #[error(transparent)]
    MalformedTime(#[from] MalformedTime),
    /// Contract violation with the upstream player; fatal.
    #[error(transparent)]
    UnknownState(#[from] UnknownState),
}

#[derive(Debug, Clone)]
pub enum EngineAction {
    Send(PresencePayload),
    None,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub display: DisplayConfig,
    pub port: u16,
    pub playing_delta_ms: u64,
    pub paused_delta_ms: u64,
}

impl EngineConfig {
    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self {
            display: cfg.display.clone(),
            port: cfg.port,
            playing_delta_ms: cfg.intervals.playing_delta_ms,
            paused_delta_ms: cfg.intervals.paused_delta_ms,
        }
    }
}

/// Last-emitted snapshot. Updated when an emit is decided; a later publish
/// failure does not roll it back, so a failing sink is not retried with the
/// same observation.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateGate {
    last: Option<(PlaybackState, u64)>,
}

impl UpdateGate {
    /// Decides whether the new observation differs enough from the snapshot
    /// to be worth broadcasting. Any state transition emits; otherwise only
    /// position drift past the per-state threshold does.
    pub fn should_emit(&self, state: PlaybackState, position_ms: u64, cfg: &EngineConfig) -> bool {
        let (last_state, last_position) = match self.last {
            Some(snapshot) => snapshot,
            None => return true,
        };
        if state != last_state {
            return true;
        }
        let delta = position_ms.abs_diff(last_position);
        match state {
            PlaybackState::Playing => delta >= cfg.playing_delta_ms,
            PlaybackState::Paused => delta >= cfg.paused_delta_ms,
            PlaybackState::Idle | PlaybackState::Stopped => false,
        }
    }

    pub fn record(&mut self, state: PlaybackState, position_ms: u64) {
        self.last = Some((state, position_ms));
    }
}

/// Reconciles raw observations into presence updates. One tick per poll
/// cycle; cycles are serialized by the caller.
pub struct PresenceEngine {
    cfg: EngineConfig,
    gate: UpdateGate,
}

impl PresenceEngine {
    pub fn new(cfg: EngineConfig) -> Self {
        Self {
            cfg,
            gate: UpdateGate::default(),
        }
    }

    pub fn tick(
        &mut self,
        obs: &RawObservation,
        now: SystemTime,
    ) -> Result<EngineAction, CycleError> {
        let state = PlaybackState::from_code(&obs.state_code)?;
        let duration_ms = timefmt::parse_clock(&obs.duration_text)?;
        let position_ms = timefmt::parse_clock(&obs.position_text)?;
        let metrics = PlaybackMetrics::derive(duration_ms, position_ms);

        if !self.gate.should_emit(state, position_ms, &self.cfg) {
            debug!(?state, position_ms, "observation below emit threshold");
            return Ok(EngineAction::None);
        }

        let payload = self.build_payload(obs, state, &metrics, now);
        self.gate.record(state, position_ms);
        Ok(EngineAction::Send(payload))
    }

    fn build_payload(
        &self,
        obs: &RawObservation,
        state: PlaybackState,
        metrics: &PlaybackMetrics,
        now: SystemTime,
    ) -> PresencePayload {
        let fork = PlayerFork::from_server(&obs.server);
        let duration = timefmt::strip_leading_zero_hour(&obs.duration_text);
        let position = timefmt::strip_leading_zero_hour(&obs.position_text);
        let percent = metrics.percent_complete;
        let now_ms = epoch_ms(now);

        let track = NormalizedTrack::from_filename(&obs.filename, &self.cfg.display);
        let mut details = Some(track.title);
        let mut start_timestamp = None;
        let mut end_timestamp = None;
        let mut large_image_text = format!("{} • {}", obs.server, duration);

        let state_line = match state {
            PlaybackState::Idle => {
                details = None;
                large_image_text = obs.server.clone();
                "No media loaded".to_string()
            }
            PlaybackState::Stopped => format!("⏹️ {duration} total"),
            PlaybackState::Paused => format!("⏸️ {position} / {duration} • {percent}%"),
            PlaybackState::Playing => {
                if self.cfg.display.show_remaining_time {
                    let remaining = timefmt::format_duration(metrics.remaining_ms);
                    end_timestamp = Some(now_ms + metrics.remaining_ms as i64);
                    format!("▶️ {remaining} left • {percent}%")
                } else {
                    start_timestamp = Some(now_ms - metrics.position_ms as i64);
                    format!("▶️ {position} / {duration} • {percent}%")
                }
            }
        };

        let buttons = if matches!(state, PlaybackState::Playing | PlaybackState::Paused) {
            vec![PresenceButton {
                label: "🎬 Open MPC Web Interface".to_string(),
                url: urls::web_interface_url(self.cfg.port),
            }]
        } else {
            Vec::new()
        };

        let party = (state == PlaybackState::Playing && metrics.duration_ms > 0).then(|| {
            PresenceParty {
                id: format!("mpc-playback-{now_ms}"),
                size: [u32::from(percent), 100],
            }
        });

        PresencePayload {
            details,
            state: state_line,
            start_timestamp,
            end_timestamp,
            large_image_key: fork.icon_key().to_string(),
            large_image_text,
            small_image_key: state.icon_key().to_string(),
            small_image_text: state.label().to_string(),
            buttons,
            party,
        }
    }
}

fn epoch_ms(now: SystemTime) -> i64 {
    now.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
