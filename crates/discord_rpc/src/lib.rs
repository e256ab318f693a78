mod transport;

use crate::transport::Transport;
use anyhow::{anyhow, Result};
use mpc_presence_engine::PresencePayload;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::debug;

const BACKOFF_STEPS: [Duration; 4] = [
    Duration::from_secs(2),
    Duration::from_secs(5),
    Duration::from_secs(10),
    Duration::from_secs(30),
];

/// Downstream presence sink over the local Discord RPC endpoint. Owns the
/// transport lifecycle and reconnect backoff; callers only publish or clear
/// and log the outcome.
pub struct DiscordClient {
    app_id: String,
    transport: Option<Transport>,
    backoff_idx: usize,
    next_retry_at: Instant,
}

impl DiscordClient {
    pub fn new(app_id: String) -> Self {
        Self {
            app_id,
            transport: None,
            backoff_idx: 0,
            next_retry_at: Instant::now(),
        }
    }

    pub async fn publish(&mut self, payload: &PresencePayload) -> Result<()> {
        self.set_activity(build_activity(payload)).await
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.set_activity(Value::Null).await
    }

    async fn set_activity(&mut self, activity: Value) -> Result<()> {
        self.ensure_connected().await?;

        let command = json!({
            "cmd": "SET_ACTIVITY",
            "args": {
                "pid": std::process::id(),
                "activity": activity,
            },
            "nonce": nonce(),
        });

        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| anyhow!("discord transport not connected"))?;
        match transport.send_command(&command).await {
            Ok(raw) => check_response(&raw),
            Err(err) => {
                self.transport = None;
                self.schedule_backoff();
                Err(err)
            }
        }
    }

    async fn ensure_connected(&mut self) -> Result<()> {
        if self.transport.is_some() {
            return Ok(());
        }
        if Instant::now() < self.next_retry_at {
            return Err(anyhow!("discord reconnect backoff active"));
        }

        match Transport::connect(&self.app_id).await {
            Some(transport) => {
                debug!("discord rpc connected");
                self.transport = Some(transport);
                self.backoff_idx = 0;
                self.next_retry_at = Instant::now();
                Ok(())
            }
            None => {
                self.schedule_backoff();
                Err(anyhow!("unable to connect to local Discord RPC"))
            }
        }
    }

    fn schedule_backoff(&mut self) {
        let idx = self.backoff_idx.min(BACKOFF_STEPS.len() - 1);
        self.next_retry_at = Instant::now() + BACKOFF_STEPS[idx];
        self.backoff_idx = (self.backoff_idx + 1).min(BACKOFF_STEPS.len() - 1);
    }
}

/// Maps the payload onto Discord's activity shape. Optional payload fields
/// that are absent stay absent here too; the activity never carries null
/// members or empty collections.
fn build_activity(payload: &PresencePayload) -> Value {
    let mut activity = serde_json::Map::new();

    if let Some(details) = &payload.details {
        activity.insert("details".to_string(), json!(details));
    }
    activity.insert("state".to_string(), json!(payload.state));

    let mut timestamps = serde_json::Map::new();
    if let Some(ts) = payload.start_timestamp {
        timestamps.insert("start".to_string(), json!(ts));
    }
    if let Some(ts) = payload.end_timestamp {
        timestamps.insert("end".to_string(), json!(ts));
    }
    if !timestamps.is_empty() {
        activity.insert("timestamps".to_string(), Value::Object(timestamps));
    }

    activity.insert(
        "assets".to_string(),
        json!({
            "large_image": payload.large_image_key,
            "large_text": payload.large_image_text,
            "small_image": payload.small_image_key,
            "small_text": payload.small_image_text,
        }),
    );

    if !payload.buttons.is_empty() {
        let buttons = payload
            .buttons
            .iter()
            .map(|b| json!({ "label": b.label, "url": b.url }))
            .collect();
        activity.insert("buttons".to_string(), Value::Array(buttons));
    }

    if let Some(party) = &payload.party {
        activity.insert(
            "party".to_string(),
            json!({ "id": party.id, "size": party.size }),
        );
    }

    Value::Object(activity)
}

fn check_response(raw: &[u8]) -> Result<()> {
    let value: Value = match serde_json::from_slice(raw) {
        Ok(v) => v,
        Err(_) => return Ok(()),
    };

    let is_error = value
        .get("evt")
        .and_then(|v| v.as_str())
        .map(|evt| evt.eq_ignore_ascii_case("ERROR"))
        .unwrap_or(false);
    if !is_error {
        return Ok(());
    }

    let data = value.get("data");
    let code = data
        .and_then(|d| d.get("code"))
        .and_then(|c| c.as_i64())
        .unwrap_or_default();
    let msg = data
        .and_then(|d| d.get("message"))
        .and_then(|m| m.as_str())
        .unwrap_or("unknown discord rpc error");
    Err(anyhow!("discord rpc error {code}: {msg}"))
}

fn nonce() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let n = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{n:x}")
}

#[cfg(test)]
mod tests {
    use super::{build_activity, check_response};
    use mpc_presence_engine::{PresenceButton, PresenceParty, PresencePayload};

    fn idle_payload() -> PresencePayload {
        PresencePayload {
            details: None,
            state: "No media loaded".to_string(),
            start_timestamp: None,
            end_timestamp: None,
            large_image_key: "default".to_string(),
            large_image_text: "MPC-HC".to_string(),
            small_image_key: "stop_small".to_string(),
            small_image_text: "Idling".to_string(),
            buttons: Vec::new(),
            party: None,
        }
    }

    #[test]
    fn idle_activity_has_no_optional_members() {
        let activity = build_activity(&idle_payload());
        let obj = activity.as_object().unwrap();

        assert!(!obj.contains_key("details"));
        assert!(!obj.contains_key("timestamps"));
        assert!(!obj.contains_key("buttons"));
        assert!(!obj.contains_key("party"));
        assert_eq!(obj["state"], "No media loaded");
        assert_eq!(obj["assets"]["small_image"], "stop_small");
    }

    #[test]
    fn playing_activity_nests_timestamps_and_party() {
        let mut payload = idle_payload();
        payload.details = Some("My Movie.mkv".to_string());
        payload.start_timestamp = Some(1_700_000_000_000);
        payload.buttons = vec![PresenceButton {
            label: "🎬 Open MPC Web Interface".to_string(),
            url: "http://127.0.0.1:13579/".to_string(),
        }];
        payload.party = Some(PresenceParty {
            id: "mpc-playback-1".to_string(),
            size: [50, 100],
        });

        let activity = build_activity(&payload);
        assert_eq!(activity["timestamps"]["start"], 1_700_000_000_000i64);
        assert!(activity["timestamps"].get("end").is_none());
        assert_eq!(activity["party"]["size"][0], 50);
        assert_eq!(activity["buttons"][0]["url"], "http://127.0.0.1:13579/");
    }

    #[test]
    fn error_events_surface_as_errors() {
        let raw = br#"{"evt":"ERROR","data":{"code":4000,"message":"bad payload"}}"#;
        let err = check_response(raw).unwrap_err();
        assert!(err.to_string().contains("4000"));

        assert!(check_response(br#"{"evt":"READY"}"#).is_ok());
        assert!(check_response(b"not json").is_ok());
    }
}
