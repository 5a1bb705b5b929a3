use serde::Deserialize;
use serde_json::Value;

use crate::config::JOBS_TABLE;

/// Topic heartbeats are sent on and answered from.
pub const HEARTBEAT_TOPIC: &str = "phoenix";

/// Channel topic for row changes on the jobs table.
pub fn jobs_topic() -> String {
    format!("realtime:public:{JOBS_TABLE}")
}

/// Join frame asking for INSERT notifications on the jobs table only.
pub fn build_join_msg(topic: &str, access_token: &str, join_ref: &str) -> String {
    serde_json::json!({
        "topic": topic,
        "event": "phx_join",
        "payload": {
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [
                    { "event": "INSERT", "schema": "public", "table": JOBS_TABLE }
                ]
            },
            "access_token": access_token
        },
        "ref": join_ref,
        "join_ref": join_ref
    })
    .to_string()
}

pub fn build_heartbeat_msg(msg_ref: u64) -> String {
    serde_json::json!({
        "topic": HEARTBEAT_TOPIC,
        "event": "heartbeat",
        "payload": {},
        "ref": msg_ref.to_string()
    })
    .to_string()
}

pub fn build_leave_msg(topic: &str, msg_ref: u64) -> String {
    serde_json::json!({
        "topic": topic,
        "event": "phx_leave",
        "payload": {},
        "ref": msg_ref.to_string()
    })
    .to_string()
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(rename = "ref", default)]
    msg_ref: Option<String>,
}

/// What a single incoming frame means for the listener.
#[derive(Debug, PartialEq)]
pub enum ParsedFrame {
    /// Reply to our join: `ok` subscribes, anything else is a channel error.
    JoinReply { ok: bool, reason: Option<String> },
    /// A row was inserted into the jobs table; carries the raw record.
    Inserted(Value),
    /// The server errored or closed our channel.
    ChannelClosed { reason: String },
    /// Server acknowledged the heartbeat with this ref.
    HeartbeatReply { msg_ref: String },
    /// Presence, other tables, replies to refs we are not waiting on. Nothing to do.
    Ignored,
}

pub fn parse_frame(text: &str, topic: &str, join_ref: &str) -> ParsedFrame {
    let frame: RawFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(_) => return ParsedFrame::Ignored,
    };
    if frame.topic == HEARTBEAT_TOPIC && frame.event == "phx_reply" {
        return match frame.msg_ref {
            Some(msg_ref) => ParsedFrame::HeartbeatReply { msg_ref },
            None => ParsedFrame::Ignored,
        };
    }
    if frame.topic != topic {
        return ParsedFrame::Ignored;
    }

    match frame.event.as_str() {
        "phx_reply" if frame.msg_ref.as_deref() == Some(join_ref) => {
            let ok = frame.payload.get("status").and_then(Value::as_str) == Some("ok");
            let reason = if ok { None } else { error_reason(&frame.payload) };
            ParsedFrame::JoinReply { ok, reason }
        }
        "phx_error" | "phx_close" => ParsedFrame::ChannelClosed {
            reason: error_reason(&frame.payload).unwrap_or_else(|| frame.event.clone()),
        },
        "system" => {
            if frame.payload.get("status").and_then(Value::as_str) == Some("error") {
                ParsedFrame::ChannelClosed {
                    reason: error_reason(&frame.payload).unwrap_or_else(|| "system error".to_string()),
                }
            } else {
                ParsedFrame::Ignored
            }
        }
        "postgres_changes" => {
            let data = &frame.payload["data"];
            match (data.get("type").and_then(Value::as_str), data.get("record")) {
                (Some("INSERT"), Some(record)) => ParsedFrame::Inserted(record.clone()),
                _ => ParsedFrame::Ignored,
            }
        }
        // Older servers push the change type as the event name.
        "INSERT" => match frame.payload.get("record") {
            Some(record) => ParsedFrame::Inserted(record.clone()),
            None => ParsedFrame::Ignored,
        },
        _ => ParsedFrame::Ignored,
    }
}

fn error_reason(payload: &Value) -> Option<String> {
    ["response", "message", "reason"]
        .iter()
        .find_map(|k| payload.get(*k))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            Value::Object(o) => o
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| v.to_string()),
            other => other.to_string(),
        })
}
