use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::SubscriptionError;
use crate::realtime::messages::{
    build_heartbeat_msg, build_join_msg, build_leave_msg, jobs_topic, parse_frame, ParsedFrame,
};
use crate::types::Job;

const JOIN_REF: &str = "1";

/// A live websocket joined (or joining) the jobs change channel.
///
/// Owned by the subscription manager; `close` must be called before a replacement is opened
/// so two listeners never dispatch the same event.
pub struct RealtimeListener {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    topic: String,
    next_ref: u64,
    heartbeat: Interval,
    /// Ref of the last heartbeat sent and not yet answered.
    pending_heartbeat: Option<String>,
}

impl RealtimeListener {
    /// Open the socket and send the join request. Does not wait for the reply.
    ///
    /// A heartbeat goes out every `heartbeat_every`; if one is still unanswered when the next
    /// is due, the socket is considered dead.
    pub async fn open(
        url: &str,
        access_token: &str,
        heartbeat_every: Duration,
    ) -> Result<Self, SubscriptionError> {
        let (ws, _) = connect_async(url).await?;
        let mut heartbeat = interval(heartbeat_every);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        heartbeat.reset();

        let mut listener = Self {
            ws,
            topic: jobs_topic(),
            next_ref: 2,
            heartbeat,
            pending_heartbeat: None,
        };
        let join = build_join_msg(&listener.topic, access_token, JOIN_REF);
        listener.ws.send(Message::Text(join.into())).await?;
        Ok(listener)
    }

    /// Wait for the join reply.
    pub async fn await_joined(&mut self) -> Result<(), SubscriptionError> {
        loop {
            match self.next_frame().await? {
                ParsedFrame::JoinReply { ok: true, .. } => return Ok(()),
                ParsedFrame::JoinReply { ok: false, reason } => {
                    return Err(SubscriptionError::ChannelError(
                        reason.unwrap_or_else(|| "join rejected".to_string()),
                    ))
                }
                ParsedFrame::ChannelClosed { reason } => {
                    return Err(SubscriptionError::ChannelError(reason))
                }
                ParsedFrame::Inserted(_)
                | ParsedFrame::HeartbeatReply { .. }
                | ParsedFrame::Ignored => {}
            }
        }
    }

    /// Wait for the next created job. Records that do not decode as a job are logged and
    /// skipped; only channel failures end the stream.
    pub async fn next_job(&mut self) -> Result<Job, SubscriptionError> {
        loop {
            match self.next_frame().await? {
                ParsedFrame::Inserted(record) => match serde_json::from_value::<Job>(record) {
                    Ok(job) => return Ok(job),
                    Err(e) => warn!("Ignoring job insert that does not decode: {e}"),
                },
                ParsedFrame::ChannelClosed { reason } => {
                    return Err(SubscriptionError::ChannelError(reason))
                }
                ParsedFrame::JoinReply { .. }
                | ParsedFrame::HeartbeatReply { .. }
                | ParsedFrame::Ignored => {}
            }
        }
    }

    /// Leave the channel and close the socket. Errors are irrelevant at this point.
    pub async fn close(mut self) {
        let leave = build_leave_msg(&self.topic, self.next_ref);
        if let Err(e) = self.ws.send(Message::Text(leave.into())).await {
            debug!("Realtime leave not sent: {e}");
        }
        if let Err(e) = self.ws.close(None).await {
            debug!("Realtime close: {e}");
        }
    }

    /// Read until a channel frame arrives, answering pings and keeping heartbeats going
    /// meanwhile. Heartbeat replies are consumed here.
    async fn next_frame(&mut self) -> Result<ParsedFrame, SubscriptionError> {
        loop {
            tokio::select! {
                msg = self.ws.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match parse_frame(&text, &self.topic, JOIN_REF) {
                                ParsedFrame::HeartbeatReply { msg_ref } => {
                                    if self.pending_heartbeat.as_deref() == Some(msg_ref.as_str()) {
                                        self.pending_heartbeat = None;
                                    }
                                }
                                frame => return Ok(frame),
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            self.ws.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return Err(SubscriptionError::ChannelError("socket closed".to_string()));
                        }
                        Some(Err(e)) => return Err(e.into()),
                        Some(Ok(_)) => {}
                    }
                }

                _ = self.heartbeat.tick() => {
                    if let Some(unanswered) = &self.pending_heartbeat {
                        warn!(heartbeat_ref = %unanswered, "Realtime heartbeat went unanswered");
                        return Err(SubscriptionError::Timeout);
                    }
                    debug!("Realtime heartbeat");
                    let hb = build_heartbeat_msg(self.next_ref);
                    self.pending_heartbeat = Some(self.next_ref.to_string());
                    self.next_ref += 1;
                    self.ws.send(Message::Text(hb.into())).await?;
                }
            }
        }
    }
}
