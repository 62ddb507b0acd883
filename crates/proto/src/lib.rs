//! Event shapes exchanged between the poller, worker and sender processes
//! over the broker. Payloads are bson-encoded; `type_` tags pick the variant.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use teloxide::types::Update;

pub const ROUTING_KEY_POLLER: &str = "poller";
pub const ROUTING_KEY_WORKER: &str = "worker";
pub const ROUTING_KEY_SENDER: &str = "sender";

pub const QUEUE_WORKER: &str = "tg_bot";
pub const QUEUE_SENDER: &str = "tg_bot_sender";

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("failed to encode message: {0}")]
    Encode(#[from] bson::ser::Error),
    #[error("failed to decode message: {0}")]
    Decode(#[from] bson::de::Error),
}

/// Whatever the worker's `tg_bot` queue delivers, distinguished by the
/// routing key the message arrived on rather than by payload shape — the
/// raw Telegram update carries no `type_` discriminator of its own.
#[derive(Debug, Clone)]
pub enum WorkerInbound {
    Update(Update),
    Event(WorkerEvent),
}

impl WorkerInbound {
    pub fn decode(routing_key: &str, body: &[u8]) -> Result<Self, ProtoError> {
        if routing_key == ROUTING_KEY_POLLER {
            Ok(WorkerInbound::Update(bson::from_slice(body)?))
        } else {
            Ok(WorkerInbound::Event(bson::from_slice(body)?))
        }
    }
}

pub fn encode_update(update: &Update) -> Result<Vec<u8>, ProtoError> {
    Ok(bson::to_vec(update)?)
}

/// Self-addressed events the worker publishes to its own routing key to
/// resume work after a delay (timeouts) or after the sender closes a poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type_", rename_all = "snake_case")]
pub enum WorkerEvent {
    PickLeader {
        chat_id: i64,
    },
    SlowPlayer {
        game_id: i64,
        user_id: i64,
        round: i32,
    },
    PollId {
        poll_id: String,
        chat_id: i64,
    },
    PollResult {
        chat_id: i64,
        poll_id: String,
        poll_result: PollOutcome,
        word: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollOutcome {
    Yes,
    No,
}

impl WorkerEvent {
    pub fn encode(&self) -> Result<Vec<u8>, ProtoError> {
        Ok(bson::to_vec(self)?)
    }

    pub fn decode(body: &[u8]) -> Result<Self, ProtoError> {
        Ok(bson::from_slice(body)?)
    }
}

/// Outbound commands the worker hands to the sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type_", rename_all = "snake_case")]
pub enum SenderCommand {
    Message {
        chat_id: i64,
        text: String,
        #[serde(default)]
        force_reply: bool,
    },
    MessageKeyboard {
        chat_id: i64,
        text: String,
        keyboard: KeyboardKind,
        /// Seconds the inline keyboard stays clickable; 0 disables auto-removal.
        #[serde(default)]
        live_time: u64,
    },
    MessageInlineRemoveKeyboard {
        chat_id: i64,
        keyboard_message_id: i32,
    },
    CallbackAlert {
        callback_id: String,
        text: String,
    },
    SendPoll {
        chat_id: i64,
        question: String,
        options: Vec<String>,
        anonymous: bool,
        period: u32,
        /// The word this poll is admitting — carried through so the sender's
        /// delayed `send_poll_answer` can report it back without re-parsing
        /// the poll question.
        word: String,
    },
    SendPollAnswer {
        chat_id: i64,
        poll_message_id: i32,
        poll_id: String,
        word: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyboardKind {
    JoinTeam,
}

impl SenderCommand {
    pub fn encode(&self) -> Result<Vec<u8>, ProtoError> {
        Ok(bson::to_vec(self)?)
    }

    pub fn decode(body: &[u8]) -> Result<Self, ProtoError> {
        Ok(bson::from_slice(body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_event_round_trips_through_bson() {
        let event = WorkerEvent::SlowPlayer {
            game_id: 1,
            user_id: 42,
            round: 3,
        };
        let bytes = event.encode().unwrap();
        let decoded = WorkerEvent::decode(&bytes).unwrap();
        match decoded {
            WorkerEvent::SlowPlayer {
                game_id,
                user_id,
                round,
            } => {
                assert_eq!(game_id, 1);
                assert_eq!(user_id, 42);
                assert_eq!(round, 3);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn sender_command_round_trips_through_bson() {
        let cmd = SenderCommand::SendPoll {
            chat_id: -100,
            question: "кот?".to_string(),
            options: vec!["Yes".to_string(), "No".to_string()],
            anonymous: true,
            period: 10,
            word: "кот".to_string(),
        };
        let bytes = cmd.encode().unwrap();
        let decoded = SenderCommand::decode(&bytes).unwrap();
        match decoded {
            SenderCommand::SendPoll { question, .. } => assert_eq!(question, "кот?"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
