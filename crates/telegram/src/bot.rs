//! A thin wrapper around `teloxide::Bot`'s typed request builders. No
//! `Dispatcher`/`dptree` pipeline: the three-process broker topology (poller
//! / worker / sender) plays the dispatcher's role instead, so each process
//! calls the Bot API methods it needs directly.

use anyhow::Result;
use teloxide::payloads::{SendMessageSetters, SendPollSetters};
use teloxide::prelude::Requester;
use teloxide::types::{ChatId, ForceReply, InlineKeyboardMarkup, MessageId, ReplyMarkup, Update};
use teloxide::Bot;

pub struct TelegramClient {
    pub bot: Bot,
}

impl TelegramClient {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self { bot: Bot::new(bot_token) }
    }

    /// Long-polls for the next batch of updates starting at `offset`,
    /// waiting up to `timeout` seconds for at least one to arrive.
    pub async fn get_updates(&self, offset: i32, timeout: u32) -> Result<Vec<Update>> {
        let updates = self.bot.get_updates().offset(offset).timeout(timeout).await?;
        Ok(updates)
    }

    pub async fn send_message(&self, chat_id: i64, text: &str, force_reply: bool) -> Result<MessageId> {
        let request = self.bot.send_message(ChatId(chat_id), text);
        let message = if force_reply {
            request.reply_markup(ReplyMarkup::ForceReply(ForceReply::new())).await?
        } else {
            request.await?
        };
        Ok(message.id)
    }

    pub async fn send_message_with_keyboard(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: InlineKeyboardMarkup,
    ) -> Result<MessageId> {
        let message = self.bot.send_message(ChatId(chat_id), text).reply_markup(keyboard).await?;
        Ok(message.id)
    }

    /// Clears a message's inline keyboard by replacing it with an empty one.
    pub async fn remove_inline_keyboard(&self, chat_id: i64, message_id: MessageId) -> Result<()> {
        self.bot
            .edit_message_reply_markup(ChatId(chat_id), message_id)
            .reply_markup(InlineKeyboardMarkup::default())
            .await?;
        Ok(())
    }

    pub async fn answer_callback_query(&self, callback_id: &str, text: &str) -> Result<()> {
        self.bot.answer_callback_query(callback_id).text(text).await?;
        Ok(())
    }

    /// Returns the sent message id (to later stop the poll) and the
    /// Telegram-assigned poll id (to bind the poll to a game session).
    pub async fn send_poll(
        &self,
        chat_id: i64,
        question: &str,
        options: Vec<String>,
        anonymous: bool,
        period_secs: u32,
    ) -> Result<(MessageId, String)> {
        let message = self
            .bot
            .send_poll(ChatId(chat_id), question, options)
            .is_anonymous(anonymous)
            .open_period(period_secs)
            .await?;
        let poll_id = message
            .poll()
            .ok_or_else(|| anyhow::anyhow!("sendPoll response carried no poll"))?
            .id
            .clone();
        Ok((message.id, poll_id))
    }

    /// Stops the poll and returns its final per-option vote counts.
    pub async fn stop_poll(&self, chat_id: i64, message_id: MessageId) -> Result<teloxide::types::Poll> {
        let poll = self.bot.stop_poll(ChatId(chat_id), message_id).await?;
        Ok(poll)
    }
}
