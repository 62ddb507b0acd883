use anyhow::Result;
use citywords_broker::{run_consumer, Broker};
use citywords_proto::{KeyboardKind, PollOutcome, SenderCommand, WorkerEvent, QUEUE_SENDER, ROUTING_KEY_SENDER, ROUTING_KEY_WORKER};
use citywords_telegram::TelegramClient;
use clap::Parser;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sender")]
#[command(about = "Drives the Telegram Bot API from SenderCommands; stateless and horizontally scalable")]
struct Cli {
    /// Number of concurrent consumer tasks.
    #[arg(long, default_value_t = 1)]
    concurrency: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
    let cli = Cli::parse();

    let config = citywords_config::AppConfig::from_env()?;
    let telegram = std::sync::Arc::new(TelegramClient::new(config.bot_token.clone()));
    let broker = std::sync::Arc::new(Broker::connect(&config.broker).await?);
    broker.declare_queue(QUEUE_SENDER, &[ROUTING_KEY_SENDER]).await?;

    tracing::info!(concurrency = cli.concurrency, "sender starting");

    let mut tasks = Vec::with_capacity(cli.concurrency);
    for n in 0..cli.concurrency {
        let broker = broker.clone();
        let telegram = telegram.clone();
        tasks.push(tokio::spawn(async move {
            let consumer = match broker.consume(QUEUE_SENDER, &format!("sender-{n}")).await {
                Ok(c) => c,
                Err(err) => {
                    tracing::error!(error = %err, "failed to open sender consumer");
                    return;
                }
            };
            run_consumer(consumer, |_routing_key, body| {
                let broker = broker.clone();
                let telegram = telegram.clone();
                async move { process_command(&telegram, &broker, &body).await }
            })
            .await;
        }));
    }

    tokio::select! {
        _ = shutdown_signal() => tracing::info!("sender shutting down"),
        _ = futures::future::join_all(tasks) => {}
    }

    Ok(())
}

async fn process_command(telegram: &TelegramClient, broker: &Broker, body: &[u8]) -> Result<()> {
    let command = match SenderCommand::decode(body) {
        Ok(command) => command,
        Err(err) => {
            tracing::warn!(error = %err, "malformed command, dropping");
            return Ok(());
        }
    };
    match command {
        SenderCommand::Message { chat_id, text, force_reply } => {
            telegram.send_message(chat_id, &text, force_reply).await?;
        }
        SenderCommand::MessageKeyboard { chat_id, text, keyboard, live_time } => {
            let markup = build_keyboard(keyboard);
            let message_id = telegram.send_message_with_keyboard(chat_id, &text, markup).await?;
            if live_time > 0 {
                let event = SenderCommand::MessageInlineRemoveKeyboard {
                    chat_id,
                    keyboard_message_id: message_id.0,
                };
                broker
                    .publish(ROUTING_KEY_SENDER, &event.encode()?, Some(live_time * 1000))
                    .await?;
            }
        }
        SenderCommand::MessageInlineRemoveKeyboard { chat_id, keyboard_message_id } => {
            telegram.remove_inline_keyboard(chat_id, MessageId(keyboard_message_id)).await?;
            let event = WorkerEvent::PickLeader { chat_id };
            broker.publish(ROUTING_KEY_WORKER, &event.encode()?, None).await?;
        }
        SenderCommand::CallbackAlert { callback_id, text } => {
            telegram.answer_callback_query(&callback_id, &text).await?;
        }
        SenderCommand::SendPoll { chat_id, question, options, anonymous, period, word } => {
            let (message_id, poll_id) = telegram.send_poll(chat_id, &question, options, anonymous, period).await?;

            let poll_id_event = WorkerEvent::PollId { poll_id: poll_id.clone(), chat_id };
            broker.publish(ROUTING_KEY_WORKER, &poll_id_event.encode()?, None).await?;

            let close_command = SenderCommand::SendPollAnswer {
                chat_id,
                poll_message_id: message_id.0,
                poll_id,
                word,
            };
            let delay_ms = (period as u64 + 2) * 1000;
            broker
                .publish(ROUTING_KEY_SENDER, &close_command.encode()?, Some(delay_ms))
                .await?;
        }
        SenderCommand::SendPollAnswer { chat_id, poll_message_id, poll_id, word } => {
            let poll = telegram.stop_poll(chat_id, MessageId(poll_message_id)).await?;
            let yes_votes = poll.options.first().map(|o| o.voter_count).unwrap_or(0);
            let no_votes = poll.options.get(1).map(|o| o.voter_count).unwrap_or(0);
            let poll_result = if yes_votes > no_votes { PollOutcome::Yes } else { PollOutcome::No };

            let event = WorkerEvent::PollResult { chat_id, poll_id, poll_result, word };
            broker.publish(ROUTING_KEY_WORKER, &event.encode()?, None).await?;
        }
    }
    Ok(())
}

fn build_keyboard(kind: KeyboardKind) -> InlineKeyboardMarkup {
    match kind {
        KeyboardKind::JoinTeam => {
            InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback("Я в деле", "/yes")]])
        }
    }
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    let mut sighup = signal(SignalKind::hangup()).expect("install SIGHUP handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
        _ = sighup.recv() => {}
    }
}
