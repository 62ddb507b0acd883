use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use citywords_broker::{run_consumer, Broker};
use citywords_dictionary::DictionaryClient;
use citywords_game::{DictionaryApi, Effect, GameEngine};
use citywords_proto::{
    WorkerInbound, QUEUE_WORKER, ROUTING_KEY_POLLER, ROUTING_KEY_SENDER, ROUTING_KEY_WORKER,
};
use citywords_store::{CityStore, GameSettings, GameSettingsStore, TeamStore, UserStore, WordStore};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "worker")]
#[command(about = "Consumes poller updates and worker self-events, drives the game engine")]
struct Cli {
    /// Number of concurrent consumer tasks.
    #[arg(long, default_value_t = 1)]
    concurrency: usize,
}

struct DictionaryAdapter(DictionaryClient);

#[async_trait]
impl DictionaryApi for DictionaryAdapter {
    async fn is_noun(&self, word: &str) -> Result<bool> {
        self.0.is_noun(word).await
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
    let cli = Cli::parse();

    let config = citywords_config::AppConfig::from_env()?;
    let pool = citywords_store::connect(&config.database_url).await?;

    let defaults = GameSettings {
        response_time: config.game_defaults.response_time_secs,
        anonymous_poll: config.game_defaults.anonymous_poll,
        poll_time: config.game_defaults.poll_time_secs,
        life: config.game_defaults.life,
    };

    let engine = Arc::new(GameEngine::new(
        Arc::new(UserStore::new(pool.clone())),
        Arc::new(citywords_store::GameSessionStore::new(pool.clone())),
        Arc::new(TeamStore::new(pool.clone())),
        Arc::new(CityStore::new(pool.clone())),
        Arc::new(WordStore::new(pool.clone())),
        Arc::new(GameSettingsStore::new(pool.clone(), defaults)),
        Arc::new(DictionaryAdapter(DictionaryClient::new(config.yandex_dict_token.clone()))),
    ));

    let broker = Arc::new(Broker::connect(&config.broker).await?);
    broker
        .declare_queue(QUEUE_WORKER, &[ROUTING_KEY_POLLER, ROUTING_KEY_WORKER])
        .await?;

    tracing::info!(concurrency = cli.concurrency, "worker starting");

    let mut tasks = Vec::with_capacity(cli.concurrency);
    for n in 0..cli.concurrency {
        let broker = broker.clone();
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            let consumer = match broker.consume(QUEUE_WORKER, &format!("worker-{n}")).await {
                Ok(c) => c,
                Err(err) => {
                    tracing::error!(error = %err, "failed to open worker consumer");
                    return;
                }
            };
            run_consumer(consumer, |routing_key, body| {
                let engine = engine.clone();
                let broker = broker.clone();
                async move { process_message(&engine, &broker, &routing_key, &body).await }
            })
            .await;
        }));
    }

    tokio::select! {
        _ = shutdown_signal() => tracing::info!("worker shutting down"),
        _ = futures::future::join_all(tasks) => {}
    }

    Ok(())
}

async fn process_message(
    engine: &GameEngine,
    broker: &Broker,
    routing_key: &str,
    body: &[u8],
) -> Result<()> {
    let inbound = match WorkerInbound::decode(routing_key, body) {
        Ok(inbound) => inbound,
        Err(err) => {
            tracing::warn!(error = %err, routing_key, "malformed message, dropping");
            return Ok(());
        }
    };
    let effects = match inbound {
        WorkerInbound::Update(update) => engine.handle_update(update).await?,
        WorkerInbound::Event(event) => engine.handle_event(event).await?,
    };

    for effect in effects {
        match effect {
            Effect::Send(command) => {
                broker.publish(ROUTING_KEY_SENDER, &command.encode()?, None).await?;
            }
            Effect::SelfEvent { event, delay_ms } => {
                broker.publish(ROUTING_KEY_WORKER, &event.encode()?, delay_ms).await?;
            }
        }
    }
    Ok(())
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
