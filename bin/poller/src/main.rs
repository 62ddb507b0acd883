use anyhow::Result;
use citywords_broker::Broker;
use citywords_proto::{encode_update, ROUTING_KEY_POLLER};
use citywords_telegram::TelegramClient;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LONG_POLL_TIMEOUT_SECS: u32 = 20;

#[derive(Parser)]
#[command(name = "poller")]
#[command(about = "Long-polls the Telegram Bot API and republishes updates onto the broker")]
struct Cli {}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
    let _cli = Cli::parse();

    let config = citywords_config::AppConfig::from_env()?;
    let telegram = TelegramClient::new(config.bot_token.clone());
    let broker = Broker::connect(&config.broker).await?;

    tracing::info!("poller starting");

    let mut offset = 0i32;
    let mut shutdown = Box::pin(shutdown_signal());

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("poller shutting down");
                break;
            }
            updates = telegram.get_updates(offset, LONG_POLL_TIMEOUT_SECS) => {
                let updates = match updates {
                    Ok(updates) => updates,
                    Err(err) => {
                        tracing::warn!(error = %err, "get_updates failed, retrying");
                        tokio::time::sleep(std::time::Duration::from_secs(10)).await;
                        continue;
                    }
                };
                for update in updates {
                    offset = update.id.0 as i32 + 1;
                    let body = encode_update(&update)?;
                    broker.publish(ROUTING_KEY_POLLER, &body, None).await?;
                }
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
