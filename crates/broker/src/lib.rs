//! Thin wrapper over a single AMQP connection carrying the delayed-message
//! exchange all three processes share: one durable `x-delayed-message`
//! exchange, bound by routing key to a durable queue per consumer.

use std::time::Duration;

use futures::StreamExt;
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
        ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    types::{AMQPValue, FieldTable, LongLongInt, ShortString},
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind,
};
use thiserror::Error;
use tracing::{error, info, warn};

pub const EXCHANGE_NAME: &str = "auth-delayed";

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),
}

pub type BrokerResult<T> = Result<T, BrokerError>;

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
}

impl BrokerConfig {
    pub fn amqp_url(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.vhost
        )
    }
}

/// A connected broker handle. Reconnection is the caller's responsibility:
/// `Broker::connect` retries indefinitely on the initial connect, matching
/// the behaviour of the rest of the pipeline on a cold broker.
pub struct Broker {
    _connection: Connection,
    channel: Channel,
}

impl Broker {
    pub async fn connect(config: &BrokerConfig) -> BrokerResult<Self> {
        let url = config.amqp_url();
        loop {
            match Connection::connect(&url, ConnectionProperties::default()).await {
                Ok(connection) => {
                    let channel = connection.create_channel().await?;
                    channel
                        .exchange_declare(
                            EXCHANGE_NAME,
                            ExchangeKind::Custom("x-delayed-message".to_string()),
                            ExchangeDeclareOptions {
                                durable: true,
                                ..Default::default()
                            },
                            delayed_exchange_args(),
                        )
                        .await?;
                    info!("connected to broker at {}:{}", config.host, config.port);
                    return Ok(Self {
                        _connection: connection,
                        channel,
                    });
                }
                Err(err) => {
                    error!("broker connect failed, retrying in 10s: {err}");
                    tokio::time::sleep(Duration::from_secs(10)).await;
                }
            }
        }
    }

    /// Declares a durable queue bound to `routing_keys` on the delayed exchange.
    pub async fn declare_queue(&self, queue_name: &str, routing_keys: &[&str]) -> BrokerResult<()> {
        self.channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        for key in routing_keys {
            self.channel
                .queue_bind(
                    queue_name,
                    EXCHANGE_NAME,
                    key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await?;
        }
        Ok(())
    }

    /// Publishes a persistent message, optionally deferred by `delay_ms`.
    pub async fn publish(
        &self,
        routing_key: &str,
        payload: &[u8],
        delay_ms: Option<u64>,
    ) -> BrokerResult<()> {
        let mut headers = FieldTable::default();
        if let Some(delay) = delay_ms {
            headers.insert(
                ShortString::from("x-delay"),
                AMQPValue::LongLongInt(delay as LongLongInt),
            );
        }
        let properties = BasicProperties::default()
            .with_delivery_mode(2) // persistent
            .with_headers(headers);

        self.channel
            .basic_publish(
                EXCHANGE_NAME,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await?
            .await?;
        Ok(())
    }

    /// Opens a prefetch=1 consumer on `queue_name`. The caller pulls
    /// deliveries from the returned stream and must ack explicitly after
    /// its side effects have completed.
    pub async fn consume(&self, queue_name: &str, consumer_tag: &str) -> BrokerResult<Consumer> {
        self.channel
            .basic_qos(1, BasicQosOptions::default())
            .await?;
        let consumer = self
            .channel
            .basic_consume(
                queue_name,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(consumer)
    }
}

fn delayed_exchange_args() -> FieldTable {
    let mut args = FieldTable::default();
    args.insert(
        ShortString::from("x-delayed-type"),
        AMQPValue::LongString("direct".into()),
    );
    args
}

/// Runs `handler` over every delivery from `consumer`, acking only after
/// `handler` returns `Ok`. A handler error leaves the message unacked so the
/// broker redelivers it; handlers must therefore be idempotent.
pub async fn run_consumer<F, Fut>(mut consumer: Consumer, mut handler: F)
where
    F: FnMut(String, Vec<u8>) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<()>>,
{
    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(d) => d,
            Err(err) => {
                warn!("broker delivery error: {err}");
                continue;
            }
        };
        let routing_key = delivery.routing_key.to_string();
        let data = delivery.data.clone();
        match handler(routing_key, data).await {
            Ok(()) => {
                if let Err(err) = delivery.ack(BasicAckOptions::default()).await {
                    warn!("failed to ack delivery: {err}");
                }
            }
            Err(err) => {
                error!("handler failed, leaving message for redelivery: {err}");
            }
        }
    }
}
