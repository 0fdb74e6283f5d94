use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::FutureProducer;
use rdkafka::producer::FutureRecord;
use rdkafka::util::Timeout;

#[cfg(test)]
use mockall::automock;

use crate::BusError;
use crate::Result;

/// Where classified chat events end up. The production implementation is
/// a Kafka producer; tests substitute a mock.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BusSink: Send + Sync {
    async fn publish(
        &self,
        key: &[u8],
        payload: &[u8],
    ) -> Result<()>;
}

pub struct KafkaSink {
    producer: FutureProducer,
    topic: String,
}

impl KafkaSink {
    /// `brokers` is the comma-separated bootstrap list.
    pub fn new(
        brokers: &str,
        topic: &str,
    ) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(BusError::Init)?;
        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }
}

#[async_trait]
impl BusSink for KafkaSink {
    async fn publish(
        &self,
        key: &[u8],
        payload: &[u8],
    ) -> Result<()> {
        let record = FutureRecord::to(&self.topic).key(key).payload(payload);
        self.producer
            .send(record, Timeout::After(Duration::from_secs(5)))
            .await
            .map_err(|(err, _record)| BusError::Delivery(err))?;
        Ok(())
    }
}
