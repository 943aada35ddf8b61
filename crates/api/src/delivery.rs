use async_trait::async_trait;

// Outbound channel for reset codes. The HTTP surface never reports
// delivery failures to the caller, so implementations are free to be
// slow or flaky; failures are logged and the request still succeeds.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(&self, destination: &str, message: &str) -> anyhow::Result<()>;
}

// Stand-in for a real mail or SMS gateway: writes the dispatch to the log.
pub struct LoggedDelivery;

#[async_trait]
impl DeliveryChannel for LoggedDelivery {
    async fn deliver(&self, destination: &str, message: &str) -> anyhow::Result<()> {
        tracing::info!("delivering to {destination}: {message}");
        Ok(())
    }
}
