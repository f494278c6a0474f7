use async_trait::async_trait;
use tracing::{debug, info};

/// Outbound mail trigger contract. The real SMTP transport lives outside
/// this service; handlers only depend on this trait.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp(&self, to: &str, name: &str, otp: &str) -> anyhow::Result<()>;
}

/// Logs the trigger instead of delivering anything.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_otp(&self, to: &str, name: &str, otp: &str) -> anyhow::Result<()> {
        info!(%to, %name, "password reset OTP issued");
        debug!(%otp, "otp code");
        Ok(())
    }
}
