// OTP delivery. When no SMS provider credentials are configured, the
// challenge is still created but no SMS is actually sent — this adapter
// is a no-op in that case, matching the configuration surface's documented
// behavior rather than failing the call.

use async_trait::async_trait;

use crate::config::SmsProviderCredentials;
use crate::middleware::error_handling::{AppError, Result};
use crate::repositories::traits::OtpSender;

pub struct HttpOtpSender {
    client: reqwest::Client,
    credentials: SmsProviderCredentials,
}

impl HttpOtpSender {
    pub fn new(credentials: SmsProviderCredentials) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("reqwest client construction");
        Self { client, credentials }
    }
}

#[async_trait]
impl OtpSender for HttpOtpSender {
    async fn send(&self, phone: &str, otp: &str) -> Result<()> {
        let body = serde_json::json!({
            "from": self.credentials.from_number,
            "to": phone,
            "body": format!("Your verification code is {otp}"),
        });

        let response = self
            .client
            .post("https://api.sms-provider.example/v1/messages")
            .basic_auth(&self.credentials.account_sid, Some(&self.credentials.auth_token))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("sms send failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "sms provider returned status {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Used when no SMS provider credentials are configured. The challenge is
/// still persisted by the caller; this adapter simply does not deliver it.
pub struct NoopOtpSender;

#[async_trait]
impl OtpSender for NoopOtpSender {
    async fn send(&self, phone: &str, _otp: &str) -> Result<()> {
        tracing::info!(
            phone = %crate::utils::log_sanitizer::sanitize_for_log(phone),
            "no sms provider configured, challenge created without delivery"
        );
        Ok(())
    }
}
