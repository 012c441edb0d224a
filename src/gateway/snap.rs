use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{GatewayError, PaymentGateway, SessionRequest, SessionResponse};
use crate::config::{Config, GatewayEnvironment};

/// HTTP client for the hosted-checkout ("Snap") session API.
#[derive(Clone)]
pub struct SnapGateway {
    client: reqwest::Client,
    base_url: String,
    server_key: String,
    finish_url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_messages: Vec<String>,
}

impl SnapGateway {
    pub fn new(
        environment: GatewayEnvironment,
        server_key: &str,
        timeout: std::time::Duration,
        app_url: &str,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: environment.snap_base_url().to_string(),
            server_key: server_key.to_string(),
            finish_url: format!("{}/payments/finish", app_url.trim_end_matches('/')),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        Self::new(
            config.gateway_env,
            &config.gateway_server_key,
            config.gateway_timeout,
            &config.app_url,
        )
    }
}

impl PaymentGateway for SnapGateway {
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<SessionResponse, GatewayError> {
        let url = format!("{}/transactions", self.base_url);
        debug!(order_id = %request.order_id, "Creating gateway session");

        let body = json!({
            "transaction_details": {
                "order_id": request.order_id,
                "gross_amount": request.gross_amount,
            },
            "customer_details": {
                "first_name": request.customer.first_name,
                "email": request.customer.email,
                "phone": request.customer.phone,
            },
            "callbacks": { "finish": self.finish_url },
        });

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.server_key, Some(""))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.error_messages.join("; "))
                .unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<SessionResponse>()
            .await
            .map_err(|e| GatewayError::Transport(format!("Failed to parse session response: {e}")))
    }

    fn server_key(&self) -> &str {
        &self.server_key
    }
}
