use std::time::Duration;

use futures::future::BoxFuture;
use serde::Deserialize;

use super::{GatewayError, GatewayStatus, PaymentGatewayClient};

/// Production gateway client over the gateway's transaction-status API.
pub struct HttpGatewayClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

impl HttpGatewayClient {
    /// Build a client with a bounded request timeout. A timeout surfaces as
    /// [`GatewayError::Timeout`], which the pipeline treats as transient.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_status(&self, transaction_ref: &str) -> Result<GatewayStatus, GatewayError> {
        let url = format!("{}/v1/transactions/{}", self.base_url, transaction_ref);

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Http(e)
            }
        })?;

        let response = response.error_for_status()?;
        let body: StatusResponse = response.json().await?;

        match body.status.as_str() {
            "pending" => Ok(GatewayStatus::Pending),
            "approved" => Ok(GatewayStatus::Approved),
            "rejected" => Ok(GatewayStatus::Rejected),
            other => Err(GatewayError::InvalidResponse(format!(
                "unknown status '{}'",
                other
            ))),
        }
    }
}

impl PaymentGatewayClient for HttpGatewayClient {
    fn status<'a>(
        &'a self,
        transaction_ref: &'a str,
    ) -> BoxFuture<'a, Result<GatewayStatus, GatewayError>> {
        Box::pin(self.fetch_status(transaction_ref))
    }
}
