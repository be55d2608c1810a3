use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::*;
use crate::document;

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// [`ConfigTransport`] over HTTP/JSON.
pub struct HttpTransport {
    base_url: String,
    client: Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: base_url.into(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Turn a non-2xx response into [`TransportError::Status`].
async fn check_status(resp: Response) -> Result<Response, TransportError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(TransportError::Status { status, body })
}

/// Interpret a save response. The backend answers `{"success": true}` on
/// success and `{"error": "..."}` with a 4xx/5xx status otherwise.
fn save_outcome(status: u16, body: &str) -> Result<(), TransportError> {
    let parsed: Option<SaveResponse> = serde_json::from_str(body).ok();
    let ok = (200..300).contains(&status);

    match parsed {
        Some(SaveResponse { success: true, .. }) if ok => Ok(()),
        Some(SaveResponse {
            error: Some(error), ..
        }) => Err(TransportError::Rejected(error)),
        Some(_) if ok => Err(TransportError::Rejected(
            "save was not acknowledged".to_string(),
        )),
        _ if ok => Err(TransportError::Format(document::FormatError::NotAnObject(
            "save response",
        ))),
        _ => Err(TransportError::Status {
            status,
            body: body.to_string(),
        }),
    }
}

#[async_trait]
impl ConfigTransport for HttpTransport {
    async fn load_config(&self) -> Result<ConfigDocument, TransportError> {
        let url = self.endpoint("config");
        debug!("GET {}", url);

        let resp = check_status(self.client.get(&url).send().await?).await?;
        let raw: Value = serde_json::from_str(&resp.text().await?)?;
        let doc = document::load(raw)?;

        info!(
            "Loaded configuration: {} destinations, {} rules",
            doc.destinations.len(),
            doc.rules.len()
        );
        Ok(doc)
    }

    async fn save_config(&self, doc: &ConfigDocument) -> Result<(), TransportError> {
        let url = self.endpoint("config");
        let body = doc.serialize();
        debug!("POST {}", url);

        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        save_outcome(status, &text)?;

        info!("Configuration saved");
        Ok(())
    }

    async fn notifications(
        &self,
        query: &NotificationQuery,
    ) -> Result<Vec<NotificationRecord>, TransportError> {
        let url = self.endpoint("notifications");
        let resp = self
            .client
            .get(&url)
            .query(&query.to_pairs())
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let page: NotificationsPage = serde_json::from_str(&resp.text().await?)?;
        debug!("Fetched {} notifications", page.notifications.len());
        Ok(page.notifications)
    }

    async fn logs(&self, level: Option<&str>) -> Result<Vec<LogRecord>, TransportError> {
        let url = self.endpoint("logs");
        let mut req = self.client.get(&url);
        if let Some(level) = level_param(level) {
            req = req.query(&[("level", level)]);
        }
        let resp = check_status(req.send().await?).await?;
        let page: LogsPage = serde_json::from_str(&resp.text().await?)?;
        debug!("Fetched {} log lines", page.logs.len());
        Ok(page.logs)
    }
}
