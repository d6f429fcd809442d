//! Forwards acknowledged samples to the backend, once each

use super::json::UplinkRecord;
use super::traits::{HttpClient, UplinkError};
use log::{error, info};

pub struct UplinkReporter<C> {
    client: C,
    url: &'static str,
}

impl<C: HttpClient> UplinkReporter<C> {
    pub fn new(client: C, url: &'static str) -> Self {
        Self { client, url }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// POST one record; failures are logged and returned, never retried
    pub async fn report(&mut self, record: &UplinkRecord) -> Result<u16, UplinkError> {
        if !self.client.is_connected() {
            error!("Error: WiFi not connected, cannot send data to API");
            return Err(UplinkError::NotConnected);
        }

        let body = record.to_json()?;
        info!("JSON to send: {}", body);

        match self.client.post_json(self.url, &body).await {
            Ok(status) => {
                info!("HTTP POST OK, code: {}", status);
                Ok(status)
            }
            Err(e) => {
                error!("HTTP POST error: {:?}", e);
                Err(e)
            }
        }
    }
}
