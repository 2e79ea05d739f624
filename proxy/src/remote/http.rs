//! Gateway client: speaks the JSON-over-HTTP instrument protocol.

use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use adcproxy_common::{
    AttributeReading, InfoMap, NamesRequest, PropertyMap,
    routes::{ATTRIBUTE_INFO, ATTRIBUTE_PROPERTIES, ATTRIBUTES, DEVICES},
};

use super::{RemoteError, RemoteSource};

/// [`RemoteSource`] backed by an instrument gateway reachable over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    gateway: Url,
    device: String,
}

impl HttpSource {
    /// Create a client for `device` behind the gateway at `gateway`.
    ///
    /// # Errors
    ///
    /// Returns an error if `gateway` is not a valid base URL.
    pub fn new(gateway: &str, device: &str) -> Result<Self, RemoteError> {
        let gateway = Url::parse(gateway)
            .map_err(|e| RemoteError::Transport(format!("invalid gateway url '{gateway}': {e}")))?;
        if gateway.cannot_be_a_base() {
            return Err(RemoteError::Transport(format!(
                "gateway url '{gateway}' cannot be a base"
            )));
        }
        Ok(Self {
            client: Client::new(),
            gateway,
            device: device.to_string(),
        })
    }

    /// The device path this client reads from.
    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Build `{gateway}/devices/{device}/{tail...}` with every segment percent-encoded.
    fn url(&self, tail: &[&str]) -> Url {
        let mut url = self.gateway.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(DEVICES).push(&self.device);
            segments.extend(tail);
        }
        url
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, RemoteError> {
        debug!(%url, "GET");
        let resp = self.client.get(url).send().await.map_err(transport)?;
        decode(resp).await
    }

    async fn post<T: DeserializeOwned>(&self, url: Url, names: &[String]) -> Result<T, RemoteError> {
        debug!(%url, count = names.len(), "POST");
        let body = NamesRequest {
            names: names.to_vec(),
        };
        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        decode(resp).await
    }
}

fn transport(e: reqwest::Error) -> RemoteError {
    RemoteError::Transport(e.to_string())
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, RemoteError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        });
    }
    resp.json::<T>()
        .await
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

impl RemoteSource for HttpSource {
    async fn list_attribute_names(&self) -> Result<Vec<String>, RemoteError> {
        self.get(self.url(&[ATTRIBUTES])).await
    }

    async fn attribute_properties(&self, names: &[String]) -> Result<PropertyMap, RemoteError> {
        self.post(self.url(&[ATTRIBUTE_PROPERTIES]), names).await
    }

    async fn read_attribute(&self, name: &str) -> Result<AttributeReading, RemoteError> {
        self.get(self.url(&[ATTRIBUTES, name])).await
    }

    async fn attribute_metadata(&self, names: &[String]) -> Result<InfoMap, RemoteError> {
        self.post(self.url(&[ATTRIBUTE_INFO]), names).await
    }
}
