//! Thin HTTP wrapper over the Chorus control endpoints.

use anyhow::{anyhow, Context, Result};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use chorus_protocol::{routes, CommandBatch, Empty, ErrorResponse, VoiceCollection, VoiceUpdate};

/// Which voice property a relative adjustment targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Property {
    Rate,
    Pitch,
    Volume,
}

impl Property {
    pub fn route(self) -> &'static str {
        match self {
            Property::Rate => routes::VOICE_RATE,
            Property::Pitch => routes::VOICE_PITCH,
            Property::Volume => routes::VOICE_VOLUME,
        }
    }
}

pub struct ChorusClient {
    base: String,
    http: reqwest::Client,
}

impl ChorusClient {
    pub fn new(server: &str) -> Self {
        Self {
            base: base_url(server),
            http: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!("{} {}", method, url);
        self.http.request(method, url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.context("Failed to reach the server")?;
        read_response(response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    pub async fn command(&self, batch: &CommandBatch, force: bool) -> Result<()> {
        // The server only checks that `force` is present
        let path = if force {
            format!("{}?force", routes::AUDIO_COMMAND)
        } else {
            routes::AUDIO_COMMAND.to_string()
        };
        let _: Empty = self.post_json(&path, batch).await?;
        Ok(())
    }

    /// Plain GET action endpoint answering `{}`
    pub async fn action(&self, path: &str) -> Result<()> {
        let _: Empty = self.send(self.request(Method::GET, path)).await?;
        Ok(())
    }

    pub async fn voices(&self) -> Result<VoiceCollection> {
        self.send(self.request(Method::GET, routes::VOICES)).await
    }

    pub async fn update_voice(&self, index: i32, update: &VoiceUpdate) -> Result<()> {
        let _: Empty = self
            .post_json(&format!("{}?index={}", routes::VOICE, index), update)
            .await?;
        Ok(())
    }

    pub async fn adjust(&self, property: Property, diff: f64) -> Result<()> {
        let request = self
            .request(Method::POST, property.route())
            .query(&[("diff", diff.to_string())]);
        let _: Empty = self.send(request).await?;
        Ok(())
    }

    pub async fn set_default_voice(&self, index: i32) -> Result<()> {
        let request = self
            .request(Method::POST, routes::VOICE_DEFAULT)
            .query(&[("index", index.to_string())]);
        let _: Empty = self.send(request).await?;
        Ok(())
    }
}

/// Normalise `--server` into a base URL without a trailing slash.
pub fn base_url(server: &str) -> String {
    let server = server.trim().trim_end_matches('/');
    if server.starts_with("http://") || server.starts_with("https://") {
        server.to_string()
    } else {
        format!("http://{}", server)
    }
}

async fn read_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let bytes = response.bytes().await.context("Failed to read response body")?;

    if !status.is_success() {
        return Err(match serde_json::from_slice::<ErrorResponse>(&bytes) {
            Ok(envelope) => anyhow!("Server error ({}): {}", status, envelope.message),
            Err(_) => anyhow!("Server error ({}): {}", status, String::from_utf8_lossy(&bytes)),
        });
    }

    serde_json::from_slice(&bytes).context("Server answered with unexpected JSON")
}
