use anyhow::Result;
use async_trait::async_trait;
use reqwest::{header, multipart, Client};
use std::time::Duration;

use super::types::*;
use super::ChatApi;

/// Chat platform REST client (Webex-style messages API)
pub struct ChatClient {
    base_url: String,
    token: String,
    client: Client,
}

impl ChatClient {
    pub fn new(url: String, token: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(anyhow::anyhow!("Chat API error {} ({}): {}", status, what, body))
    }
}

#[async_trait]
impl ChatApi for ChatClient {
    async fn get_message(&self, id: &str) -> Result<ChatMessage> {
        let resp = self
            .client
            .get(self.api_url(&format!("/messages/{}", id)))
            .header(header::AUTHORIZATION, self.auth_header())
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        Ok(Self::check(resp, "get message").await?.json().await?)
    }

    async fn fetch_attachment(&self, url: &str) -> Result<Attachment> {
        let resp = self
            .client
            .get(url)
            .header(header::AUTHORIZATION, self.auth_header())
            .send()
            .await?;
        let resp = Self::check(resp, "fetch attachment").await?;

        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let filename = resp
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_filename);
        let bytes = resp.bytes().await?.to_vec();

        Ok(Attachment {
            content_type,
            filename,
            bytes,
        })
    }

    async fn send_text(&self, room_id: &str, text: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.api_url("/messages"))
            .header(header::AUTHORIZATION, self.auth_header())
            .json(&MessageCreate { room_id, text })
            .send()
            .await?;

        Self::check(resp, "send message").await?;
        Ok(())
    }

    async fn send_file(&self, room_id: &str, text: &str, file: FileUpload) -> Result<()> {
        let part = multipart::Part::bytes(file.bytes)
            .file_name(file.filename)
            .mime_str(&file.content_type)?;
        let form = multipart::Form::new()
            .text("roomId", room_id.to_string())
            .text("text", text.to_string())
            .part("files", part);

        let resp = self
            .client
            .post(self.api_url("/messages"))
            .header(header::AUTHORIZATION, self.auth_header())
            .multipart(form)
            .send()
            .await?;

        Self::check(resp, "post attachment").await?;
        Ok(())
    }
}

/// Filename from a `Content-Disposition` header value
fn disposition_filename(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}
