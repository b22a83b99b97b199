use crate::auth::{AuthChallenge, Credentials, Token};
use crate::error::{CheckError, Result};
use crate::image::ImageReference;
use anyhow::Context;
use reqwest::{header, Client, Response};
use serde::Deserialize;
use std::error::Error as StdError;
use std::io;
use std::time::Duration;

const USER_AGENT: &str = "docker-newer-cli";

#[derive(Debug, Deserialize)]
struct TagList {
    #[allow(dead_code)]
    #[serde(default)]
    name: String,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Thin client for the registry v2 endpoints the checker talks to.
#[derive(Clone)]
pub struct RegistryClient {
    client: Client,
    scheme: &'static str,
}

impl RegistryClient {
    pub fn new(timeout: Duration, insecure: bool) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            scheme: "https",
        })
    }

    /// Talks to registries over `scheme` instead of `https`.
    #[cfg(test)]
    pub fn with_scheme(mut self, scheme: &'static str) -> Self {
        self.scheme = scheme;
        self
    }

    /// `GET /v2/` on the registry, used to tell whether it speaks the v2 API.
    pub async fn get_v2(&self, registry: &str) -> reqwest::Result<Response> {
        let url = format!("{}://{}/v2/", self.scheme, registry);
        self.client.get(&url).send().await
    }

    pub async fn get_tag_list(&self, image: &ImageReference, token: Option<&str>) -> Result<Response> {
        let url = self.tags_list_url(image);

        let mut request = self.client.get(&url);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        request
            .send()
            .await
            .map_err(|e| CheckError::network(format!("failed to get tags for {}", image), e))
    }

    /// Requests a token from the challenge realm, anonymously unless
    /// credentials are given.
    pub async fn get_token(
        &self,
        challenge: &AuthChallenge,
        credentials: Option<&Credentials>,
    ) -> Result<Response> {
        let mut request = self.client.get(&challenge.realm).query(&challenge.params);
        if let Some(credentials) = credentials {
            request = request.header(header::AUTHORIZATION, credentials.basic_header());
        }

        request
            .send()
            .await
            .map_err(|e| CheckError::network(format!("token request to {} failed", challenge.realm), e))
    }

    fn tags_list_url(&self, image: &ImageReference) -> String {
        format!(
            "{}://{}/v2/{}/tags/list",
            self.scheme,
            image.registry,
            image.repository()
        )
    }
}

pub async fn decode_tags(response: Response) -> Result<Vec<String>> {
    let list: TagList = response
        .json()
        .await
        .map_err(|e| CheckError::TagDecode(e.to_string()))?;
    Ok(list.tags.unwrap_or_default())
}

pub async fn decode_token(response: Response) -> Result<String> {
    let token: Token = response
        .json()
        .await
        .map_err(|e| CheckError::TokenDecode(e.to_string()))?;
    token.bearer().map(str::to_string)
}

/// Whether a transport error was caused by the server certificate failing
/// validation.
pub fn is_certificate_error(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(cause) = current {
        if is_invalid_certificate(cause) {
            return true;
        }
        current = cause.source();
    }
    false
}

fn is_invalid_certificate(err: &(dyn StdError + 'static)) -> bool {
    if let Some(tls) = err.downcast_ref::<rustls::Error>() {
        return matches!(tls, rustls::Error::InvalidCertificate(_));
    }
    // io::Error keeps its payload out of `source()`.
    err.downcast_ref::<io::Error>()
        .and_then(io::Error::get_ref)
        .map_or(false, |inner| is_certificate_error(inner))
}
