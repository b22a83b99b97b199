//! Anonymous tag resolution against a registry v2 API.
//!
//! ```text
//! anonymous fetch ─200─▶ resolved
//!        │401
//!        ▼
//! parse challenge ─▶ anonymous token ─▶ bearer fetch ─200─▶ resolved
//!                                             │401
//!                                             ▼
//!                                     pending authorization
//! ```
//!
//! Anything else along the way is an error for that image only.

use crate::auth::AuthChallenge;
use crate::capability::RegistryCapabilities;
use crate::error::{CheckError, Result};
use crate::image::ImageReference;
use crate::registry::{decode_tags, decode_token, RegistryClient};
use crate::store::ClassificationStore;
use reqwest::{header, Response, StatusCode};
use tracing::{debug, warn};

/// Terminal state of resolving one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(Vec<String>),
    /// Even an anonymous pull token was refused; credentials are required.
    PendingAuth(AuthChallenge),
}

pub struct TagResolver {
    client: RegistryClient,
    capabilities: RegistryCapabilities,
}

impl TagResolver {
    pub fn new(client: RegistryClient, capabilities: RegistryCapabilities) -> Self {
        Self {
            client,
            capabilities,
        }
    }

    pub fn client(&self) -> &RegistryClient {
        &self.client
    }

    pub async fn resolve(&mut self, image: &ImageReference) -> Result<Resolution> {
        self.capabilities
            .ensure_v2(&self.client, &image.registry)
            .await?;

        let response = self.client.get_tag_list(image, None).await?;
        match response.status() {
            StatusCode::OK => Ok(Resolution::Resolved(decode_tags(response).await?)),
            StatusCode::UNAUTHORIZED => {
                let challenge = challenge_from(&response)?;
                debug!(image = %image, realm = %challenge.realm, "registry requested a token");
                self.fetch_with_anonymous_token(image, challenge).await
            }
            status => Err(CheckError::UnexpectedStatusCode(status)),
        }
    }

    async fn fetch_with_anonymous_token(
        &self,
        image: &ImageReference,
        challenge: AuthChallenge,
    ) -> Result<Resolution> {
        let token = decode_token(self.client.get_token(&challenge, None).await?).await?;

        let response = self.client.get_tag_list(image, Some(&token)).await?;
        match response.status() {
            StatusCode::OK => Ok(Resolution::Resolved(decode_tags(response).await?)),
            StatusCode::UNAUTHORIZED => Ok(Resolution::PendingAuth(challenge)),
            status => Err(CheckError::UnexpectedStatusCode(status)),
        }
    }

    /// Resolves `image` and records the outcome in `store`.
    ///
    /// Errors are logged here and leave the store untouched; they are also
    /// returned so the caller can print the skip reason.
    pub async fn classify(
        &mut self,
        image: ImageReference,
        store: &mut ClassificationStore,
    ) -> Result<()> {
        match self.resolve(&image).await {
            Ok(Resolution::Resolved(tags)) => {
                debug!(image = %image, count = tags.len(), "resolved tags");
                store.add_resolved(image, tags);
                Ok(())
            }
            Ok(Resolution::PendingAuth(challenge)) => {
                debug!(image = %image, "tags require credentials");
                store.add_pending(image, challenge);
                Ok(())
            }
            Err(err) => {
                warn!(image = %image, error = %err, "failed to resolve tags");
                Err(err)
            }
        }
    }
}

fn challenge_from(response: &Response) -> Result<AuthChallenge> {
    let header = response
        .headers()
        .get(header::WWW_AUTHENTICATE)
        .map(|value| value.to_str())
        .transpose()
        .map_err(|e| CheckError::MalformedChallenge(e.to_string()))?
        .unwrap_or_default();

    AuthChallenge::parse(header)
}
