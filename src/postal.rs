//! Postal-code directory lookup used to prefill checkout addresses.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::{error::CollaboratorFailure, models::PostalCode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AddressHint {
    pub street: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
}

#[async_trait]
pub trait PostalDirectory: Send + Sync {
    /// `Ok(None)` when the directory does not know the code.
    async fn lookup(&self, postal_code: &PostalCode)
    -> Result<Option<AddressHint>, CollaboratorFailure>;
}

/// Client for ViaCEP-compatible directories (`{base}/{cep}/json/`).
#[derive(Debug, Clone)]
pub struct ViaCepDirectory {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ViaCepResponse {
    #[serde(default)]
    logradouro: String,
    #[serde(default)]
    bairro: String,
    #[serde(default)]
    localidade: String,
    #[serde(default)]
    uf: String,
    #[serde(default)]
    erro: Option<Value>,
}

impl ViaCepResponse {
    fn not_found(&self) -> bool {
        match &self.erro {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(flag)) => flag == "true",
            _ => false,
        }
    }
}

impl ViaCepDirectory {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to construct reqwest client for postal directory")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PostalDirectory for ViaCepDirectory {
    async fn lookup(
        &self,
        postal_code: &PostalCode,
    ) -> Result<Option<AddressHint>, CollaboratorFailure> {
        let url = format!("{}/{}/json/", self.base_url, postal_code);
        let response = self.client.get(&url).send().await.map_err(lookup_failure)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, postal_code = %postal_code, "postal directory returned an error status");
            return Err(CollaboratorFailure::PostalLookup(format!(
                "directory answered {status}"
            )));
        }

        let body: ViaCepResponse = response.json().await.map_err(lookup_failure)?;
        if body.not_found() {
            tracing::debug!(postal_code = %postal_code, "postal code not in directory");
            return Ok(None);
        }

        Ok(Some(AddressHint {
            street: body.logradouro,
            neighborhood: body.bairro,
            city: body.localidade,
            state: body.uf,
        }))
    }
}

fn lookup_failure(err: reqwest::Error) -> CollaboratorFailure {
    if err.is_timeout() {
        CollaboratorFailure::PostalLookupTimeout
    } else {
        CollaboratorFailure::PostalLookup(err.to_string())
    }
}
