use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::wire::{ApiResponse, ContractDto};
use super::{ContractGateway, GatewayError};
use crate::config::Config;
use crate::models::{Contract, ContractId};

/// [`ContractGateway`] backed by the server's REST API
#[derive(Clone)]
pub struct HttpContractGateway {
    client: Client,
    base_url: String,
}

impl HttpContractGateway {
    pub fn new(config: &Config) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> (Uuid, RequestBuilder) {
        let request_id = Uuid::new_v4();
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%request_id, %method, %url, "Sending contract request");

        let builder = self
            .client
            .request(method, url)
            .header("X-Request-Id", request_id.to_string());
        (request_id, builder)
    }

    async fn execute(&self, request_id: Uuid, builder: RequestBuilder) -> Result<Response, GatewayError> {
        let response = builder.send().await.map_err(|e| {
            tracing::warn!(%request_id, error = %e, "Contract request failed in transport");
            GatewayError::Transport(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = server_message(status, &body);
        tracing::warn!(%request_id, status = status.as_u16(), %message, "Server rejected contract request");

        Err(GatewayError::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn envelope<T: DeserializeOwned>(
        &self,
        request_id: Uuid,
        builder: RequestBuilder,
    ) -> Result<ApiResponse<T>, GatewayError> {
        let response = self.execute(request_id, builder).await?;
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if body.trim().is_empty() {
            return Ok(ApiResponse {
                data: None,
                message: None,
                success: None,
            });
        }

        serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn single(&self, request_id: Uuid, builder: RequestBuilder) -> Result<Contract, GatewayError> {
        let envelope = self.envelope::<ContractDto>(request_id, builder).await?;
        let dto = envelope.data.ok_or(GatewayError::MissingPayload)?;
        Contract::try_from(dto).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

/// Prefers the envelope's `message`, falling back to the HTTP reason phrase.
fn server_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ApiResponse<serde_json::Value>>(body)
        .ok()
        .and_then(|envelope| envelope.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string())
        })
}

#[async_trait]
impl ContractGateway for HttpContractGateway {
    async fn create_contract(&self, contract: &Contract) -> Result<Contract, GatewayError> {
        let (request_id, builder) = self.request(Method::POST, "contracts");
        self.single(request_id, builder.json(&ContractDto::from(contract)))
            .await
    }

    async fn get_contract(&self, id: ContractId) -> Result<Contract, GatewayError> {
        let (request_id, builder) = self.request(Method::GET, &format!("contracts/{}", id));
        self.single(request_id, builder).await
    }

    async fn list_contracts(&self) -> Result<Vec<Contract>, GatewayError> {
        let (request_id, builder) = self.request(Method::GET, "contracts");
        let envelope = self.envelope::<Vec<ContractDto>>(request_id, builder).await?;

        let contracts = envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(Contract::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        for contract in &contracts {
            tracing::trace!(
                contract_id = ?contract.id,
                title = %contract.title,
                finalized = contract.finalized,
                "Contract loaded"
            );
        }

        Ok(contracts)
    }

    async fn update_contract(
        &self,
        id: ContractId,
        contract: &Contract,
    ) -> Result<Contract, GatewayError> {
        let (request_id, builder) = self.request(Method::PUT, &format!("contracts/{}", id));
        self.single(request_id, builder.json(&ContractDto::from(contract)))
            .await
    }

    async fn delete_contract(&self, id: ContractId) -> Result<(), GatewayError> {
        let (request_id, builder) = self.request(Method::DELETE, &format!("contracts/{}", id));
        self.execute(request_id, builder).await?;
        Ok(())
    }
}
