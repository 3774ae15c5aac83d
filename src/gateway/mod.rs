pub mod http;
pub mod wire;

use async_trait::async_trait;

use crate::models::{Contract, ContractId};

pub use http::HttpContractGateway;

/// Remote CRUD surface over the contract resource.
///
/// Every call resolves exactly once with either the payload or a
/// [`GatewayError`]. Implementations do no input validation; callers are
/// expected to have run [`Contract::validate`] first.
#[async_trait]
pub trait ContractGateway: Send + Sync {
    async fn create_contract(&self, contract: &Contract) -> Result<Contract, GatewayError>;

    async fn get_contract(&self, id: ContractId) -> Result<Contract, GatewayError>;

    async fn list_contracts(&self) -> Result<Vec<Contract>, GatewayError>;

    async fn update_contract(
        &self,
        id: ContractId,
        contract: &Contract,
    ) -> Result<Contract, GatewayError>;

    async fn delete_contract(&self, id: ContractId) -> Result<(), GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// No response was received (unreachable host, timeout, ...)
    #[error("{0}")]
    Transport(String),
    /// The server answered with a non-success status
    #[error("{message}")]
    Server { status: u16, message: String },
    #[error("Server response contained no data")]
    MissingPayload,
    #[error("Malformed server response: {0}")]
    Decode(String),
}
