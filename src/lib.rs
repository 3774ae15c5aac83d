//! Contract state and synchronization client for the PactFlow contract server.

pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod notification;
pub mod preferences;
pub mod presentation;
pub mod store;

#[cfg(test)]
mod test;

pub use config::Config;
pub use error::{AppError, Result};
pub use gateway::{ContractGateway, GatewayError, HttpContractGateway};
pub use models::{Contract, ContractForm, ContractId, ContractStatus};
pub use notification::NotificationDispatcher;
pub use store::ContractStore;
