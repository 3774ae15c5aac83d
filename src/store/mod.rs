pub mod contract_store;

pub use contract_store::ContractStore;
