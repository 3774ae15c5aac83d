pub mod contract;

pub use contract::{
    Contract, ContractField, ContractForm, ContractId, ContractStatus, ValidationError,
};
