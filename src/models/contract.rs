use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

/// Server-assigned contract identifier
pub type ContractId = i64;

/// Date format used for contract start and end dates, on the wire and in forms
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Lifecycle status derived from the finalized flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractStatus {
    /// Still editable
    Draft,
    /// Locked by convention, the server enforces it
    Finalized,
}

impl ContractStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ContractStatus::Draft => "DRAFT",
            ContractStatus::Finalized => "FINALIZED",
        }
    }
}

/// A business contract as the client knows it.
///
/// `id` stays `None` until the server has confirmed the first create. Amount
/// positivity is a submission rule (see [`Contract::validate`]), not an
/// invariant of the type.
#[derive(Debug, Clone, PartialEq)]
pub struct Contract {
    pub id: Option<ContractId>,
    pub title: String,
    pub amount: Decimal,
    pub workflow_id: Option<i64>,
    pub contract_type: String,
    pub description: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub template: Option<String>,
    pub finalized: bool,
    pub version: u32,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Contract {
    /// A fresh draft at version 1, stamped with the current time.
    pub fn new_draft(title: impl Into<String>, amount: Decimal) -> Self {
        Self {
            id: None,
            title: title.into(),
            amount,
            workflow_id: None,
            contract_type: String::new(),
            description: String::new(),
            start_date: None,
            end_date: None,
            template: None,
            finalized: false,
            version: 1,
            timestamp: Some(now_millis()),
        }
    }

    pub fn status(&self) -> ContractStatus {
        if self.finalized {
            ContractStatus::Finalized
        } else {
            ContractStatus::Draft
        }
    }

    pub fn is_draft(&self) -> bool {
        self.status() == ContractStatus::Draft
    }

    /// Checks the rules a contract must satisfy before it is sent to the server.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::new(ContractField::Title, "Title is required"));
        }

        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::new(
                ContractField::Amount,
                "Amount must be greater than 0",
            ));
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(ValidationError::new(
                    ContractField::EndDate,
                    "End date must not be before start date",
                ));
            }
        }

        Ok(())
    }

    /// Case-insensitive substring match on title, description and contract type.
    /// `needle` must already be lowercased.
    pub(crate) fn matches_lowercase(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
            || self.contract_type.to_lowercase().contains(needle)
    }
}

/// Current time truncated to milliseconds, the precision the wire format keeps.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractField {
    Title,
    Amount,
    StartDate,
    EndDate,
}

impl fmt::Display for ContractField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContractField::Title => "title",
            ContractField::Amount => "amount",
            ContractField::StartDate => "startDate",
            ContractField::EndDate => "endDate",
        };
        f.write_str(name)
    }
}

/// Input rejected before any network call, scoped to the offending field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: ContractField,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: ContractField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Raw text input from a create or edit surface.
#[derive(Debug, Clone, Default)]
pub struct ContractForm {
    pub title: String,
    pub amount: String,
    pub contract_type: String,
    pub description: String,
    pub start_date: String,
    pub end_date: String,
    pub template: Option<String>,
    pub workflow_id: Option<i64>,
    pub finalized: bool,
}

impl ContractForm {
    /// Parses the form into a version-1 draft, reporting the first invalid field.
    pub fn into_contract(self) -> Result<Contract, ValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::new(ContractField::Title, "Title is required"));
        }

        let amount_raw = self.amount.trim();
        if amount_raw.is_empty() {
            return Err(ValidationError::new(ContractField::Amount, "Amount is required"));
        }
        let amount = Decimal::from_str(amount_raw).map_err(|_| {
            ValidationError::new(ContractField::Amount, "Please enter a valid amount")
        })?;

        let start_date = parse_form_date(&self.start_date, ContractField::StartDate)?;
        let end_date = parse_form_date(&self.end_date, ContractField::EndDate)?;

        let mut contract = Contract::new_draft(title, amount);
        contract.contract_type = self.contract_type.trim().to_string();
        contract.description = self.description.trim().to_string();
        contract.start_date = start_date;
        contract.end_date = end_date;
        contract.template = self
            .template
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        contract.workflow_id = self.workflow_id;
        contract.finalized = self.finalized;

        contract.validate()?;
        Ok(contract)
    }
}

/// Parses an optional `yyyy-MM-dd` form date. Blank input means no date.
pub fn parse_form_date(raw: &str, field: ContractField) -> Result<Option<NaiveDate>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    NaiveDate::parse_from_str(raw, DATE_FORMAT).map(Some).map_err(|_| {
        let message = match field {
            ContractField::StartDate => "Start date must be yyyy-MM-dd",
            _ => "End date must be yyyy-MM-dd",
        };
        ValidationError::new(field, message)
    })
}
