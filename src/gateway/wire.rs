//! Wire mapping between the domain [`Contract`] and the server's JSON.
//!
//! The server reports the finalized flag under two names (`isFinalized` and
//! `finalized`), either of which may be missing or `null`. That quirk is
//! absorbed here and nowhere else: reads take the logical OR, writes emit both.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::Contract;
use crate::models::contract::DATE_FORMAT;

/// Response envelope used by every contract endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub message: Option<String>,
    pub success: Option<bool>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            message: None,
            success: Some(true),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: None,
            message: Some(message.into()),
            success: Some(false),
        }
    }
}

/// JSON shape of a contract as exchanged with the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDto {
    pub id: Option<i64>,
    pub title: Option<String>,
    /// Sent as a JSON number (f64), so only about 15 significant digits survive
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub amount: Option<Decimal>,
    pub workflow_id: Option<i64>,
    pub contract_type: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub template: Option<String>,
    #[serde(rename = "isFinalized", default, deserialize_with = "null_as_false")]
    pub is_finalized: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub finalized: bool,
    pub version: Option<u32>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub timestamp: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("invalid {field} '{value}'")]
    InvalidField { field: &'static str, value: String },
}

impl From<&Contract> for ContractDto {
    fn from(contract: &Contract) -> Self {
        Self {
            id: contract.id,
            title: Some(contract.title.clone()),
            amount: Some(contract.amount),
            workflow_id: contract.workflow_id,
            contract_type: Some(contract.contract_type.clone()),
            description: Some(contract.description.clone()),
            start_date: contract.start_date.map(|d| d.format(DATE_FORMAT).to_string()),
            end_date: contract.end_date.map(|d| d.format(DATE_FORMAT).to_string()),
            template: contract.template.clone(),
            is_finalized: contract.finalized,
            finalized: contract.finalized,
            version: Some(contract.version),
            timestamp: contract
                .timestamp
                .map(|ts| ts.timestamp_millis().to_string()),
        }
    }
}

impl TryFrom<ContractDto> for Contract {
    type Error = WireError;

    fn try_from(dto: ContractDto) -> Result<Self, Self::Error> {
        Ok(Contract {
            id: dto.id,
            title: dto.title.unwrap_or_default(),
            amount: dto.amount.unwrap_or(Decimal::ZERO),
            workflow_id: dto.workflow_id,
            contract_type: dto.contract_type.unwrap_or_default(),
            description: dto.description.unwrap_or_default(),
            start_date: parse_date("startDate", dto.start_date)?,
            end_date: parse_date("endDate", dto.end_date)?,
            template: dto.template,
            finalized: dto.is_finalized || dto.finalized,
            version: dto.version.unwrap_or(1),
            timestamp: parse_timestamp(dto.timestamp)?,
        })
    }
}

/// `null` or empty means no date. A trailing time part is tolerated and dropped.
fn parse_date(field: &'static str, raw: Option<String>) -> Result<Option<NaiveDate>, WireError> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };

    let date_part = raw.trim().split('T').next().unwrap_or_default();
    NaiveDate::parse_from_str(date_part, DATE_FORMAT)
        .map(Some)
        .map_err(|_| WireError::InvalidField { field, value: raw })
}

fn parse_timestamp(raw: Option<String>) -> Result<Option<DateTime<Utc>>, WireError> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };

    if let Ok(millis) = raw.trim().parse::<i64>() {
        if let Some(ts) = DateTime::from_timestamp_millis(millis) {
            return Ok(Some(ts));
        }
    }

    DateTime::parse_from_rfc3339(raw.trim())
        .map(|ts| Some(ts.with_timezone(&Utc)))
        .map_err(|_| WireError::InvalidField {
            field: "timestamp",
            value: raw,
        })
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Millis(i64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Millis(millis) => millis.to_string(),
    }))
}
