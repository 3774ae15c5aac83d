//! Display helpers for rendering contracts in a list.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{Contract, ContractStatus};

const DISPLAY_DATE_FORMAT: &str = "%b %d, %Y";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractRow {
    pub id: Option<i64>,
    pub title: String,
    pub amount: String,
    pub contract_type: String,
    pub dates: String,
    /// Only drafts carry a badge
    pub status_badge: Option<&'static str>,
}

impl From<&Contract> for ContractRow {
    fn from(contract: &Contract) -> Self {
        Self {
            id: contract.id,
            title: contract.title.clone(),
            amount: format_currency(contract.amount),
            contract_type: contract.contract_type.clone(),
            dates: format!(
                "{} - {}",
                format_date(contract.start_date),
                format_date(contract.end_date)
            ),
            status_badge: match contract.status() {
                ContractStatus::Draft => Some(ContractStatus::Draft.label()),
                ContractStatus::Finalized => None,
            },
        }
    }
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format(DISPLAY_DATE_FORMAT).to_string())
        .unwrap_or_default()
}

/// `$1,234.50` style, two decimals, half away from zero.
pub fn format_currency(amount: Decimal) -> String {
    let rounded = amount
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .abs();
    let text = format!("{:.2}", rounded);
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}${}.{}", sign, grouped, fraction)
}
