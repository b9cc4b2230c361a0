//! Form controller: raw form input, derived fields and validation.

use crate::domain::model::{Destination, Voucher};
use crate::utils::format::{format_date_dmy, mask_cpf, mask_phone, to_iso_date};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingAgency,
    MissingTemplate,
    MissingContractorName,
    MissingContractorPhone,
    NoDestinations,
    AmountOutOfRange,
}

/// Largest amount, in either direction, a voucher may carry.
pub const MAX_AMOUNT: f64 = 1_000_000_000_000.0;

impl ValidationIssue {
    pub fn message(&self) -> &'static str {
        match self {
            ValidationIssue::MissingAgency => "Select an agency.",
            ValidationIssue::MissingTemplate => "Select a template.",
            ValidationIssue::MissingContractorName => "Contractor name is required.",
            ValidationIssue::MissingContractorPhone => {
                "At least one contractor phone is required."
            }
            ValidationIssue::NoDestinations => "At least one destination must be informed.",
            ValidationIssue::AmountOutOfRange => {
                "Amounts must be valid numbers below one trillion."
            }
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Accepts a JSON string or number and keeps it as typed text.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Leading integer of `input`, like a browser number box read back as
/// text. Negative or unparseable input counts as zero.
pub fn parse_count(input: &str) -> u32 {
    let trimmed = input.trim_start();
    if trimmed.starts_with('-') {
        return 0;
    }
    let digits: String = trimmed
        .trim_start_matches('+')
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

/// Leading decimal number of `input`; anything unparseable is zero.
pub fn parse_amount(input: &str) -> f64 {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    let re = NUMBER.get_or_init(|| {
        Regex::new(r"^\s*([+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)")
            .expect("static pattern is valid")
    });

    re.captures(input)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Rounds to two decimals. Values too large to scale are returned as is.
pub fn round_cents(amount: f64) -> f64 {
    let cents = amount * 100.0;
    if !cents.is_finite() {
        return amount;
    }
    cents.round() / 100.0
}

pub fn remaining_amount(total: f64, advance: f64) -> f64 {
    round_cents(total - advance)
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationRow {
    pub destination: String,
    /// `YYYY-MM-DD` as entered; display form is also accepted.
    pub date: String,
    pub time: String,
}

/// Everything the voucher form captures, as typed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VoucherForm {
    pub agency_id: String,
    pub template_id: String,
    pub responsible_agent: String,
    pub destinations: Vec<DestinationRow>,
    pub boarding_location: String,
    pub passengers: Vec<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub adults: String,
    #[serde(deserialize_with = "lenient_text")]
    pub children: String,
    #[serde(deserialize_with = "lenient_text")]
    pub infants: String,
    #[serde(deserialize_with = "lenient_text")]
    pub total_amount: String,
    #[serde(deserialize_with = "lenient_text", alias = "preBooking")]
    pub advance_payment: String,
    pub observations: String,
    /// `YYYY-MM-DD`; blank means today.
    pub contract_date: String,
    pub contractor_name: String,
    pub contractor_cpf: String,
    pub contractor_phone1: String,
    pub contractor_phone2: String,
    pub contractor_email: String,
}

/// The record shape the form produces, before identity and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct VoucherData {
    pub agency_id: String,
    pub template_id: String,
    pub responsible_agent: Option<String>,
    pub destinations: Vec<Destination>,
    pub boarding_location: String,
    pub passengers: Vec<String>,
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
    pub total_passengers: u32,
    pub total_amount: f64,
    pub advance_payment: f64,
    pub remaining_amount: f64,
    pub observations: String,
    pub contract_date: String,
    pub contractor_name: String,
    pub contractor_cpf: String,
    pub contractor_phone1: String,
    pub contractor_phone2: String,
    pub contractor_email: String,
}

impl VoucherForm {
    pub fn total_passengers(&self) -> u32 {
        parse_count(&self.adults)
            .saturating_add(parse_count(&self.children))
            .saturating_add(parse_count(&self.infants))
    }

    pub fn remaining_amount(&self) -> f64 {
        remaining_amount(
            parse_amount(&self.total_amount),
            parse_amount(&self.advance_payment),
        )
    }

    /// Collects the record shape. Rows without a place and blank passenger
    /// names are dropped; derived fields are recomputed.
    pub fn to_data(&self) -> VoucherData {
        let destinations = self
            .destinations
            .iter()
            .filter(|row| !row.destination.trim().is_empty())
            .map(|row| Destination {
                destination: row.destination.clone(),
                date: format_date_dmy(&row.date),
                time: row.time.trim().to_string(),
            })
            .collect();

        let passengers = self
            .passengers
            .iter()
            .filter(|p| !p.trim().is_empty())
            .cloned()
            .collect();

        let contract_date = if self.contract_date.trim().is_empty() {
            Utc::now().format("%d-%m-%Y").to_string()
        } else {
            format_date_dmy(&self.contract_date)
        };

        let total_amount = parse_amount(&self.total_amount);
        let advance_payment = parse_amount(&self.advance_payment);

        VoucherData {
            agency_id: self.agency_id.trim().to_string(),
            template_id: self.template_id.trim().to_string(),
            responsible_agent: Some(self.responsible_agent.trim().to_string())
                .filter(|a| !a.is_empty()),
            destinations,
            boarding_location: self.boarding_location.clone(),
            passengers,
            adults: parse_count(&self.adults),
            children: parse_count(&self.children),
            infants: parse_count(&self.infants),
            total_passengers: self.total_passengers(),
            total_amount,
            advance_payment,
            remaining_amount: remaining_amount(total_amount, advance_payment),
            observations: self.observations.clone(),
            contract_date,
            contractor_name: self.contractor_name.trim().to_string(),
            contractor_cpf: mask_cpf(&self.contractor_cpf),
            contractor_phone1: mask_phone(&self.contractor_phone1),
            contractor_phone2: mask_phone(&self.contractor_phone2),
            contractor_email: self.contractor_email.clone(),
        }
    }

    /// Form populated from a stored voucher, dates back in ISO form.
    pub fn from_voucher(voucher: &Voucher) -> Self {
        Self {
            agency_id: voucher.agency_id.clone(),
            template_id: voucher.template_id.clone(),
            responsible_agent: voucher.responsible_agent.clone().unwrap_or_default(),
            destinations: voucher
                .destinations
                .iter()
                .map(|d| DestinationRow {
                    destination: d.destination.clone(),
                    date: to_iso_date(&d.date),
                    time: d.time.clone(),
                })
                .collect(),
            boarding_location: voucher.boarding_location.clone(),
            passengers: voucher.passengers.clone(),
            adults: voucher.adults.to_string(),
            children: voucher.children.to_string(),
            infants: voucher.infants.to_string(),
            total_amount: voucher.total_amount.to_string(),
            advance_payment: voucher.advance_payment.to_string(),
            observations: voucher.observations.clone(),
            contract_date: to_iso_date(&voucher.contract_date),
            contractor_name: voucher.contractor_name.clone(),
            contractor_cpf: voucher.contractor_cpf.clone(),
            contractor_phone1: voucher.contractor_phone1.clone(),
            contractor_phone2: voucher.contractor_phone2.clone(),
            contractor_email: voucher.contractor_email.clone(),
        }
    }
}

impl VoucherData {
    /// First failing rule, in the order the form reports them.
    pub fn validate(&self) -> std::result::Result<(), ValidationIssue> {
        if self.agency_id.is_empty() {
            return Err(ValidationIssue::MissingAgency);
        }
        if self.template_id.is_empty() {
            return Err(ValidationIssue::MissingTemplate);
        }
        if self.contractor_name.is_empty() {
            return Err(ValidationIssue::MissingContractorName);
        }
        if self.contractor_phone1.is_empty() {
            return Err(ValidationIssue::MissingContractorPhone);
        }
        if self.destinations.is_empty() {
            return Err(ValidationIssue::NoDestinations);
        }
        let in_range = |amount: f64| amount.is_finite() && amount.abs() <= MAX_AMOUNT;
        if ![self.total_amount, self.advance_payment, self.remaining_amount]
            .into_iter()
            .all(in_range)
        {
            return Err(ValidationIssue::AmountOutOfRange);
        }
        Ok(())
    }

    pub fn into_voucher(
        self,
        id: String,
        created_at: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Voucher {
        Voucher {
            id,
            agency_id: self.agency_id,
            template_id: self.template_id,
            responsible_agent: self.responsible_agent,
            destinations: self.destinations,
            boarding_location: self.boarding_location,
            passengers: self.passengers,
            adults: self.adults,
            children: self.children,
            infants: self.infants,
            total_passengers: self.total_passengers,
            total_amount: self.total_amount,
            advance_payment: self.advance_payment,
            remaining_amount: self.remaining_amount,
            observations: self.observations,
            contract_date: self.contract_date,
            contractor_name: self.contractor_name,
            contractor_cpf: self.contractor_cpf,
            contractor_phone1: self.contractor_phone1,
            contractor_phone2: self.contractor_phone2,
            contractor_email: self.contractor_email,
            created_at,
            updated_at,
        }
    }
}
