//! Payment Submissions
//!
//! The card-like fields posted by the payment form, and the server-side
//! presence/length checks applied before any PSP delegation.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum card number length after whitespace removal
pub const MIN_CARD_NUMBER_LEN: usize = 13;

/// Minimum CVC length
pub const MIN_CVC_LEN: usize = 3;

/// Number of selectable expiry years
pub const EXPIRY_YEARS: i32 = 10;

/// Fields as submitted by the client
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSubmission {
    #[serde(default)]
    pub card_name: String,
    #[serde(default)]
    pub card_number: String,
    #[serde(default)]
    pub exp_month: String,
    #[serde(default)]
    pub exp_year: String,
    #[serde(default)]
    pub cvc: String,
}

impl std::fmt::Debug for PaymentSubmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentSubmission")
            .field("card_name", &self.card_name)
            .field("card_number", &mask_card_number(&self.card_number))
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .field("cvc", &"***")
            .finish()
    }
}

/// Submitted field identifiers, as used by the form
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    CardName,
    CardNumber,
    ExpMonth,
    ExpYear,
    Cvc,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::CardName => "cardName",
            Field::CardNumber => "cardNumber",
            Field::ExpMonth => "expMonth",
            Field::ExpYear => "expYear",
            Field::Cvc => "cvc",
        }
    }

    /// Message shown next to the field
    pub fn message(&self) -> &'static str {
        match self {
            Field::CardName => "Cardholder name is required",
            Field::CardNumber => "Valid card number is required",
            Field::ExpMonth => "Expiry month is required",
            Field::ExpYear => "Expiry year is required",
            Field::Cvc => "CVC is required",
        }
    }
}

/// Per-field validation failures
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<Field, &'static str>);

impl FieldErrors {
    fn reject(&mut self, field: Field) {
        self.0.insert(field, field.message());
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.fields().map(|field| field.as_str()).collect();
        write!(f, "invalid fields: {}", names.join(", "))
    }
}

/// Bounded range of selectable expiry years
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpiryWindow {
    first_year: i32,
    years: i32,
}

impl ExpiryWindow {
    pub fn new(first_year: i32, years: i32) -> Self {
        Self {
            first_year,
            years: years.max(1),
        }
    }

    /// Window starting at the current calendar year
    pub fn current() -> Self {
        Self::new(Utc::now().year(), EXPIRY_YEARS)
    }

    /// Month options, `"01"..="12"`
    pub fn months(&self) -> Vec<String> {
        (1..=12).map(|m| format!("{:02}", m)).collect()
    }

    /// Year options as four-digit strings
    pub fn years(&self) -> Vec<String> {
        (self.first_year..self.first_year + self.years)
            .map(|y| y.to_string())
            .collect()
    }

    fn parse_month(&self, value: &str) -> Option<u8> {
        if value.len() != 2 {
            return None;
        }
        value.parse::<u8>().ok().filter(|m| (1..=12).contains(m))
    }

    fn parse_year(&self, value: &str) -> Option<i32> {
        if value.len() != 4 {
            return None;
        }
        value
            .parse::<i32>()
            .ok()
            .filter(|y| (self.first_year..self.first_year + self.years).contains(y))
    }
}

impl Default for ExpiryWindow {
    fn default() -> Self {
        Self::current()
    }
}

/// Card details that passed validation
#[derive(Clone)]
pub struct CardDetails {
    pub cardholder_name: String,
    /// Digits only
    pub number: String,
    pub exp_month: u8,
    pub exp_year: i32,
    pub cvc: String,
}

impl CardDetails {
    pub fn last4(&self) -> &str {
        &self.number[self.number.len().saturating_sub(4)..]
    }
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDetails")
            .field("cardholder_name", &self.cardholder_name)
            .field("number", &mask_card_number(&self.number))
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .finish_non_exhaustive()
    }
}

impl PaymentSubmission {
    /// Presence and length checks; every failing field is reported
    pub fn validate(&self, window: &ExpiryWindow) -> Result<CardDetails, FieldErrors> {
        let mut errors = FieldErrors::default();

        let cardholder_name = self.card_name.trim().to_string();
        if cardholder_name.is_empty() {
            errors.reject(Field::CardName);
        }

        let number: String = self
            .card_number
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if number.len() < MIN_CARD_NUMBER_LEN || !is_digits(&number) {
            errors.reject(Field::CardNumber);
        }

        let exp_month = window.parse_month(self.exp_month.trim());
        if exp_month.is_none() {
            errors.reject(Field::ExpMonth);
        }

        let exp_year = window.parse_year(self.exp_year.trim());
        if exp_year.is_none() {
            errors.reject(Field::ExpYear);
        }

        let cvc = self.cvc.trim().to_string();
        if cvc.len() < MIN_CVC_LEN || !is_digits(&cvc) {
            errors.reject(Field::Cvc);
        }

        match (exp_month, exp_year) {
            (Some(exp_month), Some(exp_year)) if errors.is_empty() => Ok(CardDetails {
                cardholder_name,
                number,
                exp_month,
                exp_year,
                cvc,
            }),
            _ => Err(errors),
        }
    }
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// First four characters followed by a mask, for logs
pub fn mask_card_number(number: &str) -> String {
    let prefix: String = number.chars().filter(|c| !c.is_whitespace()).take(4).collect();
    format!("{}****", prefix)
}
