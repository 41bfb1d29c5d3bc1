//! Value Objects for orders and products

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::ValidationError;

/// Delivery urgency chosen at checkout
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShippingType { Urgent, Economic }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Carrier { CarrierA, CarrierB }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod { Cash, Debit, Credit }

impl fmt::Display for ShippingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Urgent => write!(f, "URGENT"), Self::Economic => write!(f, "ECONOMIC") }
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::CarrierA => write!(f, "CARRIER_A"), Self::CarrierB => write!(f, "CARRIER_B") }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Cash => write!(f, "CASH"), Self::Debit => write!(f, "DEBIT"), Self::Credit => write!(f, "CREDIT") }
    }
}

/// Validator hook for price fields.
pub fn non_negative_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ValidationError::new("negative_price"));
    }
    Ok(())
}
