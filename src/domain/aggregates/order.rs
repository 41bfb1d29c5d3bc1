//! Order Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::domain::aggregates::Product;
use crate::domain::value_objects::{Carrier, PaymentMethod, ShippingType};

/// A placed order. `id` and `created_at` stay empty until the order
/// repository persists it; orders are never modified after that.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub email: String,
    pub id: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    pub shipping: Shipping,
    pub billing: Billing,
    pub products: Vec<OrderProduct>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipping {
    #[serde(rename = "type")]
    pub kind: ShippingType,
    pub carrier: Carrier,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Billing {
    pub payment: PaymentMethod,
    pub total_price: Decimal,
}

/// Price snapshot of a product at placement time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderProduct {
    pub code: String,
    pub price: Decimal,
}

impl From<&Product> for OrderProduct {
    fn from(p: &Product) -> Self { Self { code: p.code.clone(), price: p.price } }
}

impl Order {
    pub fn place(email: impl Into<String>, shipping: Shipping, payment: PaymentMethod, products: &[Product]) -> Result<Self, OrderError> {
        if products.is_empty() { return Err(OrderError::NoProducts); }
        let products: Vec<OrderProduct> = products.iter().map(OrderProduct::from).collect();
        let total_price = products.iter().map(|p| p.price).sum();
        Ok(Self {
            email: email.into(), id: String::new(), created_at: 0, shipping,
            billing: Billing { payment, total_price }, products,
        })
    }

    pub fn product_codes(&self) -> Vec<String> { self.products.iter().map(|p| p.code.clone()).collect() }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("An order needs at least one product")]
    NoProducts,
}
