//! Product Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A catalog entry. `id` is assigned by the repository on creation and
/// never changes afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "productName")]
    pub name: String,
    pub code: String,
    pub price: Decimal,
    #[serde(default)]
    pub model: String,
    #[serde(rename = "productUrl", default)]
    pub url: String,
}

impl Product {
    pub fn new(name: impl Into<String>, code: impl Into<String>, price: Decimal) -> Self {
        Self { id: String::new(), name: name.into(), code: code.into(), price, model: String::new(), url: String::new() }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self { self.model = model.into(); self }
    pub fn with_url(mut self, url: impl Into<String>) -> Self { self.url = url.into(); self }
}
