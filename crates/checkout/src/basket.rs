//! Basket validation and normalization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use common::ProductId;

/// Longest accepted product reference.
pub const MAX_PRODUCT_REF_LEN: usize = 64;

/// A line item as submitted by the caller. Request-scoped; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// The product being ordered.
    pub product_id: ProductId,

    /// Requested quantity, must be at least 1.
    pub quantity: u32,
}

impl LineItem {
    /// Creates a new line item.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Errors produced by basket validation. Never retried; surfaced
/// immediately to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The submitted basket contained no line items.
    #[error("Basket is empty")]
    EmptyBasket,

    /// A line item had a zero quantity, or merged duplicates overflowed.
    #[error("Invalid quantity for product {0}")]
    InvalidQuantity(ProductId),

    /// A product reference was not syntactically well-formed.
    #[error("Malformed product reference: {0:?}")]
    MalformedProductReference(String),
}

/// A validated, normalized basket.
///
/// Duplicate product lines are merged by summing quantities, so each
/// distinct product is reserved at most once per order, and the items are
/// sorted ascending by product ID. That fixed ordering across all
/// concurrent baskets is what keeps cross-order compensation simple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBasket {
    items: Vec<LineItem>,
}

impl ValidatedBasket {
    /// Validates and normalizes a submitted basket.
    pub fn validate(items: Vec<LineItem>) -> Result<Self, ValidationError> {
        if items.is_empty() {
            return Err(ValidationError::EmptyBasket);
        }

        // BTreeMap keys give the ascending product-ID processing order.
        let mut merged: BTreeMap<ProductId, u32> = BTreeMap::new();

        for item in items {
            if !is_well_formed(item.product_id.as_str()) {
                return Err(ValidationError::MalformedProductReference(
                    item.product_id.as_str().to_string(),
                ));
            }
            if item.quantity == 0 {
                return Err(ValidationError::InvalidQuantity(item.product_id));
            }

            let entry = merged.entry(item.product_id.clone()).or_insert(0);
            *entry = entry
                .checked_add(item.quantity)
                .ok_or(ValidationError::InvalidQuantity(item.product_id))?;
        }

        Ok(Self {
            items: merged
                .into_iter()
                .map(|(product_id, quantity)| LineItem {
                    product_id,
                    quantity,
                })
                .collect(),
        })
    }

    /// The normalized line items, ascending by product ID.
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Number of distinct products in the basket.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false: validation rejects empty baskets.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn is_well_formed(reference: &str) -> bool {
    !reference.is_empty()
        && reference.len() <= MAX_PRODUCT_REF_LEN
        && reference
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
