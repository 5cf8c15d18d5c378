//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shopfront_core::{OrderId, OrderStatus, PhoneNumber, PhoneNumberError, ProductId, UserId};

/// Longest accepted free-text delivery field.
const MAX_FIELD_LENGTH: usize = 200;
/// Longest accepted delivery note.
const MAX_NOTE_LENGTH: usize = 1000;

/// A placed order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    /// Customer-facing reference (`SF-XXXXXXXXXX`).
    pub order_number: String,
    /// `None` for guest checkouts.
    pub user_id: Option<UserId>,
    pub status: OrderStatus,
    pub total: Decimal,
    pub currency_code: String,
    pub full_name: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One line of a placed order, with name and price as they were at checkout.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl OrderItem {
    /// `unit_price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Delivery details as submitted by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryForm {
    pub full_name: String,
    pub phone: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Validated delivery details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryDetails {
    pub full_name: String,
    pub phone: PhoneNumber,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub note: Option<String>,
}

/// Why delivery details were rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("invalid phone number: {0}")]
    Phone(#[from] PhoneNumberError),
}

impl DeliveryForm {
    /// Trim every field and check required ones are present.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] for a missing or oversized field, or an
    /// invalid phone number.
    pub fn validate(self) -> Result<DeliveryDetails, DeliveryError> {
        Ok(DeliveryDetails {
            full_name: required("full_name", &self.full_name)?,
            phone: PhoneNumber::parse(&self.phone)?,
            address_line1: required("address_line1", &self.address_line1)?,
            address_line2: optional("address_line2", self.address_line2.as_deref(), MAX_FIELD_LENGTH)?,
            city: required("city", &self.city)?,
            postal_code: required("postal_code", &self.postal_code)?,
            note: optional("note", self.note.as_deref(), MAX_NOTE_LENGTH)?,
        })
    }
}

fn required(field: &'static str, value: &str) -> Result<String, DeliveryError> {
    optional(field, Some(value), MAX_FIELD_LENGTH)?.ok_or(DeliveryError::MissingField(field))
}

fn optional(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, DeliveryError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > max {
        return Err(DeliveryError::TooLong { field, max });
    }
    Ok(Some(value.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form() -> DeliveryForm {
        DeliveryForm {
            full_name: "  Ada Obi ".to_string(),
            phone: "+234 803 555 0101".to_string(),
            address_line1: "12 Marina Road".to_string(),
            address_line2: Some("   ".to_string()),
            city: "Lagos".to_string(),
            postal_code: "101001".to_string(),
            note: None,
        }
    }

    #[test]
    fn test_validate_trims_and_normalizes() {
        let details = form().validate().unwrap();
        assert_eq!(details.full_name, "Ada Obi");
        assert_eq!(details.phone.as_str(), "+2348035550101");
        assert!(details.address_line2.is_none());
    }

    #[test]
    fn test_validate_missing_city() {
        let mut form = form();
        form.city = " ".to_string();
        assert_eq!(form.validate(), Err(DeliveryError::MissingField("city")));
    }

    #[test]
    fn test_validate_bad_phone() {
        let mut form = form();
        form.phone = "call me".to_string();
        assert!(matches!(form.validate(), Err(DeliveryError::Phone(_))));
    }

    #[test]
    fn test_validate_long_note() {
        let mut form = form();
        form.note = Some("x".repeat(MAX_NOTE_LENGTH + 1));
        assert!(matches!(
            form.validate(),
            Err(DeliveryError::TooLong { field: "note", .. })
        ));
    }

    #[test]
    fn test_line_total() {
        let item = OrderItem {
            product_id: ProductId::parse("mug").unwrap(),
            product_name: "Mug".to_string(),
            unit_price: Decimal::new(1250, 2),
            quantity: 3,
        };
        assert_eq!(item.line_total(), Decimal::new(3750, 2));
    }
}
