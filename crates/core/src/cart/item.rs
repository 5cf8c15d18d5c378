//! Line items and their stored JSON form.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::CartError;
use crate::ProductId;

/// What a caller hands to [`super::CartContainer::add_item`].
///
/// Usually built from a catalog record so that the name and price shown in
/// the cart match what the product page showed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRef {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub image: Option<String>,
    pub category: Option<String>,
}

impl ProductRef {
    /// A product reference with no image or category.
    #[must_use]
    pub fn new(id: ProductId, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            image: None,
            category: None,
        }
    }

    /// Attach an image reference.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Attach a category label.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), CartError> {
        check_fields(&self.id, &self.name, self.price)
    }
}

/// One product in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: ProductId,
    pub name: String,
    /// Unit price, in whatever unit the catalog supplied.
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Always at least 1 while the item is in a cart.
    pub quantity: u32,
}

impl LineItem {
    pub(crate) fn from_product(product: &ProductRef) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            image: product.image.clone(),
            category: product.category.clone(),
            quantity: 1,
        }
    }

    /// `price * quantity`, saturating at [`Decimal::MAX`].
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price.saturating_mul(Decimal::from(self.quantity))
    }
}

fn check_fields(id: &ProductId, name: &str, price: Decimal) -> Result<(), CartError> {
    if name.trim().is_empty() {
        return Err(CartError::MissingName { id: id.clone() });
    }
    if price < Decimal::ZERO {
        return Err(CartError::NegativePrice {
            id: id.clone(),
            price,
        });
    }
    Ok(())
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    items: &'a [LineItem],
}

#[derive(Deserialize)]
struct RawDocument {
    items: Vec<serde_json::Value>,
}

/// Serialize items into the stored document shape.
pub(crate) fn encode_items(items: &[LineItem]) -> Option<String> {
    serde_json::to_string(&DocumentRef { items })
        .map_err(|e| warn!(error = %e, "failed to encode cart document"))
        .ok()
}

/// Parse a stored document, keeping every entry that is individually valid.
///
/// A document that is not JSON, or has no `items` array, yields an empty
/// cart. Entries with a bad id, empty name, negative price or zero quantity
/// are dropped; repeated ids are folded into the first occurrence.
pub(crate) fn decode_items(raw: &str) -> Vec<LineItem> {
    let document: RawDocument = match serde_json::from_str(raw) {
        Ok(document) => document,
        Err(e) => {
            warn!(error = %e, "ignoring malformed cart document");
            return Vec::new();
        }
    };

    let mut items: Vec<LineItem> = Vec::with_capacity(document.items.len());
    for value in document.items {
        let item = match serde_json::from_value::<LineItem>(value) {
            Ok(item) => item,
            Err(e) => {
                warn!(error = %e, "dropping unreadable cart entry");
                continue;
            }
        };
        if item.quantity == 0 {
            debug!(product_id = %item.id, "dropping cart entry with zero quantity");
            continue;
        }
        if let Err(e) = check_fields(&item.id, &item.name, item.price) {
            warn!(error = %e, "dropping invalid cart entry");
            continue;
        }

        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => items.push(item),
        }
    }
    items
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn id(s: &str) -> ProductId {
        ProductId::parse(s).unwrap()
    }

    #[test]
    fn test_product_ref_validation() {
        assert!(ProductRef::new(id("a"), "Mug", Decimal::ZERO).validate().is_ok());
        assert!(matches!(
            ProductRef::new(id("a"), "  ", Decimal::ONE).validate(),
            Err(CartError::MissingName { .. })
        ));
        assert!(matches!(
            ProductRef::new(id("a"), "Mug", Decimal::NEGATIVE_ONE).validate(),
            Err(CartError::NegativePrice { .. })
        ));
    }

    #[test]
    fn test_encoded_shape() {
        let item = LineItem::from_product(
            &ProductRef::new(id("mug"), "Mug", Decimal::new(1250, 2)).with_category("kitchen"),
        );
        let encoded = encode_items(&[item]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "items": [{
                    "id": "mug",
                    "name": "Mug",
                    "price": "12.50",
                    "category": "kitchen",
                    "quantity": 1
                }]
            })
        );
    }

    #[test]
    fn test_decode_malformed_is_empty() {
        assert!(decode_items("not json").is_empty());
        assert!(decode_items("{\"products\": []}").is_empty());
        assert!(decode_items("[]").is_empty());
    }

    #[test]
    fn test_decode_drops_bad_entries() {
        let raw = r#"{"items": [
            {"id": "ok", "name": "Fine", "price": "3", "quantity": 2},
            {"id": "", "name": "No id", "price": "1", "quantity": 1},
            {"id": "zero", "name": "Zero", "price": "1", "quantity": 0},
            {"id": "neg", "name": "Negative", "price": "-1", "quantity": 1},
            {"id": "noname", "name": "", "price": "1", "quantity": 1},
            {"name": "missing id"}
        ]}"#;
        let items = decode_items(raw);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id.as_str(), "ok");
        assert_eq!(items[0].quantity, 2);
    }

    #[test]
    fn test_decode_folds_duplicates() {
        let raw = r#"{"items": [
            {"id": "a", "name": "A", "price": "1", "quantity": 2},
            {"id": "b", "name": "B", "price": "1", "quantity": 1},
            {"id": "a", "name": "A again", "price": "9", "quantity": 3}
        ]}"#;
        let items = decode_items(raw);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "A");
        assert_eq!(items[0].quantity, 5);
        assert_eq!(items[1].id.as_str(), "b");
    }

    #[test]
    fn test_line_total() {
        let mut item = LineItem::from_product(&ProductRef::new(id("x"), "X", Decimal::new(15, 1)));
        item.quantity = 4;
        assert_eq!(item.line_total(), Decimal::new(6, 0));
    }
}
