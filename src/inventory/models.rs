use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One inventory row as it appears in the report.
///
/// Field names serialize to the report column headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    #[serde(rename = "Nombre")]
    pub name: String,
    #[serde(rename = "Nombre de producto")]
    pub product_name: String,
    #[serde(rename = "Cantidad disponible")]
    pub available_quantity: u64,
    /// Image URL, empty when the upstream has none
    #[serde(rename = "Imagen")]
    pub image: String,
}

impl InventoryRecord {
    /// Normalize one raw upstream item. Missing fields become `""` / `0`.
    pub fn from_raw(item: &Value) -> Self {
        let text = |key: &str| -> String {
            match item.get(key) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            }
        };

        Self {
            name: text("name"),
            product_name: text("productName"),
            available_quantity: item
                .get("availableQuantity")
                .map(quantity)
                .unwrap_or(0),
            image: text("image"),
        }
    }

    pub fn image_url(&self) -> Option<&str> {
        if self.image.is_empty() {
            None
        } else {
            Some(&self.image)
        }
    }
}

/// Clamp an upstream quantity to a non-negative integer
fn quantity(value: &Value) -> u64 {
    match value {
        Value::Number(n) => {
            if let Some(q) = n.as_u64() {
                q
            } else if let Some(f) = n.as_f64() {
                // Negative i64 lands here too
                if f.is_finite() && f > 0.0 {
                    f.trunc() as u64
                } else {
                    0
                }
            } else {
                0
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && *f > 0.0)
            .map(|f| f.trunc() as u64)
            .unwrap_or(0),
        _ => 0,
    }
}

/// Pull the item array out of one of the accepted response shapes:
/// `{"inventory": [...]}`, `{"products": [...]}` or a bare array.
///
/// Returns `None` for anything else.
pub fn extract_items(body: Value) -> Option<Vec<Value>> {
    match body {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => {
            for key in ["inventory", "products"] {
                if let Some(Value::Array(items)) = map.remove(key) {
                    return Some(items);
                }
            }
            None
        }
        _ => None,
    }
}

/// Normalize a page of raw items
pub fn normalize(items: &[Value]) -> Vec<InventoryRecord> {
    items.iter().map(InventoryRecord::from_raw).collect()
}

/// Total available quantity across records
pub fn total_quantity(records: &[InventoryRecord]) -> u64 {
    records
        .iter()
        .map(|r| r.available_quantity)
        .fold(0u64, u64::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_sample_record() {
        let record = InventoryRecord::from_raw(&json!({
            "name": "Widget",
            "productName": "Widget Pro",
            "availableQuantity": 5,
            "image": "http://x/y.png"
        }));

        assert_eq!(
            record,
            InventoryRecord {
                name: "Widget".to_string(),
                product_name: "Widget Pro".to_string(),
                available_quantity: 5,
                image: "http://x/y.png".to_string(),
            }
        );

        let serialized = serde_json::to_value(&record).unwrap();
        assert_eq!(
            serialized,
            json!({
                "Nombre": "Widget",
                "Nombre de producto": "Widget Pro",
                "Cantidad disponible": 5,
                "Imagen": "http://x/y.png"
            })
        );
    }

    #[test]
    fn test_missing_fields_default() {
        let record = InventoryRecord::from_raw(&json!({"name": "Only name"}));
        assert_eq!(record.available_quantity, 0);
        assert_eq!(record.product_name, "");
        assert_eq!(record.image_url(), None);
    }

    #[test]
    fn test_quantity_clamping() {
        let q = |v: Value| InventoryRecord::from_raw(&json!({ "availableQuantity": v })).available_quantity;
        assert_eq!(q(json!(-3)), 0);
        assert_eq!(q(json!(7.9)), 7);
        assert_eq!(q(json!("12")), 12);
        assert_eq!(q(json!("n/a")), 0);
        assert_eq!(q(json!(null)), 0);
    }

    #[test]
    fn test_extract_items_shapes() {
        let item = json!({"name": "a"});

        assert_eq!(extract_items(json!({"inventory": [item.clone()]})).unwrap().len(), 1);
        assert_eq!(extract_items(json!({"products": [item.clone(), item.clone()]})).unwrap().len(), 2);
        assert_eq!(extract_items(json!([item])).unwrap().len(), 1);
        assert!(extract_items(json!({"data": []})).is_none());
        assert!(extract_items(json!("text")).is_none());
    }

    #[test]
    fn test_total_quantity() {
        let records = normalize(&[
            json!({"availableQuantity": 2}),
            json!({"availableQuantity": 3}),
        ]);
        assert_eq!(total_quantity(&records), 5);
    }
}
