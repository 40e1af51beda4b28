//! Row extraction for bulk imports.
//!
//! Rows arrive as loosely-shaped JSON objects (typically converted from a
//! spreadsheet). Column names are normalized (`" Item Name "` → `item_name`) and
//! resolved through a fixed alias table.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use scaleflow_core::Weight;

use crate::product::NewProduct;

const PRODUCT_NAME: &[&str] = &["product_name", "name", "item_name"];
const CATEGORY: &[&str] = &["category", "group", "type"];
const SUB_CATEGORY: &[&str] = &["sub_category", "sub_group", "sub_type"];
const REAL_WEIGHT: &[&str] = &["real_weight", "weight", "actual_weight"];

/// A rejected import row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRowError {
    /// Zero-based position of the row in the submitted sequence.
    pub row: usize,
    pub reason: String,
}

impl ImportRowError {
    fn new(row: usize, reason: impl Into<String>) -> Self {
        Self {
            row,
            reason: reason.into(),
        }
    }
}

/// Extract a product insert from a raw row.
///
/// The row becomes an `accepted` product; it never goes through prediction.
pub fn extract_row(row: usize, raw: &Map<String, Value>) -> Result<NewProduct, ImportRowError> {
    let cells: Vec<(String, &Value)> = raw
        .iter()
        .map(|(k, v)| (normalize_header(k), v))
        .collect();

    let product_name = text_cell(lookup(&cells, PRODUCT_NAME))
        .ok_or_else(|| ImportRowError::new(row, "missing product_name"))?;
    let category = text_cell(lookup(&cells, CATEGORY));
    let sub_category = text_cell(lookup(&cells, SUB_CATEGORY));
    let real_weight =
        weight_cell(lookup(&cells, REAL_WEIGHT)).map_err(|reason| ImportRowError::new(row, reason))?;

    Ok(NewProduct::imported(product_name, category, sub_category, real_weight))
}

fn lookup<'a>(cells: &[(String, &'a Value)], aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .find_map(|alias| cells.iter().find(|(k, _)| k == alias).map(|(_, v)| *v))
}

fn normalize_header(key: &str) -> String {
    key.trim().to_lowercase().replace(' ', "_")
}

fn text_cell(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn weight_cell(value: Option<&Value>) -> Result<Option<Weight>, String> {
    let raw = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| format!("real_weight '{n}' is not representable"))?,
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("real_weight '{}' is not a number", s.trim()))?,
        Some(other) => return Err(format!("real_weight has unsupported value {other}")),
    };

    Weight::new(raw)
        .map(Some)
        .map_err(|e| format!("real_weight {raw}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::ProductStatus;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("test rows must be objects"),
        }
    }

    #[test]
    fn extracts_canonical_columns() {
        let row = obj(json!({
            "product_name": " Crate ",
            "category": "wood",
            "sub_category": "pine",
            "real_weight": 14.2
        }));
        let np = extract_row(0, &row).unwrap();
        assert_eq!(np.product_name, "Crate");
        assert_eq!(np.category.as_deref(), Some("wood"));
        assert_eq!(np.sub_category.as_deref(), Some("pine"));
        assert_eq!(np.real_weight.map(Weight::value), Some(14.2));
        assert_eq!(np.status, ProductStatus::Accepted);
    }

    #[test]
    fn resolves_aliases_and_messy_headers() {
        let row = obj(json!({
            " Item Name ": "Drum",
            "GROUP": "metal",
            "Sub Type": "steel",
            "Actual Weight": "20.5"
        }));
        let np = extract_row(3, &row).unwrap();
        assert_eq!(np.product_name, "Drum");
        assert_eq!(np.category.as_deref(), Some("metal"));
        assert_eq!(np.sub_category.as_deref(), Some("steel"));
        assert_eq!(np.real_weight.map(Weight::value), Some(20.5));
    }

    #[test]
    fn null_name_is_a_row_error() {
        let row = obj(json!({ "product_name": null, "category": "x" }));
        let err = extract_row(7, &row).unwrap_err();
        assert_eq!(err.row, 7);
        assert!(err.reason.contains("product_name"));
    }

    #[test]
    fn blank_name_is_a_row_error() {
        let row = obj(json!({ "name": "   " }));
        assert!(extract_row(0, &row).is_err());
    }

    #[test]
    fn missing_weight_is_allowed() {
        let row = obj(json!({ "name": "Box", "weight": "" }));
        let np = extract_row(0, &row).unwrap();
        assert_eq!(np.real_weight, None);
    }

    #[test]
    fn bad_weights_reject_the_row() {
        for w in [json!("heavy"), json!(-3.0), json!([1])] {
            let row = obj(json!({ "name": "Box", "real_weight": w }));
            assert!(extract_row(0, &row).is_err());
        }
    }

    #[test]
    fn numeric_cells_become_text() {
        let row = obj(json!({ "name": 1042, "type": 7 }));
        let np = extract_row(0, &row).unwrap();
        assert_eq!(np.product_name, "1042");
        assert_eq!(np.category.as_deref(), Some("7"));
    }
}
