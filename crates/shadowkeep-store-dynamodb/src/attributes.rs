// crates/shadowkeep-store-dynamodb/src/attributes.rs
// ============================================================================
// Module: Attribute Conversion
// Description: Conversions between JSON values and DynamoDB attribute values.
// Purpose: Map table items to and from shadow store item types.
// Dependencies: shadowkeep-core, aws-sdk-dynamodb, serde_json
// ============================================================================

//! ## Overview
//! JSON values map onto `S`, `N`, `BOOL`, `NULL`, `L`, and `M`. String and
//! number sets read back as arrays. Binary attributes have no JSON form and
//! are dropped on read; the maintenance path never rewrites whole primary
//! items, so nothing is lost in the table.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::Map;
use serde_json::Number;
use serde_json::Value;
use shadowkeep_core::ItemKey;
use shadowkeep_core::StoreError;
use shadowkeep_core::StoredItem;

use crate::schema::ATTR_DATA;
use crate::schema::ATTR_PK;
use crate::schema::ATTR_SK;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A raw DynamoDB item.
pub type DynamoItem = HashMap<String, AttributeValue>;

// ============================================================================
// SECTION: Values
// ============================================================================

/// Converts a JSON value into an attribute value.
#[must_use]
pub fn json_to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(flag) => AttributeValue::Bool(*flag),
        Value::Number(number) => AttributeValue::N(number.to_string()),
        Value::String(text) => AttributeValue::S(text.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(json_to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(json_map_to_attributes(map)),
    }
}

/// Converts a JSON object into an attribute map.
#[must_use]
pub fn json_map_to_attributes(map: &Map<String, Value>) -> DynamoItem {
    map.iter().map(|(key, value)| (key.clone(), json_to_attribute(value))).collect()
}

/// Converts an attribute value into JSON, or `None` for binary values.
#[must_use]
pub fn attribute_to_json(value: &AttributeValue) -> Option<Value> {
    match value {
        AttributeValue::S(text) => Some(Value::String(text.clone())),
        AttributeValue::N(number) => parse_number(number).map(Value::Number),
        AttributeValue::Bool(flag) => Some(Value::Bool(*flag)),
        AttributeValue::Null(_) => Some(Value::Null),
        AttributeValue::L(items) => {
            Some(Value::Array(items.iter().filter_map(attribute_to_json).collect()))
        }
        AttributeValue::M(map) => Some(Value::Object(attributes_to_json_map(map))),
        AttributeValue::Ss(items) => {
            Some(Value::Array(items.iter().cloned().map(Value::String).collect()))
        }
        AttributeValue::Ns(items) => Some(Value::Array(
            items.iter().filter_map(|item| parse_number(item)).map(Value::Number).collect(),
        )),
        _ => None,
    }
}

/// Converts an attribute map into a JSON object.
#[must_use]
pub fn attributes_to_json_map(map: &DynamoItem) -> Map<String, Value> {
    map.iter()
        .filter_map(|(key, value)| attribute_to_json(value).map(|json| (key.clone(), json)))
        .collect()
}

/// Parses a DynamoDB number string, keeping integer precision.
fn parse_number(text: &str) -> Option<Number> {
    text.parse::<Number>().ok()
}

// ============================================================================
// SECTION: Items
// ============================================================================

/// Builds the `PK`/`SK` key map for an item key.
#[must_use]
pub fn key_to_attributes(key: &ItemKey) -> DynamoItem {
    HashMap::from([
        (ATTR_PK.to_string(), AttributeValue::S(key.pk.clone())),
        (ATTR_SK.to_string(), AttributeValue::S(key.sk.clone())),
    ])
}

/// Reads the `PK`/`SK` key of a raw item.
///
/// # Errors
///
/// Returns [`StoreError::Corrupt`] when either key is absent or not a string.
pub fn attributes_to_key(item: &DynamoItem) -> Result<ItemKey, StoreError> {
    let pk = string_attribute(item, ATTR_PK)?;
    let sk = string_attribute(item, ATTR_SK)?;
    Ok(ItemKey::new(pk, sk))
}

/// Builds a full table item from a stored item.
#[must_use]
pub fn stored_to_attributes(item: &StoredItem) -> DynamoItem {
    let mut attributes = key_to_attributes(&item.key);
    attributes.insert(ATTR_DATA.to_string(), AttributeValue::M(json_map_to_attributes(&item.data)));
    attributes
}

/// Reads a table item into a stored item.
///
/// # Errors
///
/// Returns [`StoreError::Corrupt`] when the keys are malformed or `data` is
/// present but not a map.
pub fn attributes_to_stored(item: &DynamoItem) -> Result<StoredItem, StoreError> {
    let key = attributes_to_key(item)?;
    let data = match item.get(ATTR_DATA) {
        None => Map::new(),
        Some(AttributeValue::M(map)) => attributes_to_json_map(map),
        Some(_) => {
            return Err(StoreError::Corrupt(format!("item {key} has a non-map data attribute")));
        }
    };
    Ok(StoredItem {
        key,
        data,
    })
}

/// Reads a required string attribute.
fn string_attribute(item: &DynamoItem, name: &str) -> Result<String, StoreError> {
    match item.get(name) {
        Some(AttributeValue::S(value)) => Ok(value.clone()),
        _ => Err(StoreError::Corrupt(format!("item is missing string attribute {name}"))),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions on known-good fixtures."
    )]

    use serde_json::json;

    use super::*;

    #[test]
    fn nested_documents_convert_both_ways() {
        let value = json!({
            "title": "Hello",
            "views": 18_446_744_073_709_551_615_u64,
            "ratio": 0.5,
            "tags": ["a", "b"],
            "meta": { "published": true, "deleted": null }
        });
        let attribute = json_to_attribute(&value);
        assert_eq!(attribute_to_json(&attribute), Some(value));
    }

    #[test]
    fn large_integers_keep_precision() {
        let attribute = AttributeValue::N("18446744073709551615".to_string());
        assert_eq!(attribute_to_json(&attribute), Some(json!(18_446_744_073_709_551_615_u64)));
    }

    #[test]
    fn sets_read_back_as_arrays() {
        let strings = AttributeValue::Ss(vec!["x".to_string(), "y".to_string()]);
        assert_eq!(attribute_to_json(&strings), Some(json!(["x", "y"])));
        let numbers = AttributeValue::Ns(vec!["1".to_string(), "2".to_string()]);
        assert_eq!(attribute_to_json(&numbers), Some(json!([1, 2])));
    }

    #[test]
    fn stored_items_nest_attributes_under_data() {
        let mut data = Map::new();
        data.insert("id".to_string(), json!("a1"));
        let item = StoredItem {
            key: ItemKey::new("articles", "title#Hello#id#a1"),
            data,
        };
        let attributes = stored_to_attributes(&item);
        assert_eq!(attributes.get(ATTR_PK), Some(&AttributeValue::S("articles".to_string())));
        assert!(matches!(attributes.get(ATTR_DATA), Some(AttributeValue::M(_))));
        assert_eq!(attributes_to_stored(&attributes).unwrap(), item);
    }

    #[test]
    fn malformed_items_are_corrupt() {
        let mut item = key_to_attributes(&ItemKey::new("articles", "id#a1"));
        item.insert(ATTR_DATA.to_string(), AttributeValue::S("oops".to_string()));
        assert!(matches!(attributes_to_stored(&item), Err(StoreError::Corrupt(_))));
        item.remove(ATTR_SK);
        assert!(matches!(attributes_to_key(&item), Err(StoreError::Corrupt(_))));
    }
}
