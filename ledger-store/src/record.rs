//! Typed records over the attribute-map store.
//!
//! Marshals domain records to and from [`Item`]s. Anything that comes back
//! from the store in the wrong shape surfaces as `StoreError::Deserialization`.

use crate::error::StoreError;
use crate::repository::{Item, KeyValueStore, Table};
use async_trait::async_trait;
use ledger_domain::{Balance, Order};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A domain record that lives in one table under one key
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Table the record is stored in
    const TABLE: Table;

    /// Entity name used in errors and logs
    const ENTITY: &'static str;

    /// Primary key value
    fn key(&self) -> &str;
}

impl Record for Balance {
    const TABLE: Table = Table::Balances;
    const ENTITY: &'static str = "balance";

    fn key(&self) -> &str {
        &self.user_id
    }
}

impl Record for Order {
    const TABLE: Table = Table::Orders;
    const ENTITY: &'static str = "order";

    fn key(&self) -> &str {
        &self.order_id
    }
}

/// Encode a record as an item
pub fn to_item<R: Record>(record: &R) -> Result<Item, StoreError> {
    match serde_json::to_value(record) {
        Ok(serde_json::Value::Object(item)) => Ok(item),
        Ok(other) => Err(StoreError::Serialization(format!(
            "{} did not encode to an attribute map: {}",
            R::ENTITY,
            other
        ))),
        Err(e) => Err(StoreError::Serialization(format!("{}: {}", R::ENTITY, e))),
    }
}

/// Decode an item into a record
pub fn from_item<R: Record>(item: Item) -> Result<R, StoreError> {
    serde_json::from_value(serde_json::Value::Object(item))
        .map_err(|e| StoreError::Deserialization(format!("{}: {}", R::ENTITY, e)))
}

/// The `available`/`total` attributes of a balance.
///
/// Used both as the `set` and the `expected` side of a balance
/// compare-and-swap; both fields are always compared together.
pub fn balance_amounts(available: Decimal, total: Decimal) -> Result<Item, StoreError> {
    let encode = |value: Decimal| {
        serde_json::to_value(value).map_err(|e| StoreError::Serialization(e.to_string()))
    };

    let mut item = Item::new();
    item.insert("available".to_string(), encode(available)?);
    item.insert("total".to_string(), encode(total)?);
    Ok(item)
}

/// Typed load/save on top of any [`KeyValueStore`]
#[async_trait]
pub trait RecordStore: KeyValueStore {
    /// Load and decode a record by key
    async fn load<R: Record>(&self, key: &str) -> Result<Option<R>, StoreError> {
        match self.get(R::TABLE, key).await? {
            Some(item) => from_item(item).map(Some),
            None => Ok(None),
        }
    }

    /// Encode and upsert a record under its own key
    async fn save<R: Record>(&self, record: &R) -> Result<(), StoreError> {
        let item = to_item(record)?;
        self.put(R::TABLE, record.key(), item).await
    }
}

impl<S: KeyValueStore + ?Sized> RecordStore for S {}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_domain::{Amount, OrderStatus};
    use rust_decimal_macros::dec;

    #[test]
    fn test_balance_item_shape() {
        let item = to_item(&Balance::new("u1", dec!(100), dec!(100))).unwrap();

        assert_eq!(item["user_id"], "u1");
        assert_eq!(item["available"], "100");
        assert_eq!(item["total"], "100");
    }

    #[test]
    fn test_order_decode() {
        let order = Order::new_sell("o1", "u1", Amount::new(dec!(40)).unwrap());
        let item = to_item(&order).unwrap();

        let decoded: Order = from_item(item).unwrap();
        assert_eq!(decoded.status, OrderStatus::Pending);
        assert_eq!(decoded.amount.as_decimal(), dec!(40));
    }

    #[test]
    fn test_decode_wrong_shape_is_deserialization_error() {
        let mut item = Item::new();
        item.insert("user_id".to_string(), "u1".into());
        item.insert("available".to_string(), "not a number".into());
        item.insert("total".to_string(), "10".into());

        let err = from_item::<Balance>(item).unwrap_err();
        assert!(matches!(err, StoreError::Deserialization(_)));
    }

    #[test]
    fn test_decode_missing_field() {
        let mut item = Item::new();
        item.insert("user_id".to_string(), "u1".into());

        assert!(matches!(from_item::<Balance>(item), Err(StoreError::Deserialization(_))));
    }

    #[test]
    fn test_balance_amounts_matches_record_encoding() {
        let balance = Balance::new("u1", dec!(60.50), dec!(60.50));
        let record = to_item(&balance).unwrap();
        let amounts = balance_amounts(balance.available, balance.total).unwrap();

        assert_eq!(amounts.len(), 2);
        assert_eq!(amounts["available"], record["available"]);
        assert_eq!(amounts["total"], record["total"]);
    }
}
