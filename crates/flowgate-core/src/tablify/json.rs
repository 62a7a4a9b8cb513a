use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::table::{Column, Table};

use super::{Remapper, TablifyError, Tablifier};

/// Restricts and orders which remapped top-level properties become columns.
/// An empty (default) config takes every property, in the object's own key
/// order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JSONTablifierConfig {
    #[serde(default)]
    pub columns: Vec<String>,
}

/// Builds a table from a JSON object whose every property is an array of
/// equal-or-reconcilable length, e.g. `{"name": ["a","b"], "age": [1,2]}`.
/// The input is passed through `remapper` first so arbitrary upstream JSON
/// shapes can be massaged into this form before tabulation.
pub struct JSONTablifier {
    remapper: Arc<dyn Remapper>,
    config: JSONTablifierConfig,
}

impl JSONTablifier {
    pub fn new(remapper: Arc<dyn Remapper>, config: JSONTablifierConfig) -> Self {
        Self { remapper, config }
    }

    fn add_column(table: &mut Table, key: &str, value: &Value) -> Result<(), TablifyError> {
        let Value::Array(items) = value else {
            let type_name = json_type_name(value);
            return Err(TablifyError::UnsupportedDataType(format!(
                "remapped object property '{key}' must be an array, but is '{type_name}'"
            )));
        };
        let column = Column::new(key).nullable().with_values(items.clone());
        table.append(column)?;
        Ok(())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Tablifier for JSONTablifier {
    fn table(&self, input: &[u8]) -> Result<Table, TablifyError> {
        let remapped = self.remapper.remap(input)?;
        let parsed: Value = serde_json::from_slice(&remapped)?;
        let Value::Object(map) = parsed else {
            let type_name = json_type_name(&parsed);
            return Err(TablifyError::UnsupportedDataType(format!(
                "remapping must result in an object, got '{type_name}'"
            )));
        };

        let mut table = Table::new();
        if !self.config.columns.is_empty() {
            for key in &self.config.columns {
                let value = map.get(key).cloned().unwrap_or(Value::Null);
                Self::add_column(&mut table, key, &value)?;
            }
        } else {
            for (key, value) in &map {
                Self::add_column(&mut table, key, value)?;
            }
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tablify::NoOpRemapper;

    fn tablifier(config: JSONTablifierConfig) -> JSONTablifier {
        JSONTablifier::new(Arc::new(NoOpRemapper), config)
    }

    #[test]
    fn builds_table_from_arrays_object() {
        let t = tablifier(JSONTablifierConfig::default());
        let table = t
            .table(br#"{"name": ["alan", "alex"], "age": [42, 49]}"#)
            .unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.num_cols(), 2);
    }

    #[test]
    fn default_columns_follow_object_insertion_order() {
        let t = tablifier(JSONTablifierConfig::default());
        let table = t
            .table(br#"{"name": ["alan"], "age": [42]}"#)
            .unwrap();
        assert_eq!(table.header(), vec!["name".to_string(), "age".to_string()]);
    }

    #[test]
    fn restricts_and_orders_columns_when_configured() {
        let t = tablifier(JSONTablifierConfig {
            columns: vec!["age".to_string(), "name".to_string()],
        });
        let table = t
            .table(br#"{"name": ["alan"], "age": [42], "extra": [true]}"#)
            .unwrap();
        assert_eq!(table.header(), vec!["age".to_string(), "name".to_string()]);
    }

    #[test]
    fn rejects_non_object_top_level() {
        let t = tablifier(JSONTablifierConfig::default());
        assert!(t.table(b"[1,2,3]").is_err());
    }

    #[test]
    fn rejects_non_array_property() {
        let t = tablifier(JSONTablifierConfig::default());
        assert!(t.table(br#"{"name": "not-an-array"}"#).is_err());
    }
}
