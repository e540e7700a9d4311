//! Source document to target record transformer

use super::mapping::{FieldMapping, UnknownDiscriminatorPolicy};
use super::record::{Reshaped, TransformError, TransformedRecord, type_name};
use crate::etl::Transformer;
use eyre::Result;
use serde_json::{Map, Value};

/// Transformer that promotes mapped fields and buckets the rest into `data`
///
/// # Example
/// ```
/// use catalog_migrator::etl::Transformer;
/// use catalog_migrator::transform::{FieldMapping, RecordReshaper, Reshaped};
/// use serde_json::json;
///
/// let reshaper = RecordReshaper::new(FieldMapping::default());
/// let input = json!({"_id": "1", "categoryId": "c1", "isActive": true, "_class": "TypeA", "extra": "x"});
///
/// let Reshaped::Record(record) = reshaper.transform(input).unwrap() else {
///     panic!("expected a record");
/// };
/// assert_eq!(record.record_type, "TYPE_A");
/// assert_eq!(record.data["extra"], "x");
/// ```
pub struct RecordReshaper {
    mapping: FieldMapping,
}

impl RecordReshaper {
    pub fn new(mapping: FieldMapping) -> Self {
        Self { mapping }
    }

    fn identifier(&self, fields: &Map<String, Value>) -> Result<String, TransformError> {
        let field = &self.mapping.promoted.identifier;
        match fields.get(field) {
            Some(Value::String(id)) => Ok(id.clone()),
            Some(Value::Number(id)) => Ok(id.to_string()),
            None | Some(Value::Null) => Err(TransformError::MissingField {
                field: field.clone(),
            }),
            Some(other) => Err(TransformError::InvalidField {
                id: other.to_string(),
                field: field.clone(),
                expected: "a string or number",
                found: type_name(other),
            }),
        }
    }

    fn resolve_type(&self, fields: &Map<String, Value>) -> Option<String> {
        fields
            .get(&self.mapping.promoted.discriminator)
            .and_then(Value::as_str)
            .and_then(|d| self.mapping.record_type(d))
            .map(str::to_string)
    }

    fn reference(&self, id: &str, fields: &Map<String, Value>) -> Result<Option<String>> {
        let field = &self.mapping.promoted.reference;
        match fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(TransformError::InvalidField {
                id: id.to_string(),
                field: field.clone(),
                expected: "a string",
                found: type_name(other),
            }
            .into()),
        }
    }

    fn flag(&self, id: &str, fields: &Map<String, Value>) -> Result<Option<bool>> {
        let field = &self.mapping.promoted.flag;
        match fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(TransformError::InvalidField {
                id: id.to_string(),
                field: field.clone(),
                expected: "a boolean",
                found: type_name(other),
            }
            .into()),
        }
    }
}

impl Transformer for RecordReshaper {
    type Input = Value;
    type Output = Reshaped;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        let fields = match input {
            Value::Object(fields) => fields,
            other => {
                return Err(TransformError::NotAnObject {
                    found: type_name(&other),
                }
                .into());
            }
        };

        let id = self.identifier(&fields)?;

        let Some(record_type) = self.resolve_type(&fields) else {
            let value = fields
                .get(&self.mapping.promoted.discriminator)
                .map(Value::to_string)
                .unwrap_or_else(|| "<missing>".to_string());

            return match self.mapping.on_unknown_discriminator {
                UnknownDiscriminatorPolicy::Fail => Err(TransformError::UnknownDiscriminator {
                    id,
                    field: self.mapping.promoted.discriminator.clone(),
                    value,
                }
                .into()),
                UnknownDiscriminatorPolicy::Quarantine => {
                    log::warn!("Quarantining record '{}' with discriminator {}", id, value);
                    Ok(Reshaped::Quarantined(Value::Object(fields)))
                }
            };
        };

        let category_id = self.reference(&id, &fields)?;
        let is_active = self.flag(&id, &fields)?;

        let data = fields
            .into_iter()
            .filter(|(key, _)| self.mapping.is_passthrough(key))
            .collect();

        Ok(Reshaped::Record(TransformedRecord {
            id,
            category_id,
            is_active,
            record_type,
            data,
        }))
    }
}
