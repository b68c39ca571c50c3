//! # Entity/Schema Binding
//!
//! Turns raw JSON payloads into the typed create/update inputs of a resource. Keys are
//! checked against the resource's allow-lists, the payload is deserialized, then validated.
//! Keys outside the allow-list are rejected or dropped depending on [`Strictness`].

use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

use crate::core::{CRUDResource, UpdateInput};
use crate::errors::CrudError;
use crate::validation::Validatable;

/// What happens to payload keys a resource does not accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Unknown keys fail validation.
    Strict,
    /// Unknown keys are dropped.
    #[default]
    Lenient,
}

impl From<bool> for Strictness {
    fn from(strict: bool) -> Self {
        if strict { Self::Strict } else { Self::Lenient }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaBinding {
    strictness: Strictness,
}

impl SchemaBinding {
    #[must_use]
    pub fn new(strictness: Strictness) -> Self {
        Self { strictness }
    }

    #[must_use]
    pub fn strictness(&self) -> Strictness {
        self.strictness
    }

    /// # Errors
    ///
    /// `Validation` for a non-object payload, a rejected key, a type mismatch or a failed
    /// field check.
    pub fn create_from_json<R: CRUDResource>(
        &self,
        payload: JsonValue,
    ) -> Result<R::CreateModel, CrudError> {
        let fields = self.allowed(R::RESOURCE_NAME_SINGULAR, R::CREATE_FIELDS, payload)?;
        parse(fields)
    }

    /// A JSON array of create payloads. Errors name the offending index.
    ///
    /// # Errors
    ///
    /// As [`SchemaBinding::create_from_json`], for every element; also `Validation` when the
    /// payload is not an array.
    pub fn create_many_from_json<R: CRUDResource>(
        &self,
        payload: JsonValue,
    ) -> Result<Vec<R::CreateModel>, CrudError> {
        each(payload, |item| self.create_from_json::<R>(item))
    }

    /// A partial update. Only keys present in the payload end up in the result.
    ///
    /// # Errors
    ///
    /// As [`SchemaBinding::create_from_json`], against the update allow-list.
    pub fn update_from_json<R: CRUDResource>(
        &self,
        payload: JsonValue,
    ) -> Result<UpdateInput<R::UpdateModel>, CrudError> {
        self.update_with::<R>(R::UPDATE_FIELDS, payload)
    }

    /// A JSON array of update payloads for a keyed bulk update. `key_field` is accepted in
    /// every element alongside the update allow-list, since it selects the rows to write.
    ///
    /// # Errors
    ///
    /// As [`SchemaBinding::update_from_json`], for every element.
    pub fn update_many_from_json<R: CRUDResource>(
        &self,
        payload: JsonValue,
        key_field: &str,
    ) -> Result<Vec<UpdateInput<R::UpdateModel>>, CrudError> {
        let mut allowed = R::UPDATE_FIELDS.to_vec();
        if !allowed.contains(&key_field) {
            allowed.push(key_field);
        }
        each(payload, |item| self.update_with::<R>(&allowed, item))
    }

    fn update_with<R: CRUDResource>(
        &self,
        allowed: &[&str],
        payload: JsonValue,
    ) -> Result<UpdateInput<R::UpdateModel>, CrudError> {
        let fields = self.allowed(R::RESOURCE_NAME_SINGULAR, allowed, payload)?;
        // type-check and validate, but keep the map so absent keys stay untouched
        let _: R::UpdateModel = parse(fields.clone())?;
        Ok(UpdateInput::Partial(fields))
    }

    fn allowed(
        &self,
        resource: &str,
        allowed: &[&str],
        payload: JsonValue,
    ) -> Result<Map<String, JsonValue>, CrudError> {
        let JsonValue::Object(mut fields) = payload else {
            return Err(CrudError::Validation(vec![format!(
                "{resource} payload must be a JSON object"
            )]));
        };
        let unknown: Vec<String> = fields
            .keys()
            .filter(|key| !allowed.contains(&key.as_str()))
            .cloned()
            .collect();
        if unknown.is_empty() {
            return Ok(fields);
        }
        match self.strictness {
            Strictness::Strict => Err(CrudError::Validation(
                unknown
                    .iter()
                    .map(|key| format!("{key}: unknown field for {resource}"))
                    .collect(),
            )),
            Strictness::Lenient => {
                tracing::debug!(resource, ?unknown, "Dropping unknown payload keys");
                for key in &unknown {
                    fields.remove(key);
                }
                Ok(fields)
            }
        }
    }
}

fn parse<T: DeserializeOwned + Validatable>(fields: Map<String, JsonValue>) -> Result<T, CrudError> {
    let value: T = serde_json::from_value(JsonValue::Object(fields))
        .map_err(|err| CrudError::Validation(vec![err.to_string()]))?;
    value.validate()?;
    Ok(value)
}

fn each<T>(
    payload: JsonValue,
    mut bind: impl FnMut(JsonValue) -> Result<T, CrudError>,
) -> Result<Vec<T>, CrudError> {
    let JsonValue::Array(items) = payload else {
        return Err(CrudError::Validation(vec![
            "payload must be a JSON array".to_string(),
        ]));
    };
    let mut bound = Vec::with_capacity(items.len());
    let mut errors = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        match bind(item) {
            Ok(value) => bound.push(value),
            Err(CrudError::Validation(messages)) => {
                errors.extend(messages.into_iter().map(|m| format!("[{index}] {m}")));
            }
            Err(other) => return Err(other),
        }
    }
    if errors.is_empty() {
        Ok(bound)
    } else {
        Err(CrudError::Validation(errors))
    }
}
