use sea_orm::ColumnTrait;

use crate::errors::CrudError;

/// Field descriptor table of one resource: attribute name → column.
///
/// Built once when an engine is constructed so that field names coming from filters,
/// ordering and payloads resolve without reflection at call time.
#[derive(Debug, Clone)]
pub struct FieldTable<C> {
    resource: &'static str,
    fields: Vec<(String, C)>,
}

impl<C> FieldTable<C>
where
    C: ColumnTrait + Copy,
{
    pub fn new(resource: &'static str, fields: impl IntoIterator<Item = (String, C)>) -> Self {
        Self {
            resource,
            fields: fields.into_iter().collect(),
        }
    }

    /// Every column of the entity, keyed by its column name.
    #[must_use]
    pub fn from_entity_columns(resource: &'static str) -> Self {
        Self::new(
            resource,
            C::iter().map(|column| (column.as_str().to_owned(), column)),
        )
    }

    #[must_use]
    pub fn resource(&self) -> &'static str {
        self.resource
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<C> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, column)| *column)
    }

    /// # Errors
    ///
    /// `CrudError::UnknownField` if the resource has no attribute called `name`.
    pub fn resolve(&self, name: &str) -> Result<C, CrudError> {
        self.get(name)
            .ok_or_else(|| CrudError::unknown_field(self.resource, name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
