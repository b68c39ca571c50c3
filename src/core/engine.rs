//! Generic CRUD engine.
//!
//! [`CrudEngine<R>`] implements every operation once for any [`CRUDResource`]. It holds the
//! resource's field table and nothing else; all state lives in the [`Session`] passed to each
//! call, so one engine can serve any number of concurrent sessions.

use sea_orm::sea_query::SimpleExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, IntoActiveModel, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use utoipa::ToSchema;

use super::fields::FieldTable;
use super::traits::{CRUDResource, MergeIntoActiveModel};
use crate::errors::CrudError;
use crate::filter::{self, FilterOperator, FilterSpec, NamedFilters};
use crate::session::{Session, settle};

/// Update payload: a typed model, or a bare map of attribute → value.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateInput<U> {
    /// Fields that are `Some` are written.
    Model(U),
    /// Only the keys present are written.
    Partial(Map<String, JsonValue>),
}

impl<U> From<U> for UpdateInput<U> {
    fn from(model: U) -> Self {
        Self::Model(model)
    }
}

/// Outcome of a bulk create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BulkResult {
    pub inserted: u64,
    pub message: String,
}

pub struct CrudEngine<R: CRUDResource> {
    fields: FieldTable<R::ColumnType>,
}

impl<R: CRUDResource> Clone for CrudEngine<R> {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
        }
    }
}

impl<R: CRUDResource> std::fmt::Debug for CrudEngine<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrudEngine")
            .field("resource", &R::RESOURCE_NAME_SINGULAR)
            .field("fields", &self.fields.names().collect::<Vec<_>>())
            .finish()
    }
}

impl<R: CRUDResource> Default for CrudEngine<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CRUDResource> CrudEngine<R> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            fields: R::field_table(),
        }
    }

    #[must_use]
    pub fn fields(&self) -> &FieldTable<R::ColumnType> {
        &self.fields
    }

    fn order_column(&self, order_by: Option<&str>) -> Result<R::ColumnType, CrudError> {
        order_by.map_or(Ok(R::ID_COLUMN), |name| self.fields.resolve(name))
    }

    fn equals(&self, field: &str, value: &JsonValue) -> Result<SimpleExpr, CrudError> {
        let column = self.fields.resolve(field)?;
        filter::predicate(column, field, FilterOperator::Eq, value)
    }

    fn not_found(id: i32) -> CrudError {
        CrudError::not_found(R::RESOURCE_NAME_SINGULAR, Some(id.to_string()))
    }

    /// # Errors
    ///
    /// Store failures only; a missing row is `Ok(None)`.
    pub async fn get(&self, session: &Session, id: i32) -> Result<Option<R>, CrudError> {
        tracing::info!(resource = R::RESOURCE_NAME_SINGULAR, id, "get");
        let model = R::EntityType::find_by_id(id).one(session.conn()).await?;
        Ok(model.map(R::from_model))
    }

    /// First row, ascending by `order_by` (default `id`), whose `filter_field` equals
    /// `filter_value`.
    ///
    /// # Errors
    ///
    /// `UnknownField` for either field name, `InvalidFilterValue` for a non-scalar value.
    pub async fn get_first_by_filter(
        &self,
        session: &Session,
        order_by: Option<&str>,
        filter_field: &str,
        filter_value: &JsonValue,
    ) -> Result<Option<R>, CrudError> {
        tracing::info!(
            resource = R::RESOURCE_NAME_SINGULAR,
            field = filter_field,
            "get_first_by_filter"
        );
        let order = self.order_column(order_by)?;
        let model = R::EntityType::find()
            .filter(self.equals(filter_field, filter_value)?)
            .order_by_asc(order)
            .one(session.conn())
            .await?;
        Ok(model.map(R::from_model))
    }

    /// One page of rows, ascending by `order_by` (default `id`).
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a negative `skip` or `limit`, `UnknownField` for `order_by`.
    pub async fn list(
        &self,
        session: &Session,
        skip: i64,
        limit: i64,
        order_by: Option<&str>,
    ) -> Result<Vec<R>, CrudError> {
        tracing::info!(resource = R::RESOURCE_NAME_PLURAL, skip, limit, "list");
        let offset = u64::try_from(skip)
            .map_err(|_| CrudError::InvalidArgument(format!("skip must not be negative, got {skip}")))?;
        let limit = u64::try_from(limit)
            .map_err(|_| CrudError::InvalidArgument(format!("limit must not be negative, got {limit}")))?;
        let order = self.order_column(order_by)?;
        let models = R::EntityType::find()
            .order_by_asc(order)
            .offset(offset)
            .limit(limit)
            .all(session.conn())
            .await?;
        Ok(models.into_iter().map(R::from_model).collect())
    }

    /// Every row whose `filter_field` equals `filter_value`, ascending by `order_by`.
    ///
    /// # Errors
    ///
    /// As [`CrudEngine::get_first_by_filter`].
    pub async fn list_by_filter(
        &self,
        session: &Session,
        order_by: Option<&str>,
        filter_field: &str,
        filter_value: &JsonValue,
    ) -> Result<Vec<R>, CrudError> {
        tracing::info!(
            resource = R::RESOURCE_NAME_PLURAL,
            field = filter_field,
            "list_by_filter"
        );
        let order = self.order_column(order_by)?;
        let models = R::EntityType::find()
            .filter(self.equals(filter_field, filter_value)?)
            .order_by_asc(order)
            .all(session.conn())
            .await?;
        Ok(models.into_iter().map(R::from_model).collect())
    }

    /// Rows matching every filter. A bad filter fails before any query is sent.
    ///
    /// # Errors
    ///
    /// `UnknownField`, `UnsupportedOperator` or `InvalidFilterValue`, then store failures.
    pub async fn list_by_filter_set(
        &self,
        session: &Session,
        filters: &[FilterSpec],
    ) -> Result<Vec<R>, CrudError> {
        tracing::info!(
            resource = R::RESOURCE_NAME_PLURAL,
            filters = filters.len(),
            "list_by_filter_set"
        );
        let condition = filter::compose(&self.fields, filters)?;
        let models = R::EntityType::find()
            .filter(condition)
            .all(session.conn())
            .await?;
        Ok(models.into_iter().map(R::from_model).collect())
    }

    /// The matching row with the highest identifier. Entries with unrecognised operators
    /// are skipped.
    ///
    /// # Errors
    ///
    /// `UnknownField` or `InvalidFilterValue`, then store failures.
    pub async fn last_by_filters(
        &self,
        session: &Session,
        filters: &NamedFilters,
    ) -> Result<Option<R>, CrudError> {
        tracing::info!(
            resource = R::RESOURCE_NAME_SINGULAR,
            filters = filters.len(),
            "last_by_filters"
        );
        let condition = filter::compose_named(&self.fields, filters)?;
        let model = R::EntityType::find()
            .filter(condition)
            .order_by_desc(R::ID_COLUMN)
            .one(session.conn())
            .await?;
        Ok(model.map(R::from_model))
    }

    /// Number of rows matching every filter.
    ///
    /// # Errors
    ///
    /// As [`CrudEngine::list_by_filter_set`].
    pub async fn count(&self, session: &Session, filters: &[FilterSpec]) -> Result<u64, CrudError> {
        let condition = filter::compose(&self.fields, filters)?;
        let total = R::EntityType::find()
            .filter(condition)
            .count(session.conn())
            .await?;
        Ok(total)
    }

    /// Insert one row and return it as stored, generated identifier included.
    ///
    /// # Errors
    ///
    /// `ConstraintViolation` on a uniqueness or foreign-key conflict; the session stays
    /// usable because the insert runs in its own savepoint.
    pub async fn create(&self, session: &Session, input: R::CreateModel) -> Result<R, CrudError> {
        tracing::info!(resource = R::RESOURCE_NAME_SINGULAR, "create");
        let active: R::ActiveModelType = input.into();
        let savepoint = session.savepoint().await?;
        let result: Result<_, DbErr> = async {
            let inserted = R::EntityType::insert(active).exec(&savepoint).await?;
            R::EntityType::find_by_id(inserted.last_insert_id)
                .one(&savepoint)
                .await
        }
        .await;
        let model = settle(savepoint, result).await?;
        model.map(R::from_model).ok_or_else(|| {
            CrudError::Database(DbErr::RecordNotInserted)
        })
    }

    /// Insert every input in one statement: all rows or none.
    ///
    /// # Errors
    ///
    /// `ConstraintViolation` if any row conflicts, in which case nothing is inserted.
    pub async fn create_many(
        &self,
        session: &Session,
        inputs: Vec<R::CreateModel>,
    ) -> Result<BulkResult, CrudError> {
        tracing::info!(
            resource = R::RESOURCE_NAME_PLURAL,
            count = inputs.len(),
            "create_many"
        );
        if inputs.is_empty() {
            return Ok(BulkResult {
                inserted: 0,
                message: format!("No {} to insert", R::RESOURCE_NAME_PLURAL),
            });
        }
        let actives: Vec<R::ActiveModelType> = inputs.into_iter().map(Into::into).collect();
        let savepoint = session.savepoint().await?;
        let result = R::EntityType::insert_many(actives)
            .exec_without_returning(&savepoint)
            .await;
        let inserted = settle(savepoint, result).await?;
        Ok(BulkResult {
            inserted,
            message: format!("Inserted {inserted} {}", R::RESOURCE_NAME_PLURAL),
        })
    }

    /// Partial update of `existing`: only the fields the input carries change.
    ///
    /// # Errors
    ///
    /// `NotFound` if the row no longer exists, `UnknownField` or `Validation` for a bad
    /// partial map, `ConstraintViolation` on conflict.
    pub async fn update(
        &self,
        session: &Session,
        existing: R,
        input: UpdateInput<R::UpdateModel>,
    ) -> Result<R, CrudError> {
        let id = existing.primary_key();
        tracing::info!(resource = R::RESOURCE_NAME_SINGULAR, id, "update");
        let model = R::EntityType::find_by_id(id)
            .one(session.conn())
            .await?
            .ok_or_else(|| Self::not_found(id))?;

        let active = match input {
            UpdateInput::Model(update) => {
                update.merge_into_activemodel(model.into_active_model())?
            }
            UpdateInput::Partial(changes) => self.overlay(model, &changes)?,
        };

        let savepoint = session.savepoint().await?;
        let result: Result<_, DbErr> = async {
            if active.is_changed() {
                active.update(&savepoint).await?;
            }
            R::EntityType::find_by_id(id).one(&savepoint).await
        }
        .await;
        let updated = settle(savepoint, result).await?;
        updated.map(R::from_model).ok_or_else(|| Self::not_found(id))
    }

    /// Mark the keys of `changes` as set on an active model built from `model`.
    fn overlay(
        &self,
        model: R::Model,
        changes: &Map<String, JsonValue>,
    ) -> Result<R::ActiveModelType, CrudError> {
        let columns = changes
            .keys()
            .map(|key| self.fields.resolve(key))
            .collect::<Result<Vec<_>, _>>()?;

        let mut merged = serde_json::to_value(&model)
            .map_err(|err| CrudError::Validation(vec![err.to_string()]))?;
        if let JsonValue::Object(fields) = &mut merged {
            fields.extend(changes.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let patched: R::Model = serde_json::from_value(merged)
            .map_err(|err| CrudError::Validation(vec![err.to_string()]))?;

        let mut active = model.into_active_model();
        for column in columns {
            active.set(column, patched.get(column));
        }
        Ok(active)
    }

    /// Full-value update keyed on `key_field`.
    ///
    /// For each input, rows whose `key_field` equals the input's value for it are
    /// overwritten with every value the input carries, in a savepoint of their own. Inputs
    /// that match no row are skipped.
    ///
    /// # Errors
    ///
    /// `UnknownField` for `key_field` or a payload key, `InvalidArgument` for an input that
    /// lacks `key_field`. Inputs already applied stay applied.
    pub async fn update_many(
        &self,
        session: &Session,
        inputs: Vec<UpdateInput<R::UpdateModel>>,
        key_field: &str,
    ) -> Result<Vec<R>, CrudError> {
        tracing::info!(
            resource = R::RESOURCE_NAME_PLURAL,
            count = inputs.len(),
            key = key_field,
            "update_many"
        );
        self.fields.resolve(key_field)?;
        let mut updated = Vec::new();

        for input in inputs {
            let payload = match input {
                UpdateInput::Model(update) => match serde_json::to_value(&update) {
                    Ok(JsonValue::Object(map)) => map,
                    Ok(_) => {
                        return Err(CrudError::InvalidArgument(format!(
                            "{} update must serialize to an object",
                            R::RESOURCE_NAME_SINGULAR
                        )));
                    }
                    Err(err) => return Err(CrudError::Validation(vec![err.to_string()])),
                },
                UpdateInput::Partial(map) => map,
            };
            let key_value = payload.get(key_field).ok_or_else(|| {
                CrudError::InvalidArgument(format!("update is missing key field `{key_field}`"))
            })?;
            let key_predicate = self.equals(key_field, key_value)?;

            // the key is equal on every matched row already
            let assignments = payload
                .iter()
                .filter(|(name, _)| name.as_str() != key_field)
                .map(|(name, value)| {
                    Ok((self.fields.resolve(name)?, filter::to_value(name, value)?))
                })
                .collect::<Result<Vec<_>, CrudError>>()?;

            let matches = R::EntityType::find()
                .filter(key_predicate.clone())
                .all(session.conn())
                .await?;
            if matches.is_empty() {
                tracing::debug!(
                    resource = R::RESOURCE_NAME_SINGULAR,
                    key = key_field,
                    value = %key_value,
                    "No row for key, skipping"
                );
                continue;
            }
            if assignments.is_empty() {
                updated.extend(matches.into_iter().map(R::from_model));
                continue;
            }
            let ids: Vec<i32> = matches
                .into_iter()
                .map(|model| R::from_model(model).primary_key())
                .collect();

            let statement = assignments
                .into_iter()
                .fold(R::EntityType::update_many(), |update, (column, value)| {
                    update.col_expr(column, SimpleExpr::Value(value))
                })
                .filter(key_predicate);

            let savepoint = session.savepoint().await?;
            let result: Result<_, DbErr> = async {
                statement.exec(&savepoint).await?;
                R::EntityType::find()
                    .filter(R::ID_COLUMN.is_in(ids))
                    .order_by_asc(R::ID_COLUMN)
                    .all(&savepoint)
                    .await
            }
            .await;
            let rows = settle(savepoint, result).await?;
            updated.extend(rows.into_iter().map(R::from_model));
        }
        Ok(updated)
    }

    /// Delete one row and return it.
    ///
    /// # Errors
    ///
    /// `NotFound` if no row has this identifier.
    pub async fn remove(&self, session: &Session, id: i32) -> Result<R, CrudError> {
        tracing::info!(resource = R::RESOURCE_NAME_SINGULAR, id, "remove");
        let model = R::EntityType::find_by_id(id)
            .one(session.conn())
            .await?
            .ok_or_else(|| Self::not_found(id))?;
        R::EntityType::delete_by_id(id).exec(session.conn()).await?;
        Ok(R::from_model(model))
    }
}
