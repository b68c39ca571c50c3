use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, FromQueryResult,
    IntoActiveModel, ModelTrait, PrimaryKeyTrait,
};
use serde::{Serialize, de::DeserializeOwned};

use super::fields::FieldTable;
use crate::validation::Validatable;

/// Apply the fields an update payload carries to an existing active model.
pub trait MergeIntoActiveModel<ActiveModelType> {
    /// # Errors
    ///
    /// Implementations may reject values that cannot be stored.
    fn merge_into_activemodel(self, existing: ActiveModelType) -> Result<ActiveModelType, DbErr>;
}

/// Binds an API-facing resource type to its sea-orm entity and payload types.
///
/// The engine is generic over this trait: everything it needs to know about a resource
/// (table, columns, identifier, inbound payloads, field allow-lists) is declared here once.
pub trait CRUDResource: Serialize + Sized + Send + Sync + 'static {
    type EntityType: EntityTrait<
            Model = Self::Model,
            Column = Self::ColumnType,
            PrimaryKey = Self::PrimaryKeyType,
        > + Sync;
    type Model: ModelTrait<Entity = Self::EntityType>
        + FromQueryResult
        + IntoActiveModel<Self::ActiveModelType>
        + Serialize
        + DeserializeOwned
        + Clone
        + Send
        + Sync;
    type ColumnType: ColumnTrait + Copy + Send + Sync;
    type PrimaryKeyType: PrimaryKeyTrait<ValueType = i32>;
    type ActiveModelType: ActiveModelTrait<Entity = Self::EntityType>
        + ActiveModelBehavior
        + Send
        + Sync;
    type CreateModel: Into<Self::ActiveModelType> + DeserializeOwned + Validatable + Send;
    type UpdateModel: MergeIntoActiveModel<Self::ActiveModelType>
        + Serialize
        + DeserializeOwned
        + Validatable
        + Send
        + Sync;

    const ID_COLUMN: Self::ColumnType;
    const RESOURCE_NAME_SINGULAR: &'static str;
    const RESOURCE_NAME_PLURAL: &'static str;

    /// Payload keys accepted on create.
    const CREATE_FIELDS: &'static [&'static str];
    /// Payload keys accepted on update.
    const UPDATE_FIELDS: &'static [&'static str];

    fn from_model(model: Self::Model) -> Self;

    fn primary_key(&self) -> i32;

    /// Attribute names usable in filters, ordering and partial updates.
    #[must_use]
    fn field_table() -> FieldTable<Self::ColumnType> {
        FieldTable::from_entity_columns(Self::RESOURCE_NAME_SINGULAR)
    }
}
