use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::core::{CRUDResource, MergeIntoActiveModel};
use crate::validation::{Validatable, ValidationErrors, validators};

const MODEL_MAX_LEN: usize = 255;
const FIRST_YEAR: i32 = 1886;
const LAST_YEAR: i32 = 2100;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "cars")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub model: String,
    pub year: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// A car as returned by the API.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Car {
    pub id: i32,
    pub model: String,
    pub year: i32,
}

impl From<Model> for Car {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            model: model.model,
            year: model.year,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CarCreate {
    pub model: String,
    pub year: i32,
}

impl From<CarCreate> for ActiveModel {
    fn from(create: CarCreate) -> Self {
        Self {
            id: ActiveValue::NotSet,
            model: ActiveValue::Set(create.model),
            year: ActiveValue::Set(create.year),
        }
    }
}

impl Validatable for CarCreate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_model(&mut errors, &self.model);
        check_year(&mut errors, self.year);
        errors.result()
    }
}

/// Update payload. Absent fields are left alone by a partial update and written as null by
/// a keyed bulk update.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct CarUpdate {
    pub model: Option<String>,
    pub year: Option<i32>,
}

impl MergeIntoActiveModel<ActiveModel> for CarUpdate {
    fn merge_into_activemodel(self, mut existing: ActiveModel) -> Result<ActiveModel, DbErr> {
        if let Some(model) = self.model {
            existing.model = ActiveValue::Set(model);
        }
        if let Some(year) = self.year {
            existing.year = ActiveValue::Set(year);
        }
        Ok(existing)
    }
}

impl Validatable for CarUpdate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(model) = &self.model {
            check_model(&mut errors, model);
        }
        if let Some(year) = self.year {
            check_year(&mut errors, year);
        }
        errors.result()
    }
}

fn check_model(errors: &mut ValidationErrors, model: &str) {
    errors.check(
        validators::validate_required("model", model)
            .and_then(|()| validators::validate_length("model", model, None, Some(MODEL_MAX_LEN))),
    );
}

fn check_year(errors: &mut ValidationErrors, year: i32) {
    errors.check(validators::validate_range(
        "year",
        year,
        Some(FIRST_YEAR),
        Some(LAST_YEAR),
    ));
}

impl CRUDResource for Car {
    type EntityType = Entity;
    type Model = Model;
    type ColumnType = Column;
    type PrimaryKeyType = PrimaryKey;
    type ActiveModelType = ActiveModel;
    type CreateModel = CarCreate;
    type UpdateModel = CarUpdate;

    const ID_COLUMN: Self::ColumnType = Column::Id;
    const RESOURCE_NAME_SINGULAR: &'static str = "car";
    const RESOURCE_NAME_PLURAL: &'static str = "cars";

    const CREATE_FIELDS: &'static [&'static str] = &["model", "year"];
    const UPDATE_FIELDS: &'static [&'static str] = &["model", "year"];

    fn from_model(model: Model) -> Self {
        model.into()
    }

    fn primary_key(&self) -> i32 {
        self.id
    }
}
