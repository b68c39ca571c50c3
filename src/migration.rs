//! Schema migrations, run against the primary backend at start-up.

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateCarTable)]
    }
}

pub struct CreateCarTable;

impl MigrationName for CreateCarTable {
    fn name(&self) -> &'static str {
        "m20240101_000001_create_car_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateCarTable {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let table = Table::create()
            .table(Cars::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(Cars::Id)
                    .integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(ColumnDef::new(Cars::Model).string_len(255).not_null())
            .col(ColumnDef::new(Cars::Year).integer().not_null())
            .to_owned();

        manager.create_table(table).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Cars::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Cars {
    Table,
    Id,
    Model,
    Year,
}
