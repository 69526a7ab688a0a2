use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Sites::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Sites::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Sites::CompanyName).string())
                    .col(ColumnDef::new(Sites::SiteName).string())
                    .col(ColumnDef::new(Sites::ContactName).string())
                    .col(ColumnDef::new(Sites::ContactPhone).string())
                    .col(
                        ColumnDef::new(Sites::EmergencyLinkId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Sites::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(Sites::CreatedAt).date_time().not_null())
                    .col(ColumnDef::new(Sites::UpdatedAt).date_time().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Sites::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Sites {
    Table,
    Id,
    CompanyName,
    SiteName,
    ContactName,
    ContactPhone,
    EmergencyLinkId,
    Status,
    CreatedAt,
    UpdatedAt,
}
