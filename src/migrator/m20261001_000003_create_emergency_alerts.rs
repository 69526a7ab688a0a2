use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EmergencyAlerts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmergencyAlerts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EmergencyAlerts::SiteId).uuid().not_null())
                    .col(ColumnDef::new(EmergencyAlerts::Type).string().not_null())
                    .col(ColumnDef::new(EmergencyAlerts::Latitude).double())
                    .col(ColumnDef::new(EmergencyAlerts::Longitude).double())
                    .col(
                        ColumnDef::new(EmergencyAlerts::Timestamp)
                            .date_time()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmergencyAlerts::Acknowledged)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_emergency_alerts_site")
                            .from(EmergencyAlerts::Table, EmergencyAlerts::SiteId)
                            .to(Sites::Table, Sites::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // History loads read newest-first
        manager
            .create_index(
                Index::create()
                    .name("idx_emergency_alerts_timestamp")
                    .table(EmergencyAlerts::Table)
                    .col(EmergencyAlerts::Timestamp)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_emergency_alerts_site_id")
                    .table(EmergencyAlerts::Table)
                    .col(EmergencyAlerts::SiteId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmergencyAlerts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum EmergencyAlerts {
    Table,
    Id,
    SiteId,
    Type,
    Latitude,
    Longitude,
    Timestamp,
    Acknowledged,
}

#[derive(DeriveIden)]
enum Sites {
    Table,
    Id,
}
