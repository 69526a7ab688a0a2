use sea_orm_migration::prelude::*;

mod m20261001_000001_create_sites;
mod m20261001_000002_create_operators;
mod m20261001_000003_create_emergency_alerts;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_sites::Migration),
            Box::new(m20261001_000002_create_operators::Migration),
            Box::new(m20261001_000003_create_emergency_alerts::Migration),
        ]
    }
}
