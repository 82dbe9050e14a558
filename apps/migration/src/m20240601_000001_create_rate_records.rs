use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RateRecords::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RateRecords::ClientKey).text().not_null())
                    .col(ColumnDef::new(RateRecords::Endpoint).text().not_null())
                    .col(
                        ColumnDef::new(RateRecords::Count)
                            .integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(RateRecords::Count).gte(0)),
                    )
                    .col(
                        ColumnDef::new(RateRecords::WindowStart)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(RateRecords::ClientKey)
                            .col(RateRecords::Endpoint),
                    )
                    .to_owned(),
            )
            .await?;

        // Used by the stale-record sweeper.
        manager
            .create_index(
                Index::create()
                    .name("idx_rate_records_window_start")
                    .table(RateRecords::Table)
                    .col(RateRecords::WindowStart)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RateRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum RateRecords {
    Table,
    ClientKey,
    Endpoint,
    Count,
    WindowStart,
}
