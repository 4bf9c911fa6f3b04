//! Initial schema migration - creates all tables from scratch.
//!
//! Complete schema for Salvadanaio:
//!
//! - `users`: authentication
//! - `piggy_banks`: named money containers, optionally nested one level
//! - `transactions`: income/expense entries with audit metadata
//! - `budgets`: frozen per-period initial budget snapshots

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Users {
    Table,
    Username,
    Password,
}

#[derive(Iden)]
enum PiggyBanks {
    Table,
    Id,
    UserId,
    Name,
    CurrentBalanceMinor,
    GoalMinor,
    GoalDueDate,
    IsDefault,
    ParentId,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    UserId,
    PiggyBankId,
    Kind,
    AmountMinor,
    OccurredAt,
    Category,
    Note,
    Source,
    ExcludeFromDailySpent,
}

#[derive(Iden)]
enum Budgets {
    Table,
    Id,
    UserId,
    PeriodType,
    PeriodStart,
    InitialBudgetMinor,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Password).string().not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Piggy Banks
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(PiggyBanks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PiggyBanks::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PiggyBanks::UserId).string().not_null())
                    .col(ColumnDef::new(PiggyBanks::Name).string().not_null())
                    .col(
                        ColumnDef::new(PiggyBanks::CurrentBalanceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PiggyBanks::GoalMinor).big_integer())
                    .col(ColumnDef::new(PiggyBanks::GoalDueDate).date())
                    .col(
                        ColumnDef::new(PiggyBanks::IsDefault)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(PiggyBanks::ParentId).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-piggy_banks-user_id")
                            .from(PiggyBanks::Table, PiggyBanks::UserId)
                            .to(Users::Table, Users::Username),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-piggy_banks-parent_id")
                            .from(PiggyBanks::Table, PiggyBanks::ParentId)
                            .to(PiggyBanks::Table, PiggyBanks::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-piggy_banks-user_id-name-unique")
                    .table(PiggyBanks::Table)
                    .col(PiggyBanks::UserId)
                    .col(PiggyBanks::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-piggy_banks-parent_id")
                    .table(PiggyBanks::Table)
                    .col(PiggyBanks::ParentId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::UserId).string().not_null())
                    .col(ColumnDef::new(Transactions::PiggyBankId).string())
                    .col(ColumnDef::new(Transactions::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::OccurredAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Category).string())
                    .col(ColumnDef::new(Transactions::Note).string())
                    .col(ColumnDef::new(Transactions::Source).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::ExcludeFromDailySpent)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-user_id")
                            .from(Transactions::Table, Transactions::UserId)
                            .to(Users::Table, Users::Username),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-piggy_bank_id")
                            .from(Transactions::Table, Transactions::PiggyBankId)
                            .to(PiggyBanks::Table, PiggyBanks::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-user_id-occurred_at")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::OccurredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-piggy_bank_id")
                    .table(Transactions::Table)
                    .col(Transactions::PiggyBankId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Budgets
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Budgets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Budgets::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Budgets::UserId).string().not_null())
                    .col(ColumnDef::new(Budgets::PeriodType).string().not_null())
                    .col(ColumnDef::new(Budgets::PeriodStart).date().not_null())
                    .col(
                        ColumnDef::new(Budgets::InitialBudgetMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budgets-user_id")
                            .from(Budgets::Table, Budgets::UserId)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-budgets-period-unique")
                    .table(Budgets::Table)
                    .col(Budgets::UserId)
                    .col(Budgets::PeriodType)
                    .col(Budgets::PeriodStart)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(Budgets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PiggyBanks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
