//! Initial schema: chart of accounts, ledger entries, posting batches.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(INITIAL_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const INITIAL_SQL: &str = r"
-- Enum types
CREATE TYPE account_category AS ENUM ('asset', 'liability', 'equity', 'revenue', 'expense');
CREATE TYPE ledger_type AS ENUM ('cash_in', 'cash_out', 'other');
CREATE TYPE posting_status AS ENUM ('pending', 'posted');

-- Top-level chart of accounts
CREATE TABLE general_accounts (
    id UUID PRIMARY KEY,
    account_number VARCHAR(20) NOT NULL UNIQUE,
    account_name VARCHAR(255) NOT NULL,
    category account_category NOT NULL,
    balance_debit NUMERIC(18,2) NOT NULL DEFAULT 0,
    balance_credit NUMERIC(18,2) NOT NULL DEFAULT 0,
    deleted_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_general_balance_debit_non_negative CHECK (balance_debit >= 0),
    CONSTRAINT chk_general_balance_credit_non_negative CHECK (balance_credit >= 0)
);

-- Child accounts; where ledger entries post
CREATE TABLE detail_accounts (
    id UUID PRIMARY KEY,
    account_number VARCHAR(20) NOT NULL UNIQUE,
    account_name VARCHAR(255) NOT NULL,
    general_account_number VARCHAR(20) NOT NULL REFERENCES general_accounts(account_number),
    category account_category NOT NULL,
    balance_debit NUMERIC(18,2) NOT NULL DEFAULT 0,
    balance_credit NUMERIC(18,2) NOT NULL DEFAULT 0,
    deleted_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_detail_balance_debit_non_negative CHECK (balance_debit >= 0),
    CONSTRAINT chk_detail_balance_credit_non_negative CHECK (balance_credit >= 0)
);

CREATE INDEX idx_detail_accounts_parent ON detail_accounts(general_account_number) WHERE deleted_at IS NULL;

-- Ledger line items. transaction_type stays VARCHAR: legacy rows carry
-- non-canonical spellings that the application normalizes on read.
CREATE TABLE ledger_entries (
    id UUID PRIMARY KEY,
    reference_number VARCHAR(50),
    amount NUMERIC(18,2) NOT NULL,
    description TEXT NOT NULL,
    transaction_type VARCHAR(10) NOT NULL,
    ledger_type ledger_type NOT NULL,
    ledger_date DATE NOT NULL,
    posting_status posting_status NOT NULL DEFAULT 'pending',
    detail_account_id UUID NOT NULL REFERENCES detail_accounts(id),
    posted_at TIMESTAMPTZ,
    posted_by UUID,
    deleted_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_entry_amount_positive CHECK (amount > 0),
    CONSTRAINT chk_posted_fields CHECK (
        (posting_status = 'posted' AND posted_at IS NOT NULL)
        OR (posting_status = 'pending' AND posted_at IS NULL AND posted_by IS NULL)
    )
);

-- Pending selection for a close is the hot path
CREATE INDEX idx_ledger_entries_pending ON ledger_entries(ledger_date)
    WHERE deleted_at IS NULL AND posting_status = 'pending';

CREATE INDEX idx_ledger_entries_posted_date ON ledger_entries(ledger_date)
    WHERE deleted_at IS NULL AND posting_status = 'posted';

CREATE INDEX idx_ledger_entries_account ON ledger_entries(detail_account_id, ledger_date)
    WHERE deleted_at IS NULL;

-- One row per closed ledger date; the unique index is the idempotency guard
CREATE TABLE posting_batches (
    id UUID PRIMARY KEY,
    batch_date DATE NOT NULL,
    closed_at TIMESTAMPTZ NOT NULL,
    closed_by UUID NOT NULL,
    entry_count BIGINT NOT NULL,
    total_debit NUMERIC(18,2) NOT NULL,
    total_credit NUMERIC(18,2) NOT NULL,
    CONSTRAINT chk_batch_entry_count_non_negative CHECK (entry_count >= 0),
    CONSTRAINT chk_batch_totals_non_negative CHECK (total_debit >= 0 AND total_credit >= 0)
);

CREATE UNIQUE INDEX idx_posting_batches_date ON posting_batches(batch_date);
";

const DROP_SQL: &str = r"
DROP TABLE IF EXISTS posting_batches CASCADE;
DROP TABLE IF EXISTS ledger_entries CASCADE;
DROP TABLE IF EXISTS detail_accounts CASCADE;
DROP TABLE IF EXISTS general_accounts CASCADE;
DROP TYPE IF EXISTS posting_status;
DROP TYPE IF EXISTS ledger_type;
DROP TYPE IF EXISTS account_category;
";
