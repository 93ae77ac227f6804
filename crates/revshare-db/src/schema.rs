//! SQL schema definitions.

/// Complete schema for the v1 ledger database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Splits
-- ============================================================

CREATE TABLE IF NOT EXISTS splits (
    split_id TEXT PRIMARY KEY,
    content_id TEXT NOT NULL,
    creator_id TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    version INTEGER NOT NULL DEFAULT 1,
    supersedes TEXT REFERENCES splits(split_id),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_splits_content ON splits(content_id);
CREATE INDEX IF NOT EXISTS idx_splits_creator ON splits(creator_id);

CREATE TABLE IF NOT EXISTS split_recipients (
    split_id TEXT NOT NULL REFERENCES splits(split_id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    recipient_id TEXT NOT NULL,
    share_bps INTEGER NOT NULL CHECK (share_bps BETWEEN 0 AND 10000),
    PRIMARY KEY (split_id, position),
    UNIQUE (split_id, recipient_id)
);

-- ============================================================
-- Transactions & Distributions
-- ============================================================

CREATE TABLE IF NOT EXISTS transactions (
    transaction_id TEXT PRIMARY KEY,
    sequence INTEGER NOT NULL UNIQUE,
    content_id TEXT NOT NULL,
    split_id TEXT NOT NULL REFERENCES splits(split_id),
    payer_id TEXT NOT NULL,
    gross_amount INTEGER NOT NULL,
    token_denomination TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('pending', 'completed', 'failed')),
    created_at INTEGER NOT NULL,
    settled_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_transactions_pending
    ON transactions(status) WHERE status = 'pending';

CREATE TABLE IF NOT EXISTS distributions (
    transaction_id TEXT NOT NULL REFERENCES transactions(transaction_id),
    position INTEGER NOT NULL,
    recipient_id TEXT NOT NULL,
    amount INTEGER NOT NULL,
    share_bps INTEGER NOT NULL,
    claimed INTEGER NOT NULL DEFAULT 0,
    claimed_at INTEGER,
    claim_id TEXT REFERENCES claims(claim_id),
    PRIMARY KEY (transaction_id, recipient_id)
);

CREATE INDEX IF NOT EXISTS idx_distributions_recipient ON distributions(recipient_id, claimed);

-- ============================================================
-- Claims
-- ============================================================

CREATE TABLE IF NOT EXISTS claims (
    claim_id TEXT PRIMARY KEY,
    recipient_id TEXT NOT NULL,
    requested_amount INTEGER NOT NULL,
    total_amount INTEGER NOT NULL,
    claimed_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_claims_recipient ON claims(recipient_id);

CREATE TABLE IF NOT EXISTS claim_transactions (
    claim_id TEXT NOT NULL REFERENCES claims(claim_id),
    position INTEGER NOT NULL,
    transaction_id TEXT NOT NULL REFERENCES transactions(transaction_id),
    PRIMARY KEY (claim_id, position)
);
"#;
