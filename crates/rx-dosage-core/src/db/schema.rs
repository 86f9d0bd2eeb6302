//! SQLite schema definition.

/// Complete database schema for the drug catalog.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Drug Catalog
-- ============================================================================

CREATE TABLE IF NOT EXISTS drugs (
    drug_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    form TEXT NOT NULL,                          -- DrugForm storage label
    bottle_size REAL CHECK (bottle_size IS NULL OR bottle_size > 0),
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_drugs_name ON drugs(name);
CREATE INDEX IF NOT EXISTS idx_drugs_active ON drugs(active);
"#;
