//! Database module - PostgreSQL connection and migrations

use sqlx::{postgres::PgPoolOptions, PgPool};

/// Create database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Multi-statement script, so it goes over the simple query protocol
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await?;

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Database schema SQL
const SCHEMA_SQL: &str = r#"
-- Isolation events (append-only: latest row per agent is authoritative)
CREATE TABLE IF NOT EXISTS isolation_log (
    id BIGSERIAL PRIMARY KEY,
    agent_name VARCHAR(255) NOT NULL,
    isolated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    reason VARCHAR(500),
    status VARCHAR(50) NOT NULL DEFAULT 'ISOLATED',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Blocked message audit
CREATE TABLE IF NOT EXISTS blocked_messages (
    id BIGSERIAL PRIMARY KEY,
    sender VARCHAR(255) NOT NULL,
    recipient VARCHAR(255),
    score DOUBLE PRECISION NOT NULL,
    layers JSONB,
    blocked_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Behavioral baselines (one row per agent)
CREATE TABLE IF NOT EXISTS agent_baselines (
    id BIGSERIAL PRIMARY KEY,
    agent_name VARCHAR(255) NOT NULL UNIQUE,
    centroid TEXT,
    samples BIGINT NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Clean message audit (PASS / ESCALATE)
CREATE TABLE IF NOT EXISTS clean_messages (
    id BIGSERIAL PRIMARY KEY,
    sender VARCHAR(255),
    recipient VARCHAR(255),
    score DOUBLE PRECISION NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_isolation_agent ON isolation_log(agent_name, isolated_at DESC);
CREATE INDEX IF NOT EXISTS idx_isolation_status ON isolation_log(status);
CREATE INDEX IF NOT EXISTS idx_blocked_sender ON blocked_messages(sender, blocked_at DESC);
CREATE INDEX IF NOT EXISTS idx_blocked_at ON blocked_messages(blocked_at);
CREATE INDEX IF NOT EXISTS idx_clean_created ON clean_messages(created_at);
"#;
