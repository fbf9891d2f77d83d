use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Users (viewers and creators; creator balance fields live here)
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            is_creator INTEGER NOT NULL DEFAULT 0,
            premium INTEGER NOT NULL DEFAULT 0,
            commission_percent INTEGER NOT NULL DEFAULT 70
                CHECK (commission_percent BETWEEN 0 AND 100),
            available_balance INTEGER NOT NULL DEFAULT 0 CHECK (available_balance >= 0),
            lifetime_earned INTEGER NOT NULL DEFAULT 0 CHECK (lifetime_earned >= 0),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
        CREATE INDEX IF NOT EXISTS idx_users_creators ON users(id) WHERE is_creator = 1;

        -- Content metadata (assets live on the external video host)
        CREATE TABLE IF NOT EXISTS content (
            id TEXT PRIMARY KEY,
            creator_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            published_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_content_creator ON content(creator_id);
        CREATE INDEX IF NOT EXISTS idx_content_published ON content(published_at);

        -- Subscriptions (one row per purchase/renewal attempt)
        CREATE TABLE IF NOT EXISTS subscriptions (
            id TEXT PRIMARY KEY,
            transaction_ref TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content_id TEXT REFERENCES content(id) ON DELETE SET NULL,
            plan TEXT NOT NULL CHECK (plan IN ('monthly', 'yearly')),
            amount_minor INTEGER NOT NULL CHECK (amount_minor >= 0),
            payment_status TEXT NOT NULL DEFAULT 'pending'
                CHECK (payment_status IN ('pending', 'approved', 'rejected', 'cancelled')),
            period_start INTEGER,
            period_end INTEGER,
            active INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_subscriptions_user ON subscriptions(user_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_subscriptions_ref ON subscriptions(transaction_ref);

        -- Webhook log (gateway-assigned id is the idempotency key)
        CREATE TABLE IF NOT EXISTS webhook_events (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL CHECK (kind IN ('gateway_a', 'gateway_b', 'other')),
            transaction_ref TEXT NOT NULL,
            raw_payload TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'received'
                CHECK (status IN ('received', 'processed', 'failed', 'pending_retry')),
            attempt INTEGER NOT NULL DEFAULT 0,
            max_attempts INTEGER NOT NULL DEFAULT 3,
            last_error TEXT,
            next_retry_at INTEGER,
            processed_at INTEGER,
            received_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_webhook_events_due
            ON webhook_events(next_retry_at) WHERE status = 'pending_retry';
        CREATE INDEX IF NOT EXISTS idx_webhook_events_ref ON webhook_events(transaction_ref);

        -- Commission ledger (one or more rows per approved payment)
        CREATE TABLE IF NOT EXISTS commissions (
            id TEXT PRIMARY KEY,
            creator_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            subscription_id TEXT NOT NULL REFERENCES subscriptions(id) ON DELETE CASCADE,
            content_id TEXT REFERENCES content(id) ON DELETE SET NULL,
            amount_minor INTEGER NOT NULL CHECK (amount_minor >= 0),
            applied_percent INTEGER NOT NULL CHECK (applied_percent BETWEEN 0 AND 100),
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'available', 'paid', 'cancelled')),
            generated_at INTEGER NOT NULL,
            available_at INTEGER,
            paid_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_commissions_subscription ON commissions(subscription_id);
        CREATE INDEX IF NOT EXISTS idx_commissions_creator ON commissions(creator_id, status);
        "#,
    )
}
