use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Billing identities. One auth user may own several profiles
        -- (founder who also mentors); incoming user ids are resolved to a
        -- profile before any subscription write.
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            auth_user_id TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('founder', 'mentor', 'investor')),
            country TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_profiles_auth ON profiles(auth_user_id);

        -- Application-side plan catalog
        CREATE TABLE IF NOT EXISTS plans (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            tier TEXT NOT NULL CHECK (tier IN ('free', 'basic', 'premium')),
            user_type TEXT NOT NULL,
            amount_minor INTEGER NOT NULL,
            currency TEXT NOT NULL,
            interval TEXT NOT NULL CHECK (interval IN ('monthly', 'yearly')),
            created_at INTEGER NOT NULL
        );

        -- Country-specific price overrides (fallback: plan base price)
        CREATE TABLE IF NOT EXISTS plan_prices (
            plan_id TEXT NOT NULL REFERENCES plans(id) ON DELETE CASCADE,
            country TEXT NOT NULL,
            amount_minor INTEGER NOT NULL,
            currency TEXT NOT NULL,
            UNIQUE(plan_id, country)
        );

        -- Gateway plan cache: one gateway-side plan per set of pricing terms.
        -- The UNIQUE constraint is what makes concurrent get-or-create safe:
        -- the loser of an insert race re-queries and adopts the winner's id.
        CREATE TABLE IF NOT EXISTS gateway_plan_cache (
            id TEXT PRIMARY KEY,
            gateway TEXT NOT NULL CHECK (gateway IN ('razorpay', 'paypal')),
            amount_minor INTEGER NOT NULL,
            currency TEXT NOT NULL,
            period TEXT NOT NULL CHECK (period IN ('monthly', 'yearly')),
            interval_count INTEGER NOT NULL,
            gateway_plan_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(gateway, amount_minor, currency, period, interval_count)
        );

        -- Subscriptions. History is preserved: superseded rows become
        -- 'inactive', never deleted.
        CREATE TABLE IF NOT EXISTS user_subscriptions (
            id TEXT PRIMARY KEY,
            profile_id TEXT NOT NULL REFERENCES profiles(id),
            plan_id TEXT NOT NULL REFERENCES plans(id),
            plan_tier TEXT NOT NULL CHECK (plan_tier IN ('free', 'basic', 'premium')),
            status TEXT NOT NULL CHECK (status IN ('active', 'inactive', 'cancelled', 'past_due')),
            current_period_start INTEGER NOT NULL,
            current_period_end INTEGER NOT NULL,
            amount_minor INTEGER NOT NULL,
            currency TEXT NOT NULL,
            interval TEXT NOT NULL CHECK (interval IN ('monthly', 'yearly')),
            autopay_enabled INTEGER NOT NULL DEFAULT 0,
            mandate_status TEXT NOT NULL CHECK (mandate_status IN ('active', 'pending', 'cancelled')),
            gateway TEXT NOT NULL CHECK (gateway IN ('razorpay', 'paypal')),
            gateway_subscription_id TEXT,
            billing_cycle_count INTEGER NOT NULL DEFAULT 0,
            total_paid_minor INTEGER NOT NULL DEFAULT 0,
            storage_used_mb INTEGER NOT NULL DEFAULT 0,
            country TEXT,
            previous_plan_tier TEXT,
            previous_subscription_id TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_subscriptions_profile ON user_subscriptions(profile_id);
        CREATE INDEX IF NOT EXISTS idx_subscriptions_gateway_sub ON user_subscriptions(gateway, gateway_subscription_id);
        -- At most one active subscription per profile. The deactivate+insert
        -- sequence also runs inside one transaction; this index is the
        -- constraint-level backstop.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_subscriptions_one_active
            ON user_subscriptions(profile_id) WHERE status = 'active';

        -- Immutable payment events. gateway_payment_id is unique per gateway,
        -- which is also the webhook redelivery dedupe point.
        CREATE TABLE IF NOT EXISTS payment_transactions (
            id TEXT PRIMARY KEY,
            profile_id TEXT NOT NULL REFERENCES profiles(id),
            subscription_id TEXT REFERENCES user_subscriptions(id),
            gateway TEXT NOT NULL CHECK (gateway IN ('razorpay', 'paypal')),
            gateway_order_id TEXT,
            gateway_payment_id TEXT NOT NULL,
            gateway_signature TEXT,
            amount_minor INTEGER NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending', 'success', 'failed', 'refunded')),
            payment_type TEXT NOT NULL CHECK (payment_type IN ('initial', 'recurring', 'upgrade', 'downgrade')),
            autopay INTEGER NOT NULL DEFAULT 0,
            plan_tier TEXT,
            created_at INTEGER NOT NULL,
            UNIQUE(gateway, gateway_payment_id)
        );
        CREATE INDEX IF NOT EXISTS idx_transactions_profile ON payment_transactions(profile_id);
        CREATE INDEX IF NOT EXISTS idx_transactions_subscription ON payment_transactions(subscription_id);
        CREATE INDEX IF NOT EXISTS idx_transactions_order ON payment_transactions(gateway, gateway_order_id);

        -- Billing cycles: gapless numbering from 1 per subscription.
        CREATE TABLE IF NOT EXISTS billing_cycles (
            id TEXT PRIMARY KEY,
            subscription_id TEXT NOT NULL REFERENCES user_subscriptions(id),
            cycle_number INTEGER NOT NULL,
            period_start INTEGER NOT NULL,
            period_end INTEGER NOT NULL,
            amount_minor INTEGER NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('paid', 'pending', 'failed')),
            transaction_id TEXT REFERENCES payment_transactions(id),
            created_at INTEGER NOT NULL,
            UNIQUE(subscription_id, cycle_number)
        );
        CREATE INDEX IF NOT EXISTS idx_cycles_subscription ON billing_cycles(subscription_id);

        -- One-time mentor engagement payments; disjoint from
        -- payment_transactions by design.
        CREATE TABLE IF NOT EXISTS mentor_payments (
            id TEXT PRIMARY KEY,
            assignment_id TEXT NOT NULL REFERENCES mentor_assignments(id),
            profile_id TEXT NOT NULL REFERENCES profiles(id),
            gateway TEXT NOT NULL CHECK (gateway IN ('razorpay', 'paypal')),
            gateway_order_id TEXT,
            gateway_payment_id TEXT,
            amount_minor INTEGER NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending', 'completed', 'failed')),
            created_at INTEGER NOT NULL,
            completed_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_mentor_payments_order ON mentor_payments(gateway, gateway_order_id);
        CREATE INDEX IF NOT EXISTS idx_mentor_payments_assignment ON mentor_payments(assignment_id);
        -- At most one completed payment drives an assignment's activation.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_mentor_payments_one_completed
            ON mentor_payments(assignment_id) WHERE status = 'completed';

        CREATE TABLE IF NOT EXISTS mentor_assignments (
            id TEXT PRIMARY KEY,
            mentor_profile_id TEXT NOT NULL REFERENCES profiles(id),
            startup_profile_id TEXT NOT NULL REFERENCES profiles(id),
            status TEXT NOT NULL CHECK (status IN ('pending', 'active', 'completed')),
            created_at INTEGER NOT NULL
        );

        -- Tier transition audit trail
        CREATE TABLE IF NOT EXISTS subscription_changes (
            id TEXT PRIMARY KEY,
            profile_id TEXT NOT NULL REFERENCES profiles(id),
            old_subscription_id TEXT NOT NULL REFERENCES user_subscriptions(id),
            new_subscription_id TEXT REFERENCES user_subscriptions(id),
            change_type TEXT NOT NULL CHECK (change_type IN ('upgrade', 'downgrade', 'autopay_stop')),
            from_tier TEXT NOT NULL,
            to_tier TEXT NOT NULL,
            from_amount_minor INTEGER NOT NULL,
            to_amount_minor INTEGER NOT NULL,
            period_start INTEGER NOT NULL,
            period_end INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_changes_profile ON subscription_changes(profile_id);

        -- Webhook replay dedupe
        CREATE TABLE IF NOT EXISTS webhook_events (
            id TEXT PRIMARY KEY,
            gateway TEXT NOT NULL,
            event_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(gateway, event_id)
        );
        "#,
    )?;
    Ok(())
}
