use anyhow::Context;
use rusqlite::Connection;

// Migrations are embedded so fresh and in-memory databases always get the
// full schema. Applied names are recorded in _migrations.
const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial_schema",
    "CREATE TABLE users (
         id TEXT PRIMARY KEY,
         email TEXT NOT NULL UNIQUE,
         name TEXT NOT NULL,
         role TEXT NOT NULL CHECK (role IN ('driver', 'host')),
         created_at TEXT NOT NULL DEFAULT (datetime('now'))
     );
     CREATE TABLE chargers (
         id TEXT PRIMARY KEY,
         host_id TEXT NOT NULL REFERENCES users(id),
         title TEXT NOT NULL,
         address TEXT NOT NULL,
         pincode TEXT NOT NULL,
         price_per_hour INTEGER NOT NULL,
         charger_type TEXT NOT NULL,
         power_output REAL NOT NULL,
         available_start TEXT NOT NULL,
         available_end TEXT NOT NULL,
         photo_url TEXT,
         status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'paused')),
         created_at TEXT NOT NULL DEFAULT (datetime('now'))
     );
     CREATE TABLE bookings (
         id TEXT PRIMARY KEY,
         charger_id TEXT NOT NULL REFERENCES chargers(id),
         driver_id TEXT NOT NULL REFERENCES users(id),
         booking_date TEXT NOT NULL,
         start_time TEXT NOT NULL,
         end_time TEXT NOT NULL,
         total_price INTEGER NOT NULL,
         status TEXT NOT NULL DEFAULT 'pending'
             CHECK (status IN ('pending', 'confirmed', 'completed', 'cancelled')),
         created_at TEXT NOT NULL DEFAULT (datetime('now'))
     );
     CREATE INDEX idx_bookings_charger_date ON bookings (charger_id, booking_date);
     CREATE INDEX idx_bookings_driver ON bookings (driver_id);",
)];

pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .context("failed to create migrations table")?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .context("failed to check migration status")?;

        if already_applied {
            continue;
        }

        conn.execute_batch(sql)
            .with_context(|| format!("failed to apply migration: {name}"))?;

        conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])
            .with_context(|| format!("failed to record migration: {name}"))?;

        tracing::info!("applied migration: {name}");
    }

    Ok(())
}
