use std::path::Path;

use rusqlite::Connection;
use tracing::info;

use shared_config::AppConfig;

/// Open a connection to the configured database. Every request opens its own
/// connection and releases it on drop, on all exit paths.
pub fn open(config: &AppConfig) -> rusqlite::Result<Connection> {
    let conn = Connection::open(&config.database_path)?;
    configure_pragmas(&conn)?;
    Ok(conn)
}

/// Startup entry point: make sure the database directory exists, open a
/// connection, and create any missing tables.
pub fn init(config: &AppConfig) -> rusqlite::Result<Connection> {
    if let Some(parent) = Path::new(&config.database_path).parent() {
        if !parent.as_os_str().is_empty() {
            // Matches Connection::open failing with CannotOpen otherwise.
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let conn = open(config)?;
    init_schema(&conn)?;
    info!("database ready at {}", config.database_path);
    Ok(conn)
}

fn configure_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

/// Idempotent table creation for the two persisted record types.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS reservations (
            id TEXT PRIMARY KEY,

            email TEXT NOT NULL,
            chart_number TEXT,
            referring_hospital TEXT,
            last_name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            last_name_kana TEXT,
            first_name_kana TEXT,
            birth_date TEXT NOT NULL,
            sex TEXT NOT NULL,

            first_choice_date TEXT NOT NULL,
            first_choice_time_slot TEXT NOT NULL,
            second_choice_date TEXT,
            second_choice_time_slot TEXT,
            third_choice_date TEXT,
            third_choice_time_slot TEXT,

            status TEXT NOT NULL DEFAULT 'pending',
            confirmed_datetime TEXT,
            staff_note TEXT,
            handled_by TEXT,

            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS staff_users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );",
    )
}
