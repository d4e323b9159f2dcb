//! Connection bootstrap for a gateway.
//!
//! # Invariants
//! - Returned connections carry the configured pragmas.
//! - Returned connections have every supplied migration applied.

use super::migrations::{apply_migrations, Migration};
use super::DbResult;
use crate::config::{DatabaseTarget, GatewayConfig};
use log::{error, info};
use rusqlite::Connection;
use std::time::Instant;

/// Opens the database described by `config` and brings its schema up to date.
///
/// # Side effects
/// - Creates the database file when it does not exist.
/// - Emits `db_open` events with mode, status and duration.
pub fn open_connection(config: &GatewayConfig, migrations: &[Migration]) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = config.database.mode();
    info!(
        "event=db_open module=db status=start unit={} mode={}",
        config.persistence_unit, mode
    );

    let opened = match &config.database {
        DatabaseTarget::Memory => Connection::open_in_memory(),
        DatabaseTarget::File { path } => Connection::open(path),
    };
    let mut conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error unit={} mode={} duration_ms={} error_code=db_open_failed error={}",
                config.persistence_unit,
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, config, migrations) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok unit={} mode={} duration_ms={}",
                config.persistence_unit,
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error unit={} mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                config.persistence_unit,
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(
    conn: &mut Connection,
    config: &GatewayConfig,
    migrations: &[Migration],
) -> DbResult<()> {
    conn.pragma_update(None, "foreign_keys", config.foreign_keys)?;
    conn.busy_timeout(config.busy_timeout())?;
    apply_migrations(conn, migrations)?;
    Ok(())
}
