mod common;

use aggregate_repository::db::{latest_version, open_connection};
use aggregate_repository::{
    DbError, GatewayConfig, Migration, Repository, SqliteGateway, SqliteRepository,
};
use common::{User, MIGRATIONS};
use rusqlite::Connection;

#[test]
fn open_connection_applies_all_migrations() {
    let conn = open_connection(&GatewayConfig::in_memory(), MIGRATIONS).unwrap();

    assert_eq!(schema_version(&conn), latest_version(MIGRATIONS));
    assert_table_exists(&conn, "users");
    assert_table_exists(&conn, "products");
    assert_table_exists(&conn, "orders");

    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);
}

#[test]
fn foreign_keys_follow_config() {
    let config = GatewayConfig {
        foreign_keys: false,
        ..GatewayConfig::in_memory()
    };
    let conn = open_connection(&config, MIGRATIONS).unwrap();

    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 0);
}

#[test]
fn reopening_file_database_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = GatewayConfig::file(dir.path().join("aggregates.db"));

    let first = open_connection(&config, MIGRATIONS).unwrap();
    assert_eq!(schema_version(&first), latest_version(MIGRATIONS));
    drop(first);

    let second = open_connection(&config, MIGRATIONS).unwrap();
    assert_eq!(schema_version(&second), latest_version(MIGRATIONS));
    assert_table_exists(&second, "orders");
}

#[test]
fn database_newer_than_known_migrations_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = SqliteGateway::open(&GatewayConfig::file(&path), MIGRATIONS)
        .err()
        .unwrap();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version(MIGRATIONS));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unordered_migrations_are_rejected() {
    let unordered = [MIGRATIONS[1], MIGRATIONS[0]];
    let err = open_connection(&GatewayConfig::in_memory(), &unordered)
        .err()
        .unwrap();
    assert!(matches!(err, DbError::InvalidMigrationOrder { .. }));
}

#[tokio::test]
async fn committed_aggregates_survive_reopening_the_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let config = GatewayConfig::file(dir.path().join("durable.db"));

    let gateway = SqliteGateway::open(&config, MIGRATIONS).unwrap();
    let users = SqliteRepository::<User>::new(gateway);
    let user = User::new(users.next_identity(), 1);
    users.create(&user).await.unwrap();
    drop(users);

    let reopened = SqliteRepository::<User>::new(SqliteGateway::open(&config, MIGRATIONS).unwrap());
    assert_eq!(reopened.get(&user.id).await.unwrap(), Some(user));
}

#[test]
fn empty_migration_list_opens_empty_database() {
    let none: &[Migration] = &[];
    let conn = open_connection(&GatewayConfig::in_memory(), none).unwrap();
    assert_eq!(schema_version(&conn), 0);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
