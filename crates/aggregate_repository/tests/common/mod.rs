#![allow(dead_code)]

use aggregate_repository::{
    Aggregate, Entity, GatewayConfig, Migration, RepoResult, SqliteGateway, SqliteRepository,
};
use rusqlite::types::Value;
use rusqlite::Row;

pub const MIGRATIONS: &[Migration] = &[
    Migration::new(
        1,
        "CREATE TABLE users (
            id TEXT PRIMARY KEY NOT NULL,
            fullname TEXT NOT NULL,
            email TEXT NOT NULL
        );",
    ),
    Migration::new(
        2,
        "CREATE TABLE products (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            volume INTEGER NOT NULL CHECK (volume >= 0)
        );
        CREATE TABLE orders (
            id TEXT PRIMARY KEY NOT NULL,
            product_id TEXT NOT NULL REFERENCES products (id),
            volume INTEGER NOT NULL
        );",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub fullname: String,
    pub email: String,
}

impl User {
    pub fn new(id: impl Into<String>, index: usize) -> Self {
        Self {
            id: id.into(),
            fullname: format!("User-{index}"),
            email: format!("user-{index}@repo.test"),
        }
    }
}

impl Aggregate for User {
    type Id = String;

    fn id(&self) -> &String {
        &self.id
    }
}

impl Entity for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &["fullname", "email"];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.fullname.clone()),
            Value::Text(self.email.clone()),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            fullname: row.get("fullname")?,
            email: row.get("email")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub volume: i64,
}

impl Aggregate for Product {
    type Id = String;

    fn id(&self) -> &String {
        &self.id
    }
}

impl Entity for Product {
    const TABLE: &'static str = "products";
    const COLUMNS: &'static [&'static str] = &["name", "volume"];

    fn values(&self) -> Vec<Value> {
        vec![Value::Text(self.name.clone()), Value::Integer(self.volume)]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            volume: row.get("volume")?,
        })
    }
}

/// `volume = None` violates the NOT NULL constraint on `orders.volume`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: String,
    pub product_id: String,
    pub volume: Option<i64>,
}

impl Aggregate for Order {
    type Id = String;

    fn id(&self) -> &String {
        &self.id
    }
}

impl Entity for Order {
    const TABLE: &'static str = "orders";
    const COLUMNS: &'static [&'static str] = &["product_id", "volume"];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.product_id.clone()),
            self.volume.map_or(Value::Null, Value::Integer),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            product_id: row.get("product_id")?,
            volume: row.get("volume")?,
        })
    }
}

pub struct Store {
    pub gateway: SqliteGateway,
    pub users: SqliteRepository<User>,
    pub products: SqliteRepository<Product>,
    pub orders: SqliteRepository<Order>,
}

impl Store {
    pub fn on(gateway: SqliteGateway) -> Self {
        Self {
            users: SqliteRepository::new(gateway.clone()),
            products: SqliteRepository::new(gateway.clone()),
            orders: SqliteRepository::new(gateway.clone()),
            gateway,
        }
    }
}

pub fn open_gateway() -> SqliteGateway {
    SqliteGateway::open(&GatewayConfig::in_memory(), MIGRATIONS).unwrap()
}

pub fn open_store() -> Store {
    Store::on(open_gateway())
}
