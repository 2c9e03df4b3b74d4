//! Database access: connection setup, schema bootstrap, entities and the
//! ownership-scoped services built on top of them.

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};
use tracing::info;

use crate::db::entities::prelude::*;

pub mod entities;
pub mod services;

/// Opens a connection pool for `database_url`.
///
/// In-memory SQLite databases live only as long as their connection, so the
/// pool is pinned to a single connection for them.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    if is_in_memory(database_url) {
        opt.max_connections(1).min_connections(1);
    } else {
        opt.max_connections(10);
    }
    opt.sqlx_logging(false);

    Database::connect(opt).await
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

/// Creates every table that does not exist yet. Parent tables come first so
/// the link tables' foreign keys resolve.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, Tag).await?;
    create_table(db, &schema, Ingredient).await?;
    create_table(db, &schema, Recipe).await?;
    create_table(db, &schema, RecipeTag).await?;
    create_table(db, &schema, RecipeIngredient).await?;

    info!("Database schema is up to date.");
    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(db.get_database_backend().build(&statement)).await?;
    Ok(())
}
