use std::time::Duration;

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema,
};
use tracing::info;

use crate::config::AppConfig;
use crate::entities::{cart, cart_item, customer_address, order, order_item, order_status_update, product};

pub type DbPool = DatabaseConnection;

/// Establishes the database connection with pool tuning from config.
pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opts = ConnectOptions::new(database_url.to_string());
    opts.max_connections(20)
        .min_connections(2)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(false);

    Database::connect(opts).await
}

pub async fn establish_connection_from_app_config(
    cfg: &AppConfig,
) -> Result<DatabaseConnection, DbErr> {
    establish_connection(&cfg.database_url).await
}

/// Creates any missing tables from the entity definitions. The storage
/// needs of this service are small enough that bootstrap-from-entity
/// replaces a migration tree; production schemas are managed externally.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    macro_rules! create {
        ($entity:expr) => {{
            let mut stmt = schema.create_table_from_entity($entity);
            stmt.if_not_exists();
            db.execute(backend.build(&stmt)).await?;
        }};
    }

    create!(product::Entity);
    create!(cart::Entity);
    create!(cart_item::Entity);
    create!(customer_address::Entity);
    create!(order::Entity);
    create!(order_item::Entity);
    create!(order_status_update::Entity);

    info!("database schema ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // The sqlite backend caps decimal precision at 16; the entity
    // column types must stay creatable on both backends.
    #[tokio::test]
    async fn schema_bootstraps_on_sqlite() {
        let db = establish_connection("sqlite::memory:").await.unwrap();
        ensure_schema(&db).await.unwrap();
        // Idempotent thanks to IF NOT EXISTS.
        ensure_schema(&db).await.unwrap();
    }
}
