use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Executor;

use crate::config::Settings;
use crate::url;

/// Initializes the long-lived async connection pool off `settings.database_url_async`.
/// The migration runner never touches this pool; see `migrations::MigrationRunner`.
pub async fn init_pool(settings: &Settings) -> Result<PgPool, sqlx::Error> {
    let connect_url = url::to_sqlx_url(&settings.database_url_async)
        .map_err(|e| sqlx::Error::Configuration(e.to_string().into()))?;

    let statement_timeout_ms = settings.db_statement_timeout_ms;

    PgPoolOptions::new()
        .max_connections(settings.db_pool_size + settings.db_max_overflow)
        .min_connections(0)
        .acquire_timeout(settings.db_pool_timeout)
        .connect_timeout(settings.db_connect_timeout)
        .max_lifetime(settings.db_pool_recycle)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                if statement_timeout_ms > 0 {
                    conn.execute(format!("SET statement_timeout = {statement_timeout_ms}").as_str()).await?;
                }
                Ok(())
            })
        })
        .connect(&connect_url)
        .await
}
