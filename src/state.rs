use crate::{
    config::DbConfig,
    data::context::StudentContext,
    error::{MigrateSnafu, OpenDatabaseSnafu, StudentsResult},
};
use snafu::ResultExt;
use sqlx::SqlitePool;

#[derive(Clone, Debug)]
pub struct StudentsState {
    pool: SqlitePool,
}

impl StudentsState {
    pub async fn new(db_config: &DbConfig) -> StudentsResult<Self> {
        let pool = db_config
            .pool_options()
            .connect_with(db_config.connect_options()?)
            .await
            .context(OpenDatabaseSnafu)?;

        sqlx::migrate!().run(&pool).await.context(MigrateSnafu)?;
        info!(url = db_config.url(), in_memory = db_config.is_in_memory(), "Database ready");

        Ok(Self { pool })
    }

    /// A fresh unit of work; each request gets its own.
    pub fn context(&self) -> StudentContext {
        StudentContext::new(self.pool.clone())
    }

    pub async fn sensible_shutdown(&self) {
        self.pool.close().await;
    }
}
