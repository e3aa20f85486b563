use async_trait::async_trait;

use crate::{db_core::prelude::*, poller::StatusStore};

pub struct AppStatusCtrl;

impl AppStatusCtrl {
    const TABLE_PROBE: &'static str =
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'app_status'";

    const CREATE_TABLE: &'static str = "CREATE TABLE IF NOT EXISTS app_status (\
            app_id TEXT PRIMARY KEY,\
            is_full BOOLEAN NOT NULL\
        )";

    /// Create the status table if needed. Returns true iff the table did not
    /// exist before this call, which drives first-run notification
    /// suppression. Safe to call again; subsequent calls return false.
    pub async fn init_schema(conn: &DatabaseConnection) -> Result<bool, DbErr> {
        let existed = conn
            .query_one(Statement::from_string(
                DatabaseBackend::Sqlite,
                Self::TABLE_PROBE,
            ))
            .await?
            .is_some();

        conn.execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            Self::CREATE_TABLE,
        ))
        .await?;

        Ok(!existed)
    }

    pub async fn get(conn: &DatabaseConnection, app_id: &str) -> Result<Option<bool>, DbErr> {
        let row = AppStatus::find_by_id(app_id).one(conn).await?;
        Ok(row.map(|model| model.is_full))
    }

    /// Insert-or-replace the last-known status, a single atomic statement.
    pub async fn upsert(
        conn: &DatabaseConnection,
        app_id: &str,
        is_full: bool,
    ) -> Result<(), DbErr> {
        let model = app_status::ActiveModel {
            app_id: Set(app_id.to_string()),
            is_full: Set(is_full),
        };

        AppStatus::insert(model)
            .on_conflict(
                OnConflict::column(app_status::Column::AppId)
                    .update_column(app_status::Column::IsFull)
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;

        Ok(())
    }
}

/// Connection-owning wrapper so the poller can treat persistence as a seam.
#[derive(Clone)]
pub struct SqlStatusStore {
    conn: DatabaseConnection,
}

impl SqlStatusStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl StatusStore for SqlStatusStore {
    async fn last_known(&self, app_id: &str) -> Result<Option<bool>, DbErr> {
        AppStatusCtrl::get(&self.conn, app_id).await
    }

    async fn record(&self, app_id: &str, is_full: bool) -> Result<(), DbErr> {
        AppStatusCtrl::upsert(&self.conn, app_id, is_full).await
    }
}
