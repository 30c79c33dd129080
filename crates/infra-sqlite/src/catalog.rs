// SQLite CatalogSource Implementation

use async_trait::async_trait;
use queueinator_core::domain::queue_name;
use queueinator_core::domain::{
    AccessMode, Message, MessagePayload, MessageRef, QueueClass, QueueRef, ResponseQueueInfo,
};
use queueinator_core::port::{CatalogError, CatalogSource, IdProvider, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, warn};

// Helper to convert sqlx::Error to CatalogError::Backend with structured information
fn map_sqlx_error(err: sqlx::Error) -> CatalogError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" => CatalogError::Backend(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "787" | "3850" => CatalogError::Backend(format!(
                        "Foreign key constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "5" => CatalogError::Backend(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => CatalogError::Backend(format!("Database full: {}", db_err.message())),
                    _ => CatalogError::Backend(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                CatalogError::Backend(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => CatalogError::Backend("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            CatalogError::Backend(format!("Column not found: {}", col))
        }
        _ => CatalogError::Backend(err.to_string()),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .is_some_and(|code| matches!(code.as_ref(), "2067" | "1555")),
        _ => false,
    }
}

/// Queue catalog stored in SQLite
///
/// Access modes are enforced from the stored queue row, not from the
/// `QueueRef` a caller passes in.
pub struct SqliteCatalog {
    pool: SqlitePool,
    host_name: String,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteCatalog {
    pub fn new(
        pool: SqlitePool,
        host_name: impl Into<String>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            pool,
            host_name: host_name.into(),
            id_provider,
            time_provider,
        }
    }

    /// Stored access mode of a queue, `None` if the queue does not exist
    async fn stored_mode(
        &self,
        class: QueueClass,
        name: &str,
    ) -> Result<Option<AccessMode>, CatalogError> {
        let mode: Option<String> =
            sqlx::query_scalar("SELECT access_mode FROM queues WHERE class = ? AND name = ?")
                .bind(class.to_string())
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(mode.map(|m| parse_access_mode(&m)))
    }

    /// Stored mode of an existing queue that must allow `allowed`
    async fn require_mode(
        &self,
        queue: &QueueRef,
        allowed: impl Fn(&AccessMode) -> bool,
    ) -> Result<AccessMode, CatalogError> {
        let mode = self
            .stored_mode(queue.class, &queue.logical_name)
            .await?
            .ok_or_else(|| CatalogError::NotFound(queue.logical_name.clone()))?;
        if !allowed(&mode) {
            return Err(CatalogError::AccessDenied(format!(
                "{} is opened {}",
                queue, mode
            )));
        }
        Ok(mode)
    }

    fn removal_allowed(mode: &AccessMode) -> bool {
        mode.can_receive() || mode.can_admin()
    }
}

fn parse_access_mode(raw: &str) -> AccessMode {
    raw.parse().unwrap_or_else(|_| {
        warn!(access_mode = raw, "Unknown stored access mode, treating as PEEK");
        AccessMode::Peek
    })
}

const MESSAGE_COLUMNS: &str = r#"
    m.id, m.label, m.body, m.extension, m.response_queue, m.arrived_at,
    (SELECT q.created_at FROM queues q WHERE q.name = m.response_queue
     ORDER BY q.class LIMIT 1) AS response_queue_created
"#;

#[async_trait]
impl CatalogSource for SqliteCatalog {
    fn host_name(&self) -> String {
        self.host_name.clone()
    }

    async fn list_queues(&self, class: QueueClass) -> Result<Vec<QueueRef>, CatalogError> {
        let rows = sqlx::query_as::<_, QueueRow>(
            "SELECT name, access_mode FROM queues WHERE class = ? ORDER BY name",
        )
        .bind(class.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CatalogError::Enumeration(map_sqlx_error(e).to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| QueueRef::new(row.name, class, parse_access_mode(&row.access_mode)))
            .collect())
    }

    async fn peek_messages(&self, queue: &QueueRef) -> Result<Vec<Message>, CatalogError> {
        self.require_mode(queue, AccessMode::can_peek).await?;

        let sql = format!(
            "SELECT {} FROM messages m WHERE m.queue_class = ? AND m.queue_name = ? ORDER BY m.seq",
            MESSAGE_COLUMNS
        );
        let rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(queue.class.to_string())
            .bind(&queue.logical_name)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    async fn peek_message(
        &self,
        queue: &QueueRef,
        id: &str,
    ) -> Result<Option<Message>, CatalogError> {
        self.require_mode(queue, AccessMode::can_peek).await?;

        let sql = format!(
            "SELECT {} FROM messages m WHERE m.queue_class = ? AND m.queue_name = ? AND m.id = ?",
            MESSAGE_COLUMNS
        );
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(queue.class.to_string())
            .bind(&queue.logical_name)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(MessageRow::into_message))
    }

    async fn count_messages(&self, queue: &QueueRef) -> Result<u64, CatalogError> {
        self.require_mode(queue, AccessMode::can_peek).await?;

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE queue_class = ? AND queue_name = ?",
        )
        .bind(queue.class.to_string())
        .bind(&queue.logical_name)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(count.max(0) as u64)
    }

    async fn send_message(
        &self,
        queue: &QueueRef,
        payload: &MessagePayload,
    ) -> Result<MessageRef, CatalogError> {
        let write_error = |reason: String| CatalogError::Write {
            queue: queue.logical_name.clone(),
            reason,
        };

        match self.stored_mode(queue.class, &queue.logical_name).await {
            Ok(Some(mode)) if mode.can_send() => {}
            Ok(Some(mode)) => return Err(write_error(format!("queue is opened {}", mode))),
            Ok(None) => return Err(write_error("queue does not exist".to_string())),
            Err(e) => return Err(write_error(e.to_string())),
        }

        let id = self.id_provider.generate_id();
        sqlx::query(
            r#"
            INSERT INTO messages (
                id, queue_class, queue_name, label, body, extension, response_queue, arrived_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(queue.class.to_string())
        .bind(&queue.logical_name)
        .bind(&payload.label)
        .bind(&payload.body)
        .bind(&payload.extension)
        .bind(&payload.response_queue)
        .bind(self.time_provider.now_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(map_sqlx_error(e).to_string()))?;

        debug!(queue = %queue, message_id = %id, "Message stored");

        Ok(MessageRef {
            queue: queue.clone(),
            id,
        })
    }

    async fn delete_message(&self, queue: &QueueRef, id: &str) -> Result<(), CatalogError> {
        let delete_error = |reason: String| CatalogError::Delete {
            queue: queue.logical_name.clone(),
            id: id.to_string(),
            reason,
        };

        self.require_mode(queue, Self::removal_allowed)
            .await
            .map_err(|e| delete_error(e.to_string()))?;

        let result =
            sqlx::query("DELETE FROM messages WHERE queue_class = ? AND queue_name = ? AND id = ?")
                .bind(queue.class.to_string())
                .bind(&queue.logical_name)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| delete_error(map_sqlx_error(e).to_string()))?;

        if result.rows_affected() == 0 {
            return Err(delete_error("message not found".to_string()));
        }
        Ok(())
    }

    async fn purge_queue(&self, queue: &QueueRef) -> Result<u64, CatalogError> {
        self.require_mode(queue, Self::removal_allowed).await?;

        let result = sqlx::query("DELETE FROM messages WHERE queue_class = ? AND queue_name = ?")
            .bind(queue.class.to_string())
            .bind(&queue.logical_name)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn create_queue(
        &self,
        class: QueueClass,
        name: &str,
    ) -> Result<QueueRef, CatalogError> {
        if !class.is_managed() {
            return Err(CatalogError::Unsupported(format!(
                "cannot create queues in {}",
                class
            )));
        }
        if !queue_name::is_canonical(name) {
            return Err(CatalogError::InvalidName(name.to_string()));
        }

        let mode = AccessMode::SendAndReceive;
        sqlx::query("INSERT INTO queues (class, name, access_mode, created_at) VALUES (?, ?, ?, ?)")
            .bind(class.to_string())
            .bind(name)
            .bind(mode.to_string())
            .bind(self.time_provider.now_millis())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CatalogError::AlreadyExists(name.to_string())
                } else {
                    map_sqlx_error(e)
                }
            })?;

        Ok(QueueRef::new(name, class, mode))
    }

    async fn delete_queue(&self, class: QueueClass, name: &str) -> Result<(), CatalogError> {
        if !class.is_managed() {
            return Err(CatalogError::Unsupported(format!(
                "cannot delete queues in {}",
                class
            )));
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM messages WHERE queue_class = ? AND queue_name = ?")
            .bind(class.to_string())
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let result = sqlx::query("DELETE FROM queues WHERE class = ? AND name = ?")
            .bind(class.to_string())
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(name.to_string()));
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct QueueRow {
    name: String,
    access_mode: String,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    label: Option<String>,
    body: Vec<u8>,
    extension: Vec<u8>,
    response_queue: Option<String>,
    arrived_at: i64,
    response_queue_created: Option<i64>,
}

impl MessageRow {
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            label: self.label,
            body: self.body,
            extension: self.extension,
            response_queue: self.response_queue.map(|name| ResponseQueueInfo {
                name,
                created_at: self.response_queue_created,
            }),
            arrived_at: self.arrived_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use queueinator_core::port::id_provider::SequentialIdProvider;
    use queueinator_core::port::time_provider::FixedTimeProvider;
    use tokio_test::assert_ok;

    async fn setup_catalog() -> SqliteCatalog {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteCatalog::new(
            pool,
            "localhost",
            Arc::new(SequentialIdProvider::new("m")),
            Arc::new(FixedTimeProvider(1_700_000_000_000)),
        )
    }

    #[tokio::test]
    async fn test_system_queues_seeded() {
        let catalog = setup_catalog().await;

        let queues = catalog.list_queues(QueueClass::System).await.unwrap();
        let names: Vec<_> = queues.iter().map(|q| q.logical_name.as_str()).collect();

        assert_eq!(names, vec!["deadletter", "deadxact"]);
        assert!(queues.iter().all(|q| q.access_mode == AccessMode::PeekAndAdmin));
    }

    #[tokio::test]
    async fn test_create_send_and_peek() {
        let catalog = setup_catalog().await;
        let queue = catalog
            .create_queue(QueueClass::Private, "orders.eu")
            .await
            .unwrap();
        catalog.create_queue(QueueClass::Private, "replies").await.unwrap();

        let payload = MessagePayload {
            label: Some("order 7".to_string()),
            body: b"{\"id\":7}".to_vec(),
            extension: vec![9],
            response_queue: Some("replies".to_string()),
        };
        let written = catalog.send_message(&queue, &payload).await.unwrap();
        assert_eq!(written.id, "m-1");

        let messages = catalog.peek_messages(&queue).await.unwrap();
        assert_eq!(messages.len(), 1);
        let message = &messages[0];
        assert_eq!(message.label.as_deref(), Some("order 7"));
        assert_eq!(message.extension, vec![9]);
        assert_eq!(message.arrived_at, 1_700_000_000_000);
        let response = message.response_queue.as_ref().unwrap();
        assert_eq!(response.name, "replies");
        assert_eq!(response.created_at, Some(1_700_000_000_000));

        assert_eq!(catalog.count_messages(&queue).await.unwrap(), 1);
        assert!(catalog.peek_message(&queue, "m-1").await.unwrap().is_some());
        assert!(catalog.peek_message(&queue, "m-9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_peek_order_is_arrival_order() {
        let catalog = setup_catalog().await;
        let queue = catalog.create_queue(QueueClass::Public, "jobs").await.unwrap();
        for body in ["first", "second", "third"] {
            catalog
                .send_message(&queue, &MessagePayload::text(body))
                .await
                .unwrap();
        }

        let bodies: Vec<_> = catalog
            .peek_messages(&queue)
            .await
            .unwrap()
            .into_iter()
            .map(|m| String::from_utf8(m.body).unwrap())
            .collect();
        assert_eq!(bodies, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_duplicate_queue_rejected() {
        let catalog = setup_catalog().await;
        catalog.create_queue(QueueClass::Private, "a").await.unwrap();

        let err = catalog
            .create_queue(QueueClass::Private, "a")
            .await
            .unwrap_err();
        assert_eq!(err, CatalogError::AlreadyExists("a".to_string()));

        // same name in another class is a different queue
        catalog.create_queue(QueueClass::Public, "a").await.unwrap();
    }

    #[tokio::test]
    async fn test_non_canonical_name_rejected() {
        let catalog = setup_catalog().await;
        catalog.create_queue(QueueClass::Private, "a.b").await.unwrap();

        for name in ["a..b", ".a.b", "a.b.", ""] {
            let err = catalog
                .create_queue(QueueClass::Private, name)
                .await
                .unwrap_err();
            assert_eq!(err, CatalogError::InvalidName(name.to_string()));
        }
        assert_eq!(catalog.list_queues(QueueClass::Private).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_system_class_is_read_only() {
        let catalog = setup_catalog().await;

        let err = catalog
            .create_queue(QueueClass::System, "mine")
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Unsupported(_)));

        let deadletter = catalog
            .find_queue(QueueClass::System, "deadletter")
            .await
            .unwrap()
            .unwrap();
        let err = catalog
            .send_message(&deadletter, &MessagePayload::text("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Write { .. }));
    }

    #[tokio::test]
    async fn test_delete_message_and_missing_id() {
        let catalog = setup_catalog().await;
        let queue = catalog.create_queue(QueueClass::Private, "q").await.unwrap();
        let written = catalog
            .send_message(&queue, &MessagePayload::text("x"))
            .await
            .unwrap();

        catalog.delete_message(&queue, &written.id).await.unwrap();
        assert_eq!(catalog.count_messages(&queue).await.unwrap(), 0);

        let err = catalog.delete_message(&queue, &written.id).await.unwrap_err();
        assert!(matches!(err, CatalogError::Delete { .. }));
    }

    #[tokio::test]
    async fn test_peek_only_queue_refuses_delete() {
        let catalog = setup_catalog().await;
        let queue = catalog.create_queue(QueueClass::Private, "audit").await.unwrap();
        let written = catalog
            .send_message(&queue, &MessagePayload::text("x"))
            .await
            .unwrap();
        sqlx::query("UPDATE queues SET access_mode = 'PEEK' WHERE name = 'audit'")
            .execute(&catalog.pool)
            .await
            .unwrap();

        let err = catalog.delete_message(&queue, &written.id).await.unwrap_err();
        assert!(matches!(err, CatalogError::Delete { .. }));
        assert_eq!(catalog.count_messages(&queue).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_and_delete_queue() {
        let catalog = setup_catalog().await;
        let queue = catalog.create_queue(QueueClass::Private, "q").await.unwrap();
        for _ in 0..3 {
            catalog
                .send_message(&queue, &MessagePayload::text("x"))
                .await
                .unwrap();
        }

        assert_eq!(assert_ok!(catalog.purge_queue(&queue).await), 3);
        assert_ok!(
            catalog
                .send_message(&queue, &MessagePayload::text("y"))
                .await
        );

        assert_ok!(catalog.delete_queue(QueueClass::Private, "q").await);
        assert!(catalog.list_queues(QueueClass::Private).await.unwrap().is_empty());

        let err = catalog
            .delete_queue(QueueClass::Private, "q")
            .await
            .unwrap_err();
        assert_eq!(err, CatalogError::NotFound("q".to_string()));
    }

    #[tokio::test]
    async fn test_send_to_missing_queue_is_write_error() {
        let catalog = setup_catalog().await;
        let ghost = QueueRef::new("ghost", QueueClass::Private, AccessMode::SendAndReceive);

        let err = catalog
            .send_message(&ghost, &MessagePayload::text("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Write { .. }));
    }
}
