//! Move and copy between SQLite-backed queues
//!
//! Covers the write-then-delete contract, partial moves, batch stop rules
//! and the count changes the tree shows afterwards.

use std::sync::Arc;

use queueinator_core::application::{BrowserConfig, BrowserSession, ChangeKind, TransferMode};
use queueinator_core::domain::{Highlight, MessagePayload, NodeKey, QueueClass};
use queueinator_core::port::id_provider::UuidProvider;
use queueinator_core::port::time_provider::SystemTimeProvider;
use queueinator_core::port::CatalogSource;
use queueinator_core::TransferError;
use queueinator_infra_sqlite::{create_pool, run_migrations, SqliteCatalog};
use sqlx::SqlitePool;

struct Fixture {
    pool: SqlitePool,
    catalog: Arc<SqliteCatalog>,
    session: BrowserSession,
}

async fn setup() -> Fixture {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();

    let catalog = Arc::new(SqliteCatalog::new(
        pool.clone(),
        "localhost",
        Arc::new(UuidProvider),
        Arc::new(SystemTimeProvider),
    ));
    for (name, count) in [("inbox", 2), ("archive", 0)] {
        let queue = catalog.create_queue(QueueClass::Private, name).await.unwrap();
        for i in 0..count {
            let payload = MessagePayload {
                label: Some(format!("order {}", i)),
                extension: vec![i as u8],
                ..MessagePayload::text(format!("{}#{}", name, i))
            };
            catalog.send_message(&queue, &payload).await.unwrap();
        }
    }

    let session = BrowserSession::new(catalog.clone(), BrowserConfig::default());
    session.build_hierarchy().await;
    Fixture {
        pool,
        catalog,
        session,
    }
}

fn node(path: &str) -> NodeKey {
    NodeKey::node(QueueClass::Private, path)
}

async fn bodies(session: &BrowserSession, path: &str) -> Vec<String> {
    session
        .list_messages(&node(path))
        .await
        .unwrap()
        .into_iter()
        .map(|row| row.body)
        .collect()
}

#[tokio::test]
async fn test_copy_keeps_message_in_both_queues() {
    let fx = setup().await;
    let source = fx.session.select(&node("inbox")).await.unwrap();
    let target = fx.session.select(&node("archive")).await.unwrap();
    let message = fx.session.peek_messages(&node("inbox")).await.unwrap().remove(0);

    let outcome = fx
        .session
        .transfer(&message, &source, &target, TransferMode::Copy)
        .await
        .unwrap();

    assert_ne!(outcome.written.id, message.id, "transfers get fresh ids");
    assert_eq!(bodies(&fx.session, "inbox").await, vec!["inbox#0", "inbox#1"]);
    assert_eq!(bodies(&fx.session, "archive").await, vec!["inbox#0"]);

    // both queues are refreshed; only the target changed
    assert_eq!(outcome.refreshed.len(), 2);
    let kinds: Vec<(NodeKey, ChangeKind)> = outcome
        .refreshed
        .iter()
        .map(|o| (o.key.clone(), o.change.kind))
        .collect();
    assert!(kinds.contains(&(node("inbox"), ChangeKind::Unchanged)));
    assert!(kinds.contains(&(node("archive"), ChangeKind::Increased)));

    let copied = fx.session.peek_messages(&node("archive")).await.unwrap().remove(0);
    assert_eq!(copied.label.as_deref(), Some("order 0"));
    assert_eq!(copied.extension, vec![0]);
}

#[tokio::test]
async fn test_move_leaves_message_only_in_target() {
    let fx = setup().await;
    let source = fx.session.select(&node("inbox")).await.unwrap();
    let target = fx.session.select(&node("archive")).await.unwrap();
    let message = fx.session.peek_messages(&node("inbox")).await.unwrap().remove(0);

    let outcome = fx
        .session
        .transfer(&message, &source, &target, TransferMode::Move)
        .await
        .unwrap();

    assert_eq!(bodies(&fx.session, "inbox").await, vec!["inbox#1"]);
    assert_eq!(bodies(&fx.session, "archive").await, vec!["inbox#0"]);
    assert_eq!(outcome.refreshed.len(), 2);

    let tree = fx.session.tree().await;
    let inbox = tree.find(&node("inbox")).unwrap();
    let archive = tree.find(&node("archive")).unwrap();
    assert_eq!((inbox.message_count, inbox.highlight), (1, Highlight::Decreased));
    assert_eq!((archive.message_count, archive.highlight), (1, Highlight::Increased));
}

#[tokio::test]
async fn test_refused_delete_is_partial_move() {
    let fx = setup().await;
    let source = fx.session.select(&node("inbox")).await.unwrap();
    let target = fx.session.select(&node("archive")).await.unwrap();
    let message = fx.session.peek_messages(&node("inbox")).await.unwrap().remove(0);
    sqlx::query("UPDATE queues SET access_mode = 'PEEK' WHERE name = 'inbox'")
        .execute(&fx.pool)
        .await
        .unwrap();

    let err = fx
        .session
        .transfer(&message, &source, &target, TransferMode::Move)
        .await
        .unwrap_err();

    match &err {
        TransferError::PartialMove {
            message_id,
            written,
            ..
        } => {
            assert_eq!(message_id, &message.id);
            assert_eq!(written.queue.logical_name, "archive");
        }
        other => panic!("expected PartialMove, got {:?}", other),
    }
    assert_eq!(bodies(&fx.session, "inbox").await.len(), 2);
    assert_eq!(bodies(&fx.session, "archive").await, vec!["inbox#0"]);

    let tree = fx.session.tree().await;
    assert_eq!(tree.find(&node("archive")).unwrap().message_count, 1);
}

#[tokio::test]
async fn test_write_failure_leaves_source_untouched() {
    let fx = setup().await;
    let source = fx.session.select(&node("inbox")).await.unwrap();
    let target = fx
        .catalog
        .find_queue(QueueClass::System, "deadletter")
        .await
        .unwrap()
        .unwrap();
    let message = fx.session.peek_messages(&node("inbox")).await.unwrap().remove(0);

    let err = fx
        .session
        .transfer(&message, &source, &target, TransferMode::Move)
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Write { .. }));
    assert_eq!(bodies(&fx.session, "inbox").await.len(), 2);
}

#[tokio::test]
async fn test_dead_letter_moved_back_to_private_queue() {
    let fx = setup().await;
    sqlx::query(
        "INSERT INTO messages (id, queue_class, queue_name, body, arrived_at)
         VALUES ('dead-1', 'SYSTEM', 'deadletter', x'7374756b', 0)",
    )
    .execute(&fx.pool)
    .await
    .unwrap();
    fx.session.build_hierarchy().await;

    let dead = NodeKey::node(QueueClass::System, "deadletter");
    let source = fx.session.select(&dead).await.unwrap();
    let target = fx.session.select(&node("inbox")).await.unwrap();
    let message = fx.session.message(&dead, "dead-1").await.unwrap();

    fx.session
        .transfer(&message, &source, &target, TransferMode::Move)
        .await
        .unwrap();

    assert!(fx.session.peek_messages(&dead).await.unwrap().is_empty());
    assert_eq!(
        bodies(&fx.session, "inbox").await,
        vec!["inbox#0", "inbox#1", "stuk"]
    );
    assert_eq!(fx.session.tree().await.find(&dead).unwrap().message_count, 0);
}

#[tokio::test]
async fn test_batch_stops_at_first_failure() {
    let fx = setup().await;
    let source = fx.session.select(&node("inbox")).await.unwrap();
    let target = fx.session.select(&node("archive")).await.unwrap();
    let mut batch = fx.session.peek_messages(&node("inbox")).await.unwrap();
    let mut phantom = batch[0].clone();
    phantom.id = "already-gone".to_string();
    batch.insert(1, phantom);

    let report = fx
        .session
        .transfer_batch(&batch, &source, &target, TransferMode::Move)
        .await;

    assert_eq!(report.completed.len(), 1);
    assert!(report.failure.as_ref().unwrap().is_partial_move());
    assert_eq!(report.skipped, 1);
    assert_eq!(bodies(&fx.session, "inbox").await, vec!["inbox#1"]);
    assert_eq!(bodies(&fx.session, "archive").await, vec!["inbox#0", "inbox#0"]);
    assert_eq!(report.refreshed.len(), 2);
}

#[tokio::test]
async fn test_refresh_classifies_count_changes() {
    let fx = setup().await;
    let jobs = fx.catalog.create_queue(QueueClass::Public, "jobs").await.unwrap();
    for i in 0..5 {
        fx.catalog
            .send_message(&jobs, &MessagePayload::text(format!("job {}", i)))
            .await
            .unwrap();
    }
    fx.session.build_hierarchy().await;
    let key = NodeKey::node(QueueClass::Public, "jobs");

    let unchanged = fx.session.refresh_node(&key).await.unwrap();
    assert_eq!(unchanged.change.kind, ChangeKind::Unchanged);
    assert_eq!(unchanged.message_count, 5);

    for i in 5..8 {
        fx.catalog
            .send_message(&jobs, &MessagePayload::text(format!("job {}", i)))
            .await
            .unwrap();
    }
    let increased = fx.session.refresh_node(&key).await.unwrap();
    assert_eq!(increased.change.kind, ChangeKind::Increased);
    assert_eq!(
        (increased.previous_message_count, increased.message_count),
        (5, 8)
    );

    let messages = fx.catalog.peek_messages(&jobs).await.unwrap();
    for message in messages.iter().take(5) {
        fx.catalog.delete_message(&jobs, &message.id).await.unwrap();
    }
    let decreased = fx.session.refresh_node(&key).await.unwrap();
    assert_eq!(decreased.change.kind, ChangeKind::Decreased);
    assert_eq!(
        (decreased.previous_message_count, decreased.message_count),
        (8, 3)
    );
}
