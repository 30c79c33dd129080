//! Concurrency tests: refreshes, rebuilds and transfers racing on one session

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use queueinator_core::application::{BrowserConfig, BrowserSession, TransferMode};
use queueinator_core::domain::{
    Message, MessagePayload, MessageRef, NodeKey, QueueClass, QueueRef, TreeNode,
};
use queueinator_core::port::id_provider::UuidProvider;
use queueinator_core::port::time_provider::SystemTimeProvider;
use queueinator_core::port::{CatalogError, CatalogSource};
use queueinator_infra_sqlite::{create_pool, run_migrations, SqliteCatalog};
use tokio::sync::Notify;
use tokio::task::JoinSet;

/// SQLite catalog that can hold one queue enumeration until released
///
/// Queue lookups go through the trait's default `find_queue`, so they pass
/// the gate too.
struct GatedCatalog {
    inner: Arc<SqliteCatalog>,
    /// Class to hold and how many of its enumerations pass first
    armed: Mutex<Option<(QueueClass, usize)>>,
    reached: Notify,
    release: Notify,
}

impl GatedCatalog {
    fn new(inner: Arc<SqliteCatalog>) -> Self {
        Self {
            inner,
            armed: Mutex::new(None),
            reached: Notify::new(),
            release: Notify::new(),
        }
    }

    fn arm(&self, class: QueueClass, pass: usize) {
        *self.armed.lock().unwrap() = Some((class, pass));
    }

    fn should_hold(&self, class: QueueClass) -> bool {
        let mut armed = self.armed.lock().unwrap();
        let hold = match *armed {
            Some((c, 0)) if c == class => true,
            Some((c, ref mut pass)) if c == class => {
                *pass -= 1;
                false
            }
            _ => false,
        };
        if hold {
            *armed = None;
        }
        hold
    }
}

#[async_trait]
impl CatalogSource for GatedCatalog {
    fn host_name(&self) -> String {
        self.inner.host_name()
    }

    async fn list_queues(&self, class: QueueClass) -> Result<Vec<QueueRef>, CatalogError> {
        if self.should_hold(class) {
            self.reached.notify_one();
            self.release.notified().await;
        }
        self.inner.list_queues(class).await
    }

    async fn peek_messages(&self, queue: &QueueRef) -> Result<Vec<Message>, CatalogError> {
        self.inner.peek_messages(queue).await
    }

    async fn count_messages(&self, queue: &QueueRef) -> Result<u64, CatalogError> {
        self.inner.count_messages(queue).await
    }

    async fn send_message(
        &self,
        queue: &QueueRef,
        payload: &MessagePayload,
    ) -> Result<MessageRef, CatalogError> {
        self.inner.send_message(queue, payload).await
    }

    async fn delete_message(&self, queue: &QueueRef, id: &str) -> Result<(), CatalogError> {
        self.inner.delete_message(queue, id).await
    }

    async fn purge_queue(&self, queue: &QueueRef) -> Result<u64, CatalogError> {
        self.inner.purge_queue(queue).await
    }

    async fn create_queue(&self, class: QueueClass, name: &str) -> Result<QueueRef, CatalogError> {
        self.inner.create_queue(class, name).await
    }

    async fn delete_queue(&self, class: QueueClass, name: &str) -> Result<(), CatalogError> {
        self.inner.delete_queue(class, name).await
    }
}

async fn setup(queues: &[(&str, usize)]) -> (Arc<SqliteCatalog>, Arc<BrowserSession>) {
    let catalog = fill(queues).await;
    let session = Arc::new(BrowserSession::new(catalog.clone(), BrowserConfig::default()));
    session.build_hierarchy().await;
    (catalog, session)
}

async fn gated_setup(queues: &[(&str, usize)]) -> (Arc<GatedCatalog>, Arc<BrowserSession>) {
    let catalog = Arc::new(GatedCatalog::new(fill(queues).await));
    let session = Arc::new(BrowserSession::new(catalog.clone(), BrowserConfig::default()));
    session.build_hierarchy().await;
    (catalog, session)
}

async fn fill(queues: &[(&str, usize)]) -> Arc<SqliteCatalog> {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();

    let catalog = Arc::new(SqliteCatalog::new(
        pool,
        "localhost",
        Arc::new(UuidProvider),
        Arc::new(SystemTimeProvider),
    ));
    for (name, count) in queues {
        let queue = catalog.create_queue(QueueClass::Private, name).await.unwrap();
        for i in 0..*count {
            catalog
                .send_message(&queue, &MessagePayload::text(format!("{}#{}", name, i)))
                .await
                .unwrap();
        }
    }
    catalog
}

async fn live_count(catalog: &SqliteCatalog, name: &str) -> u64 {
    let queue = catalog
        .find_queue(QueueClass::Private, name)
        .await
        .unwrap()
        .unwrap();
    catalog.count_messages(&queue).await.unwrap()
}

async fn count_of(session: &BrowserSession, path: &str) -> u64 {
    session
        .node(&NodeKey::node(QueueClass::Private, path))
        .await
        .unwrap()
        .message_count
}

/// Every folder's count equals the sum of its children
fn assert_aggregates(node: &TreeNode) {
    if node.children.is_empty() {
        return;
    }
    let sum: u64 = node.children.iter().map(|c| c.message_count).sum();
    assert_eq!(node.message_count, sum, "aggregate of {}", node.path_prefix);
    node.children.iter().for_each(assert_aggregates);
}

#[tokio::test]
async fn test_concurrent_refreshes_converge() {
    let (catalog, session) = setup(&[("orders.eu", 3), ("orders.us", 2), ("orders", 1)]).await;
    let eu = catalog
        .find_queue(QueueClass::Private, "orders.eu")
        .await
        .unwrap()
        .unwrap();

    let keys = [
        NodeKey::node(QueueClass::Private, "orders"),
        NodeKey::node(QueueClass::Private, "orders.eu"),
        NodeKey::marker(QueueClass::Private, "orders"),
        NodeKey::class_root(QueueClass::Private),
        NodeKey::host(),
    ];

    let mut tasks = JoinSet::new();
    for i in 0..20 {
        let session = session.clone();
        let key = keys[i % keys.len()].clone();
        tasks.spawn(async move { session.refresh_node(&key).await.map(|_| ()) });

        if i % 4 == 0 {
            catalog
                .send_message(&eu, &MessagePayload::text("late"))
                .await
                .unwrap();
        }
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    session.refresh_node(&NodeKey::host()).await.unwrap();
    let tree = session.tree().await;
    assert_eq!(
        tree.find(&NodeKey::node(QueueClass::Private, "orders.eu"))
            .unwrap()
            .message_count,
        8
    );
    assert_eq!(tree.message_count, 11);
    assert_aggregates(&tree);
}

#[tokio::test]
async fn test_concurrent_moves_never_lose_messages() {
    let (_catalog, session) = setup(&[("inbox", 20), ("archive.a", 0), ("archive.b", 0)]).await;
    let inbox = NodeKey::node(QueueClass::Private, "inbox");
    let source = session.select(&inbox).await.unwrap();
    let targets = [
        session
            .select(&NodeKey::node(QueueClass::Private, "archive.a"))
            .await
            .unwrap(),
        session
            .select(&NodeKey::node(QueueClass::Private, "archive.b"))
            .await
            .unwrap(),
    ];
    let messages = session.peek_messages(&inbox).await.unwrap();

    let mut tasks = JoinSet::new();
    for (i, message) in messages.into_iter().enumerate() {
        let session = session.clone();
        let source = source.clone();
        let target = targets[i % 2].clone();
        tasks.spawn(async move {
            session
                .transfer(&message, &source, &target, TransferMode::Move)
                .await
                .map(|_| ())
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    let tree = session.tree().await;
    assert_eq!(tree.find(&inbox).unwrap().message_count, 0);
    let archive = tree
        .find(&NodeKey::node(QueueClass::Private, "archive"))
        .unwrap();
    assert_eq!(archive.message_count, 20);
    assert_eq!(archive.children[0].message_count, 10);
    assert_eq!(archive.children[1].message_count, 10);
    assert_aggregates(&tree);
}

#[tokio::test]
async fn test_rebuild_racing_with_refresh() {
    let (_catalog, session) = setup(&[("billing", 4), ("billing.retry", 2)]).await;
    let billing = NodeKey::node(QueueClass::Private, "billing");

    let mut tasks = JoinSet::new();
    for i in 0..10 {
        let session = session.clone();
        let key = billing.clone();
        tasks.spawn(async move {
            if i % 2 == 0 {
                session.build_hierarchy().await;
            } else {
                // the node may be mid-replacement; a miss is fine here
                let _ = session.refresh_node(&key).await;
            }
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    let tree = session.tree().await;
    assert_eq!(tree.find(&billing).unwrap().message_count, 6);
    assert_aggregates(&tree);
}

#[tokio::test]
async fn test_move_during_rebuild_survives_it() {
    let (catalog, session) = gated_setup(&[("orders.eu", 3), ("orders.us", 2)]).await;
    let eu = NodeKey::node(QueueClass::Private, "orders.eu");
    let source = session.select(&eu).await.unwrap();
    let target = session
        .select(&NodeKey::node(QueueClass::Private, "orders.us"))
        .await
        .unwrap();
    let message = session.peek_messages(&eu).await.unwrap().remove(0);

    // the rebuild has counted the private queues and waits on the next class
    catalog.arm(QueueClass::Public, 0);
    let rebuild = {
        let session = session.clone();
        tokio::spawn(async move { session.build_hierarchy().await })
    };
    catalog.reached.notified().await;

    session
        .transfer(&message, &source, &target, TransferMode::Move)
        .await
        .unwrap();
    catalog.release.notify_one();
    let rebuilt = rebuild.await.unwrap();

    assert_eq!(live_count(&catalog.inner, "orders.eu").await, 2);
    assert_eq!(live_count(&catalog.inner, "orders.us").await, 3);
    assert_eq!(count_of(&session, "orders.eu").await, 2);
    assert_eq!(count_of(&session, "orders.us").await, 3);
    assert_eq!(rebuilt.message_count, 5);
    assert_aggregates(&session.tree().await);
}

#[tokio::test]
async fn test_dropped_refresh_leaves_tree_unchanged() {
    let (catalog, session) = gated_setup(&[("billing", 4), ("billing.retry", 2)]).await;
    let billing = NodeKey::node(QueueClass::Private, "billing");
    let retry = catalog
        .inner
        .find_queue(QueueClass::Private, "billing.retry")
        .await
        .unwrap()
        .unwrap();
    catalog
        .inner
        .send_message(&retry, &MessagePayload::text("late"))
        .await
        .unwrap();
    let before = session.tree().await;

    catalog.arm(QueueClass::Private, 0);
    tokio::select! {
        _ = session.refresh_node(&billing) => panic!("refresh passed the gate"),
        _ = catalog.reached.notified() => {}
    }

    let after = session.tree().await;
    assert_eq!(after, before);
    assert_aggregates(&after);

    // the dropped refresh released its locks
    let outcome = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        session.refresh_node(&billing),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(outcome.message_count, 7);
}

#[tokio::test]
async fn test_dropped_transfer_refresh_keeps_aggregates() {
    let (catalog, session) = gated_setup(&[("inbox", 2), ("archive", 0)]).await;
    let inbox = NodeKey::node(QueueClass::Private, "inbox");
    let source = session.select(&inbox).await.unwrap();
    let target = session
        .select(&NodeKey::node(QueueClass::Private, "archive"))
        .await
        .unwrap();
    let message = session.peek_messages(&inbox).await.unwrap().remove(0);
    let before = session.tree().await;

    // both queue lookups pass; the refresh after the move is held
    catalog.arm(QueueClass::Private, 2);
    tokio::select! {
        _ = session.transfer(&message, &source, &target, TransferMode::Move) => {
            panic!("transfer passed the gate")
        }
        _ = catalog.reached.notified() => {}
    }

    // the move itself completed; the tree still shows the old counts
    assert_eq!(live_count(&catalog.inner, "inbox").await, 1);
    assert_eq!(live_count(&catalog.inner, "archive").await, 1);
    let after = session.tree().await;
    assert_eq!(after, before);
    assert_aggregates(&after);

    session
        .refresh_node(&NodeKey::class_root(QueueClass::Private))
        .await
        .unwrap();
    assert_eq!(count_of(&session, "inbox").await, 1);
    assert_eq!(count_of(&session, "archive").await, 1);
    assert_aggregates(&session.tree().await);
}
