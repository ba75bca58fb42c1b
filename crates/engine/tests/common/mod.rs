#![allow(dead_code)]

use std::sync::Arc;

use sea_orm::Database;

use engine::{Engine, EngineConfig, ExpenseExtractor, GroupCmd, GroupKind, User};
use migration::MigratorTrait;

pub async fn engine_with(
    config: EngineConfig,
    extractor: Option<Arc<dyn ExpenseExtractor>>,
) -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let mut builder = Engine::builder().database(db).config(config);
    if let Some(extractor) = extractor {
        builder = builder.extractor(extractor);
    }
    builder.build().await.unwrap()
}

pub async fn engine_with_db() -> Engine {
    engine_with(EngineConfig::default(), None).await
}

pub struct Trio {
    pub alice: User,
    pub bob: User,
    pub carol: User,
}

pub async fn users(engine: &Engine) -> Trio {
    Trio {
        alice: engine.resolve_user("alice", "Alice").await.unwrap(),
        bob: engine.resolve_user("bob", "Bob").await.unwrap(),
        carol: engine.resolve_user("carol", "Carol").await.unwrap(),
    }
}

/// Alice owns the group; Bob and Carol are members.
pub async fn trip(engine: &Engine, trio: &Trio) -> i64 {
    let detail = engine
        .new_group(GroupCmd::new(trio.alice.id, "Goa", GroupKind::Short))
        .await
        .unwrap();
    let group_id = detail.group.id;
    engine
        .add_member(group_id, trio.bob.id, trio.alice.id)
        .await
        .unwrap();
    engine
        .add_member(group_id, trio.carol.id, trio.alice.id)
        .await
        .unwrap();
    group_id
}

pub async fn net(engine: &Engine, group_id: i64, member: i64, requester: i64) -> i64 {
    engine
        .analysis(group_id, requester)
        .await
        .unwrap()
        .balance_of(member)
        .map(|b| b.net.minor())
        .unwrap_or_default()
}
