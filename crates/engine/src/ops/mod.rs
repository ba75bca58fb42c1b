use std::{sync::Arc, time::Duration};

use sea_orm::DatabaseConnection;

use crate::{AnalysisCache, Currency, ExpenseExtractor, GroupLocks, ResultEngine, SplitPolicy};

mod access;
mod analysis;
mod expenses;
mod groups;
mod members;
mod users;

pub use expenses::ExpensePage;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: $crate::ResultEngine<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Behaviour knobs of the engine. The defaults match the service defaults.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub split_policy: SplitPolicy,
    /// New expenses start `APPROVED` instead of waiting for participants.
    pub auto_approve: bool,
    /// Limit used when a group is created without one.
    pub default_member_limit: u32,
    pub default_min_floor_minor: i64,
    pub default_currency: Currency,
    /// Zero disables the analysis cache.
    pub analysis_ttl: Duration,
    /// Upper bound for one call to the parsing service.
    pub extract_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            split_policy: SplitPolicy::CreationTime,
            auto_approve: false,
            default_member_limit: 32,
            default_min_floor_minor: 200_000,
            default_currency: Currency::Inr,
            analysis_ttl: Duration::from_secs(30),
            extract_timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    config: EngineConfig,
    locks: GroupLocks,
    cache: AnalysisCache,
    extractor: Option<Arc<dyn ExpenseExtractor>>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    config: EngineConfig,
    extractor: Option<Arc<dyn ExpenseExtractor>>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> EngineBuilder {
        self.config = config;
        self
    }

    /// Service used for AI text and receipt parsing. Without one, text input
    /// falls back to the local quick-add parser and receipts are refused.
    pub fn extractor(mut self, extractor: Arc<dyn ExpenseExtractor>) -> EngineBuilder {
        self.extractor = Some(extractor);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            cache: AnalysisCache::new(self.config.analysis_ttl),
            config: self.config,
            locks: GroupLocks::new(),
            extractor: self.extractor,
        })
    }
}
