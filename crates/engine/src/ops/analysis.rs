use chrono::Utc;
use sea_orm::TransactionTrait;

use crate::{ExpenseFilter, GroupAnalysis, ResultEngine, UserId, expenses_to_csv};

use super::{Engine, with_tx};

impl Engine {
    /// Balances, settlements and totals of a group.
    ///
    /// Served from the analysis cache while fresh. The cache generation is
    /// read before the snapshot so a write that commits meanwhile keeps the
    /// result out of the cache.
    pub async fn analysis(&self, group_id: i64, user_id: UserId) -> ResultEngine<GroupAnalysis> {
        let generation = self.cache.generation(group_id);
        let cached = with_tx!(self, |db_tx| {
            self.require_membership(&db_tx, group_id, user_id).await?;
            Ok(self.cache.get(group_id))
        })?;
        if let Some(analysis) = cached {
            tracing::debug!(group_id, "analysis served from cache");
            return Ok(analysis);
        }

        let group = with_tx!(self, |db_tx| {
            self.load_group_for_member(&db_tx, group_id, user_id).await
        })?;
        let analysis = GroupAnalysis::compute(&group, self.config.split_policy, Utc::now())
            .inspect_err(|err| {
                if err.is_internal() {
                    tracing::error!(group_id, error = %err, "group analysis failed");
                }
            })?;
        self.cache.insert(group_id, generation, analysis.clone());
        Ok(analysis)
    }

    /// The whole ledger as CSV, newest first.
    pub async fn export_csv(&self, group_id: i64, user_id: UserId) -> ResultEngine<String> {
        let group = with_tx!(self, |db_tx| {
            self.load_group_for_member(&db_tx, group_id, user_id).await
        })?;
        let filter = ExpenseFilter::default();
        expenses_to_csv(group.ledger().list(&filter))
    }
}
