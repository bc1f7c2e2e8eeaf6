//! Opportunity pipeline summary over the caller's scope.

use std::collections::BTreeMap;

use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect};
use serde::{Deserialize, Serialize};

use crate::access::{require, resolve_scope, Action, Principal, Resource};
use crate::db::entities::opportunity::{self, Column};
use crate::error::{Result, ServerError};
use crate::validation;

pub const WON_STAGE: &str = "won";

/// Optional `expectedCloseDate` window, RFC 3339 bounds (inclusive)
#[derive(Debug, Default, Deserialize)]
pub struct MetricsWindow {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMetrics {
    pub total_opportunities: u64,
    pub opportunities_by_stage: BTreeMap<String, u64>,
    pub won_deals: u64,
    pub total_estimated_value: f64,
}

pub async fn team_metrics(
    db: &DatabaseConnection,
    principal: &Principal,
    window: &MetricsWindow,
) -> Result<TeamMetrics> {
    require(principal, Resource::TeamMetrics, Action::Read)?;
    let from = validation::optional_timestamp("from", window.from.as_deref())?;
    let to = validation::optional_timestamp("to", window.to.as_deref())?;
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(ServerError::validation("from must not be after to"));
        }
    }

    let scope = resolve_scope(db, principal).await?;
    let mut condition = Condition::all();
    if let Some(from) = from {
        condition = condition.add(Column::ExpectedCloseDate.gte(from));
    }
    if let Some(to) = to {
        condition = condition.add(Column::ExpectedCloseDate.lte(to));
    }
    if let Some(owned) = scope.owner_condition(&[Column::SalesManagerId, Column::FreelanceConsultantId]) {
        condition = condition.add(owned);
    }

    let rows: Vec<(String, f64)> = opportunity::Entity::find()
        .select_only()
        .column(Column::Stage)
        .column(Column::EstimatedValue)
        .filter(condition)
        .into_tuple()
        .all(db)
        .await?;

    let mut metrics = TeamMetrics {
        total_opportunities: 0,
        opportunities_by_stage: BTreeMap::new(),
        won_deals: 0,
        total_estimated_value: 0.0,
    };
    for (stage, value) in rows {
        metrics.total_opportunities += 1;
        metrics.total_estimated_value += value;
        if stage == WON_STAGE {
            metrics.won_deals += 1;
        }
        *metrics.opportunities_by_stage.entry(stage).or_default() += 1;
    }

    tracing::debug!(
        "Team metrics for user {}: {} opportunities",
        principal.user_id,
        metrics.total_opportunities
    );
    Ok(metrics)
}
