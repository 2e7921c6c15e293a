//! Feedback counts for the reporting view.

use std::collections::BTreeMap;

use serde::Serialize;

use super::ports::{FeedbackTally, ReportScope};
use super::{FeedbackKind, FeedbackStatus, TeamId};

/// Aggregated counts over one report scope.
///
/// Every status and kind is present, with zero when nothing matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackReport {
    /// Team the report is restricted to; `None` for the whole organisation.
    pub team_id: Option<TeamId>,
    pub total: u64,
    pub by_status: BTreeMap<FeedbackStatus, u64>,
    pub by_kind: BTreeMap<FeedbackKind, u64>,
}

impl FeedbackReport {
    /// Fold grouped tallies into a report.
    ///
    /// # Examples
    /// ```
    /// use feedback_engine::domain::ports::{FeedbackTally, ReportScope};
    /// use feedback_engine::domain::{FeedbackKind, FeedbackReport, FeedbackStatus};
    ///
    /// let report = FeedbackReport::from_tallies(
    ///     ReportScope::Organisation,
    ///     &[FeedbackTally { status: FeedbackStatus::Open, kind: FeedbackKind::Praise, count: 2 }],
    /// );
    /// assert_eq!(report.total, 2);
    /// assert_eq!(report.by_status[&FeedbackStatus::Resolved], 0);
    /// ```
    pub fn from_tallies(scope: ReportScope, tallies: &[FeedbackTally]) -> Self {
        let mut by_status: BTreeMap<_, _> =
            FeedbackStatus::ALL.into_iter().map(|status| (status, 0)).collect();
        let mut by_kind: BTreeMap<_, _> =
            FeedbackKind::ALL.into_iter().map(|kind| (kind, 0)).collect();
        let mut total = 0;

        for tally in tallies {
            *by_status.entry(tally.status).or_insert(0) += tally.count;
            *by_kind.entry(tally.kind).or_insert(0) += tally.count;
            total += tally.count;
        }

        let team_id = match scope {
            ReportScope::Organisation => None,
            ReportScope::Team(team) => Some(team),
        };
        Self {
            team_id,
            total,
            by_status,
            by_kind,
        }
    }
}
