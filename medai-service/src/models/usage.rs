//! Usage tracking models for per-user AI quotas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Feature family a quota applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaKind {
    /// Tutor chat and other free-form AI calls.
    General,
    Flashcard,
    Question,
    /// Clinical case sessions. No route consumes this kind yet; limits and
    /// remaining uses are still reported by `GET /api/usage`.
    Clinical,
    /// Weekly study summaries. Reported but not consumed, like `Clinical`.
    Summary,
}

/// Length of the window a quota counter lives for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaWindow {
    Daily,
    Weekly,
}

impl QuotaKind {
    pub const ALL: [QuotaKind; 5] = [
        QuotaKind::General,
        QuotaKind::Flashcard,
        QuotaKind::Question,
        QuotaKind::Clinical,
        QuotaKind::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaKind::General => "general",
            QuotaKind::Flashcard => "flashcard",
            QuotaKind::Question => "question",
            QuotaKind::Clinical => "clinical",
            QuotaKind::Summary => "summary",
        }
    }

    pub fn window(&self) -> QuotaWindow {
        match self {
            QuotaKind::Summary => QuotaWindow::Weekly,
            _ => QuotaWindow::Daily,
        }
    }
}

impl fmt::Display for QuotaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuotaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuotaKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown quota kind '{}'", s))
    }
}

/// Subscription plan; selects the limit table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    #[default]
    Free,
    Premium,
}

/// Usage counter for one user, quota kind and period.
///
/// Records are created by the first consume of a period and are never reset in
/// place: a new period key simply starts a new record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub user_id: String,

    pub kind: QuotaKind,

    /// `YYYY-MM-DD` for daily kinds, `YYYY-Www` for weekly kinds.
    pub period: String,

    pub count: i64,

    /// Ceiling in force when the record was last incremented.
    pub limit: i64,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl UsageRecord {
    pub fn new(user_id: &str, kind: QuotaKind, period: &str, limit: i64) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind,
            period: period.to_string(),
            count: 0,
            limit,
            updated_at: Utc::now(),
        }
    }

    pub fn uses_left(&self) -> i64 {
        (self.limit - self.count).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_kind_round_trips_through_str() {
        for kind in QuotaKind::ALL {
            assert_eq!(kind.as_str().parse::<QuotaKind>().unwrap(), kind);
        }
        assert!("tokens".parse::<QuotaKind>().is_err());
    }

    #[test]
    fn summary_is_the_only_weekly_kind() {
        assert_eq!(QuotaKind::Summary.window(), QuotaWindow::Weekly);
        assert_eq!(QuotaKind::General.window(), QuotaWindow::Daily);
        assert_eq!(QuotaKind::Flashcard.window(), QuotaWindow::Daily);
    }

    #[test]
    fn uses_left_never_goes_negative() {
        let mut record = UsageRecord::new("u1", QuotaKind::General, "2026-10-19", 5);
        record.count = 7;
        assert_eq!(record.uses_left(), 0);
    }
}
