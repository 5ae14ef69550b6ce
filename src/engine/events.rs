// ==========================================
// 选举计票系统 - 引擎层事件
// ==========================================
// 职责: 票包领域事件 + 变更通知发布 trait
// 说明: Engine 层定义 trait，API 层的 ChangeFeed 实现
// ==========================================

use crate::domain::bundle::Ballot;
use crate::domain::types::{BundleId, ListId, PoliticalBusinessId, ResultId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::sync::Arc;
use uuid::Uuid;

// ==========================================
// 票包事件
// ==========================================

/// 票包领域事件（事件溯源的事实）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BundleEvent {
    Created {
        number: u32,
        list_id: Option<ListId>,
        created_by: String,
    },
    BallotRecorded {
        ballot: Ballot,
    },
    BallotDeleted {
        number: u32,
    },
    SubmissionFinished {
        sample: BTreeSet<u32>,
    },
    CorrectionFinished {
        sample: BTreeSet<u32>,
    },
    ReviewRejected {
        reviewer: String,
    },
    ReviewSucceeded {
        reviewer: String,
    },
    Deleted {
        deleted_by: String,
    },
}

impl BundleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            BundleEvent::Created { .. } => "BundleCreated",
            BundleEvent::BallotRecorded { .. } => "BallotRecorded",
            BundleEvent::BallotDeleted { .. } => "BallotDeleted",
            BundleEvent::SubmissionFinished { .. } => "BundleSubmissionFinished",
            BundleEvent::CorrectionFinished { .. } => "BundleCorrectionFinished",
            BundleEvent::ReviewRejected { .. } => "BundleReviewRejected",
            BundleEvent::ReviewSucceeded { .. } => "BundleReviewSucceeded",
            BundleEvent::Deleted { .. } => "BundleDeleted",
        }
    }

    /// 是否影响计票区汇总（需要触发重算）
    pub fn affects_aggregate(&self) -> bool {
        matches!(
            self,
            BundleEvent::ReviewSucceeded { .. }
                | BundleEvent::ReviewRejected { .. }
                | BundleEvent::Deleted { .. }
                | BundleEvent::SubmissionFinished { .. }
                | BundleEvent::Created { .. }
        )
    }
}

/// 事件信封
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub bundle_id: BundleId,
    pub result_id: ResultId,
    /// 票包内版本号，从 1 开始连续递增
    pub version: u64,
    pub occurred_at: DateTime<Utc>,
    pub actor: String,
    pub payload: BundleEvent,
}

impl EventEnvelope {
    pub fn new(
        bundle_id: BundleId,
        result_id: ResultId,
        version: u64,
        actor: &str,
        payload: BundleEvent,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            bundle_id,
            result_id,
            version,
            occurred_at: Utc::now(),
            actor: actor.to_string(),
            payload,
        }
    }
}

// ==========================================
// 变更通知
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    BundleChanged,
    CountingCircleResultChanged,
    EndResultChanged,
    LotDecisionsChanged,
}

/// 推送给订阅者的变更通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub political_business_id: PoliticalBusinessId,
    pub result_id: Option<ResultId>,
    pub bundle_id: Option<BundleId>,
    pub kind: ChangeKind,
    pub occurred_at: DateTime<Utc>,
}

impl ChangeNotification {
    pub fn new(
        political_business_id: PoliticalBusinessId,
        result_id: Option<ResultId>,
        bundle_id: Option<BundleId>,
        kind: ChangeKind,
    ) -> Self {
        Self {
            political_business_id,
            result_id,
            bundle_id,
            kind,
            occurred_at: Utc::now(),
        }
    }
}

// ==========================================
// 通知发布 Trait
// ==========================================

/// 变更通知发布者
///
/// # 返回
/// - `Ok(n)`: 收到通知的订阅者数量
pub trait ChangePublisher: Send + Sync {
    fn publish(&self, notification: ChangeNotification)
        -> Result<usize, Box<dyn Error + Send + Sync>>;
}

/// 空操作发布者（单元测试用）
#[derive(Debug, Clone, Default)]
pub struct NoOpChangePublisher;

impl ChangePublisher for NoOpChangePublisher {
    fn publish(
        &self,
        notification: ChangeNotification,
    ) -> Result<usize, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            political_business_id = %notification.political_business_id,
            kind = ?notification.kind,
            "NoOpChangePublisher: skip notification"
        );
        Ok(0)
    }
}

/// 可选的发布者包装
pub struct OptionalChangePublisher {
    inner: Option<Arc<dyn ChangePublisher>>,
}

impl OptionalChangePublisher {
    pub fn with_publisher(publisher: Arc<dyn ChangePublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布失败只记录日志，不影响已提交的写入
    pub fn publish(&self, notification: ChangeNotification) -> usize {
        match &self.inner {
            Some(publisher) => match publisher.publish(notification) {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(error = %e, "change notification publish failed");
                    0
                }
            },
            None => 0,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalChangePublisher {
    fn default() -> Self {
        Self::none()
    }
}
