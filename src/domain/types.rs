// ==========================================
// 选举计票系统 - 领域类型定义
// ==========================================
// 职责: 状态枚举、角色、分配方法等基础类型
// 序列化格式: SCREAMING_SNAKE_CASE
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==========================================
// 标识类型
// ==========================================
pub type PoliticalBusinessId = Uuid;
pub type CountingCircleId = Uuid;
pub type ResultId = Uuid;
pub type BundleId = Uuid;
pub type ListId = Uuid;
pub type CandidateId = Uuid;
pub type ListUnionId = Uuid;
pub type ElectionUnionId = Uuid;

// ==========================================
// 票包状态 (Bundle State)
// ==========================================
// 合法迁移:
//   InProcess → ReadyForReview → Reviewed
//   ReadyForReview → InCorrection → ReadyForReview
//   非 Reviewed 状态 → Deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BundleState {
    InProcess,      // 录入中
    ReadyForReview, // 待审核
    InCorrection,   // 修正中
    Reviewed,       // 已审核（终态）
    Deleted,        // 已删除（终态）
}

impl BundleState {
    /// 是否允许录入/修改选票
    pub fn accepts_ballot_changes(&self) -> bool {
        matches!(self, BundleState::InProcess | BundleState::InCorrection)
    }

    /// 是否仍占用票包编号
    pub fn is_active(&self) -> bool {
        !matches!(self, BundleState::Deleted)
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, BundleState::Reviewed | BundleState::Deleted)
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            BundleState::InProcess => "IN_PROCESS",
            BundleState::ReadyForReview => "READY_FOR_REVIEW",
            BundleState::InCorrection => "IN_CORRECTION",
            BundleState::Reviewed => "REVIEWED",
            BundleState::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for BundleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 计票区结果状态 (Counting Circle Result State)
// ==========================================
// 顺序: SubmissionOngoing < ReadyForCorrection < SubmissionDone < CorrectionDone
//       < AuditedTentatively < Plausibilised
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CountingCircleResultState {
    SubmissionOngoing,  // 录入中
    ReadyForCorrection, // 退回修正
    SubmissionDone,     // 录入完成
    CorrectionDone,     // 修正完成
    AuditedTentatively, // 暂时审定
    Plausibilised,      // 已核实
}

impl CountingCircleResultState {
    /// 是否计入"已完成计票区"
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            CountingCircleResultState::SubmissionDone
                | CountingCircleResultState::CorrectionDone
                | CountingCircleResultState::AuditedTentatively
                | CountingCircleResultState::Plausibilised
        )
    }

    /// 是否允许录入票包
    pub fn accepts_bundles(&self) -> bool {
        matches!(
            self,
            CountingCircleResultState::SubmissionOngoing
                | CountingCircleResultState::ReadyForCorrection
        )
    }

    /// 状态迁移表
    pub fn can_transition_to(&self, next: CountingCircleResultState) -> bool {
        use CountingCircleResultState::*;
        matches!(
            (self, next),
            (SubmissionOngoing, SubmissionDone)
                | (SubmissionDone, AuditedTentatively)
                | (SubmissionDone, ReadyForCorrection)
                | (ReadyForCorrection, CorrectionDone)
                | (CorrectionDone, AuditedTentatively)
                | (CorrectionDone, ReadyForCorrection)
                | (AuditedTentatively, Plausibilised)
                | (AuditedTentatively, ReadyForCorrection)
                | (Plausibilised, AuditedTentatively)
        )
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            CountingCircleResultState::SubmissionOngoing => "SUBMISSION_ONGOING",
            CountingCircleResultState::ReadyForCorrection => "READY_FOR_CORRECTION",
            CountingCircleResultState::SubmissionDone => "SUBMISSION_DONE",
            CountingCircleResultState::CorrectionDone => "CORRECTION_DONE",
            CountingCircleResultState::AuditedTentatively => "AUDITED_TENTATIVELY",
            CountingCircleResultState::Plausibilised => "PLAUSIBILISED",
        }
    }

    /// 从字符串解析状态
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SUBMISSION_ONGOING" => Some(CountingCircleResultState::SubmissionOngoing),
            "READY_FOR_CORRECTION" => Some(CountingCircleResultState::ReadyForCorrection),
            "SUBMISSION_DONE" => Some(CountingCircleResultState::SubmissionDone),
            "CORRECTION_DONE" => Some(CountingCircleResultState::CorrectionDone),
            "AUDITED_TENTATIVELY" => Some(CountingCircleResultState::AuditedTentatively),
            "PLAUSIBILISED" => Some(CountingCircleResultState::Plausibilised),
            _ => None,
        }
    }
}

impl fmt::Display for CountingCircleResultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 操作员角色 (Role)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    BundleCreator,    // 录入员
    BundleController, // 审核员
    ElectionAdmin,    // 选举管理员
    Monitoring,       // 只读监控
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::BundleCreator => write!(f, "BUNDLE_CREATOR"),
            Role::BundleController => write!(f, "BUNDLE_CONTROLLER"),
            Role::ElectionAdmin => write!(f, "ELECTION_ADMIN"),
            Role::Monitoring => write!(f, "MONITORING"),
        }
    }
}

// ==========================================
// 议席分配方法 (Apportionment Method)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApportionmentMethod {
    HagenbachBischoff,  // 单选举，可含名单联合
    DoubleProportional, // 选举联合（双重比例）
}

impl fmt::Display for ApportionmentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApportionmentMethod::HagenbachBischoff => write!(f, "HAGENBACH_BISCHOFF"),
            ApportionmentMethod::DoubleProportional => write!(f, "DOUBLE_PROPORTIONAL"),
        }
    }
}

// ==========================================
// 投票卡渠道 (Voting Channel)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VotingChannel {
    BallotBox, // 投票箱
    ByMail,    // 邮寄
    Paper,     // 纸质
    EVoting,   // 电子投票
}

// ==========================================
// 候选人当选状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateEndResultState {
    Pending,    // 待议席分配
    Elected,    // 当选
    NotElected, // 未当选
}
