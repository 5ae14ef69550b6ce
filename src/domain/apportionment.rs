// ==========================================
// 选举计票系统 - 议席分配领域模型
// ==========================================
// 职责: 分配树节点、计算轮次（审计轨迹）、抽签决定
// 红线: CalculationRound 只追加不修改
// ==========================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

// ==========================================
// 分配树节点
// ==========================================

/// 节点在 arena 中的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIndex(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKey {
    Root,
    ListUnion(Uuid),
    SubListUnion(Uuid),
    List(Uuid),
}

impl NodeKey {
    pub fn entity_id(&self) -> String {
        match self {
            NodeKey::Root => "root".to_string(),
            NodeKey::ListUnion(id) | NodeKey::SubListUnion(id) | NodeKey::List(id) => {
                id.to_string()
            }
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Root => write!(f, "ROOT"),
            NodeKey::ListUnion(id) => write!(f, "LIST_UNION:{}", id),
            NodeKey::SubListUnion(id) => write!(f, "SUB_LIST_UNION:{}", id),
            NodeKey::List(id) => write!(f, "LIST:{}", id),
        }
    }
}

/// Hagenbach-Bischoff 分组节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApportionmentNode {
    pub key: NodeKey,
    pub parent: Option<NodeIndex>,
    pub children: Vec<NodeIndex>,
    /// 用于同级排序的位置（名单位置或联合的最小名单位置）
    pub position: u32,
    pub vote_count: u64,
    pub seats: u32,
}

impl ApportionmentNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self.key, NodeKey::List(_))
    }
}

// ==========================================
// CalculationRound - 计算轮次（审计轨迹）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationRound {
    /// 第几个议席（从 1 开始）
    pub seat_number: u32,
    /// 在哪个父节点下比较
    pub scope: NodeKey,
    pub winner: NodeKey,
    /// votes / (seats + 1)，仅用于展示；比较使用整数交叉相乘
    pub ratio: Decimal,
    /// 获胜节点在本轮后的累计议席
    pub cumulative_seats: u32,
    /// 本轮是否由抽签决定
    pub decided_by_lot: bool,
}

// ==========================================
// LotDecision - 抽签决定
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LotDecisionScope {
    /// Hagenbach-Bischoff: 在某父节点下的同级比较
    HagenbachBischoff { parent: NodeKey },
    /// 双重比例上层分配（联合名单议席）
    DoubleProportionalSuper,
    /// 双重比例下层分配（某选举内的名单议席）
    DoubleProportionalSub { election_id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TiedEntity {
    /// 实体标识（名单/联合 id 或联合名单键）
    pub entity_id: String,
    pub vote_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LotDecisionState {
    Pending,
    Resolved { chosen_entity_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotDecision {
    /// 由 (方法, 范围, 议席序号) 确定性生成
    pub id: String,
    pub scope: LotDecisionScope,
    pub seat_number: u32,
    /// 按 entity_id 排序
    pub tied: Vec<TiedEntity>,
    pub state: LotDecisionState,
}

impl LotDecision {
    pub fn new(id: String, scope: LotDecisionScope, seat_number: u32, mut tied: Vec<TiedEntity>) -> Self {
        tied.sort();
        Self {
            id,
            scope,
            seat_number,
            tied,
            state: LotDecisionState::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, LotDecisionState::Pending)
    }

    pub fn tied_ids(&self) -> BTreeSet<String> {
        self.tied.iter().map(|t| t.entity_id.clone()).collect()
    }

    pub fn involves(&self, entity_id: &str) -> bool {
        self.tied.iter().any(|t| t.entity_id == entity_id)
    }
}

/// 操作员对抽签决定的裁决
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotDecisionResolution {
    pub decision_id: String,
    /// 裁决时的并列集合；并列集合变化后裁决失效
    pub tied_entity_ids: BTreeSet<String>,
    pub chosen_entity_id: String,
    pub resolved_by: String,
    pub resolved_at: DateTime<Utc>,
}
