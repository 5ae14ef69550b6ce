// ==========================================
// 选举计票系统 - 政治事务（选举）定义
// ==========================================
// 职责: 比例选举 / 多数选举的静态定义
// 说明: 主选举/附属选举使用带共享字段的枚举变体，而非继承
// ==========================================

use crate::domain::types::{
    ApportionmentMethod, CandidateId, CountingCircleId, ElectionUnionId, ListId, ListUnionId,
    PoliticalBusinessId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ==========================================
// PoliticalBusiness - 选举（共享字段 + 变体）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoliticalBusiness {
    pub id: PoliticalBusinessId,
    pub name: String,
    pub number_of_mandates: u32,
    /// 参与本选举的全部计票区
    pub counting_circle_ids: BTreeSet<CountingCircleId>,
    pub kind: PoliticalBusinessKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoliticalBusinessKind {
    Proportional(ProportionalElection),
    Majority(MajorityElection),
}

// ==========================================
// 比例选举
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProportionalElection {
    pub method: ApportionmentMethod,
    pub lists: Vec<ElectionList>,
    pub candidates: Vec<ElectionCandidate>,
    #[serde(default)]
    pub list_unions: Vec<ListUnion>,
    /// 是否允许空行（空票数）
    #[serde(default = "default_true")]
    pub allow_empty_votes: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionList {
    pub id: ListId,
    pub position: u32,
    pub short_description: String,
    /// 跨选举归并为"联合名单"的键（双重比例用）
    pub union_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCandidate {
    pub id: CandidateId,
    pub list_id: ListId,
    pub position: u32,
    /// 是否允许累积（同一候选人在一张选票上出现两次）
    #[serde(default)]
    pub accumulated: bool,
}

/// 名单联合 / 子名单联合
///
/// `parent_id` 为 None 时是顶层名单联合，否则为子名单联合
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListUnion {
    pub id: ListUnionId,
    pub description: String,
    pub parent_id: Option<ListUnionId>,
    pub list_ids: Vec<ListId>,
}

// ==========================================
// 多数选举
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MajorityElection {
    pub variant: ElectionVariant,
    pub candidates: Vec<MajorityCandidate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElectionVariant {
    Primary,
    Secondary { primary_election_id: PoliticalBusinessId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MajorityCandidate {
    pub id: CandidateId,
    pub position: u32,
}

// ==========================================
// ProportionalElectionUnion - 选举联合（双重比例）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProportionalElectionUnion {
    pub id: ElectionUnionId,
    pub description: String,
    pub election_ids: Vec<PoliticalBusinessId>,
}

// ==========================================
// 选票校验规则
// ==========================================

/// 候选人在选票上的引用信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateRef {
    pub list_id: Option<ListId>,
    pub position: u32,
    pub max_occurrences: u32,
}

/// 从选举定义派生的选票校验规则
#[derive(Debug, Clone)]
pub struct BallotRules {
    /// 每张选票的行数（= 议席数）
    pub number_of_mandates: u32,
    pub allow_empty_votes: bool,
    pub candidates: BTreeMap<CandidateId, CandidateRef>,
    pub list_ids: BTreeSet<ListId>,
}

impl PoliticalBusiness {
    pub fn as_proportional(&self) -> Option<&ProportionalElection> {
        match &self.kind {
            PoliticalBusinessKind::Proportional(pe) => Some(pe),
            PoliticalBusinessKind::Majority(_) => None,
        }
    }

    pub fn total_circles(&self) -> u32 {
        self.counting_circle_ids.len() as u32
    }

    /// 派生选票校验规则
    pub fn ballot_rules(&self) -> BallotRules {
        match &self.kind {
            PoliticalBusinessKind::Proportional(pe) => BallotRules {
                number_of_mandates: self.number_of_mandates,
                allow_empty_votes: pe.allow_empty_votes,
                candidates: pe
                    .candidates
                    .iter()
                    .map(|c| {
                        (
                            c.id,
                            CandidateRef {
                                list_id: Some(c.list_id),
                                position: c.position,
                                max_occurrences: if c.accumulated { 2 } else { 1 },
                            },
                        )
                    })
                    .collect(),
                list_ids: pe.lists.iter().map(|l| l.id).collect(),
            },
            PoliticalBusinessKind::Majority(me) => BallotRules {
                number_of_mandates: self.number_of_mandates,
                allow_empty_votes: true,
                candidates: me
                    .candidates
                    .iter()
                    .map(|c| {
                        (
                            c.id,
                            CandidateRef {
                                list_id: None,
                                position: c.position,
                                max_occurrences: 1,
                            },
                        )
                    })
                    .collect(),
                list_ids: BTreeSet::new(),
            },
        }
    }
}
