// ==========================================
// 选举计票系统 - 票包与选票领域模型
// ==========================================
// 职责: Bundle / Ballot 实体及其小计
// 红线: Reviewed 之后选票不可变；只有 Reviewed 票包计入候选人/名单小计
// ==========================================

use crate::domain::types::{BundleId, BundleState, CandidateId, ListId, ResultId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ==========================================
// Ballot - 选票
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    /// 票包内编号，从 1 开始
    pub number: u32,
    /// 候选人行（同一候选人可因累积出现多次）
    pub selections: Vec<CandidateId>,
    /// 空行数
    pub empty_vote_count: u32,
}

/// 录入时提交的选票内容（编号由票包分配）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotInput {
    /// None 表示新增；Some(n) 表示更新第 n 张
    pub number: Option<u32>,
    pub selections: Vec<CandidateId>,
    pub empty_vote_count: u32,
}

// ==========================================
// Bundle - 票包
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub id: BundleId,
    pub result_id: ResultId,
    pub number: u32,
    /// 名单票包（空行计入该名单）
    pub list_id: Option<ListId>,
    pub created_by: String,
    pub state: BundleState,
    pub ballots: BTreeMap<u32, Ballot>,
    /// 抽样需复核的选票编号
    pub ballot_numbers_to_review: BTreeSet<u32>,
    pub reviewed_by: Option<String>,
    /// 已应用的事件版本（乐观并发控制）
    pub version: u64,
}

impl Bundle {
    pub fn ballot_count(&self) -> u32 {
        self.ballots.len() as u32
    }

    /// 下一张新选票的编号
    pub fn next_ballot_number(&self) -> u32 {
        self.ballots.keys().next_back().map(|n| n + 1).unwrap_or(1)
    }

    pub fn is_created_by(&self, user_id: &str) -> bool {
        self.created_by == user_id
    }

    /// 计算本票包的小计（不考虑状态）
    pub fn subtotal(&self) -> BallotSubtotal {
        let mut subtotal = BallotSubtotal::default();
        for ballot in self.ballots.values() {
            subtotal.add_ballot(ballot, self.list_id);
        }
        subtotal
    }
}

// ==========================================
// BallotSubtotal - 选票小计
// ==========================================
// 按自然键分组的可加性小计，用于票包 → 计票区 → 总结果汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotSubtotal {
    pub ballot_count: u64,
    /// 未修改的名单选票数（直接录入）
    pub unmodified_list_ballots: BTreeMap<ListId, u64>,
    pub candidate_votes: BTreeMap<CandidateId, u64>,
    /// 名单得票中的空行部分
    pub list_blank_rows: BTreeMap<ListId, u64>,
    /// 无名单票包的空行
    pub empty_votes_without_list: u64,
}

impl BallotSubtotal {
    pub fn add_ballot(&mut self, ballot: &Ballot, list_id: Option<ListId>) {
        self.ballot_count += 1;
        for candidate_id in &ballot.selections {
            *self.candidate_votes.entry(*candidate_id).or_insert(0) += 1;
        }
        match list_id {
            Some(list_id) => {
                if ballot.empty_vote_count > 0 {
                    *self.list_blank_rows.entry(list_id).or_insert(0) +=
                        u64::from(ballot.empty_vote_count);
                }
            }
            None => self.empty_votes_without_list += u64::from(ballot.empty_vote_count),
        }
    }

    /// 合并另一个小计（可交换、可结合）
    pub fn merge(&mut self, other: &BallotSubtotal) {
        self.ballot_count += other.ballot_count;
        merge_map(&mut self.unmodified_list_ballots, &other.unmodified_list_ballots);
        merge_map(&mut self.candidate_votes, &other.candidate_votes);
        merge_map(&mut self.list_blank_rows, &other.list_blank_rows);
        self.empty_votes_without_list += other.empty_votes_without_list;
    }
}

pub(crate) fn merge_map<K: Ord + Copy>(target: &mut BTreeMap<K, u64>, source: &BTreeMap<K, u64>) {
    for (key, value) in source {
        *target.entry(*key).or_insert(0) += value;
    }
}
