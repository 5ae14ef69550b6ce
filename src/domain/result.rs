// ==========================================
// 选举计票系统 - 计票区结果与总结果
// ==========================================
// 职责: CountingCircleResult（输入）/ EndResult（汇总输出）
// 红线: EndResult 只能整体重算，不做增量修补
// ==========================================

use crate::domain::bundle::{merge_map, BallotSubtotal};
use crate::domain::types::{
    CandidateEndResultState, CandidateId, CountingCircleId, CountingCircleResultState, ListId,
    PoliticalBusinessId, ResultId, VotingChannel,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// 投票卡 / 选民数小计
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingCardCount {
    pub valid: u64,
    pub invalid: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCounts {
    pub total_received_ballots: u64,
    pub blank_ballots: u64,
    pub invalid_ballots: u64,
}

impl VoterCounts {
    /// 有效计入的选票数
    pub fn accounted_ballots(&self) -> u64 {
        self.total_received_ballots
            .saturating_sub(self.blank_ballots)
            .saturating_sub(self.invalid_ballots)
    }

    pub fn merge(&mut self, other: &VoterCounts) {
        self.total_received_ballots += other.total_received_ballots;
        self.blank_ballots += other.blank_ballots;
        self.invalid_ballots += other.invalid_ballots;
    }
}

// ==========================================
// CountingCircleResult - 计票区结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountingCircleResult {
    pub id: ResultId,
    pub political_business_id: PoliticalBusinessId,
    pub counting_circle_id: CountingCircleId,
    pub state: CountingCircleResultState,
    pub voting_cards: BTreeMap<VotingChannel, VotingCardCount>,
    pub voter_counts: VoterCounts,
    /// 不经票包直接录入的小计
    pub conventional: BallotSubtotal,
    /// 由已审核票包投影得到的小计
    pub reviewed_bundles: BallotSubtotal,
    /// 尚未审核/删除的票包数
    pub open_bundle_count: u32,
}

impl CountingCircleResult {
    pub fn new(
        id: ResultId,
        political_business_id: PoliticalBusinessId,
        counting_circle_id: CountingCircleId,
    ) -> Self {
        Self {
            id,
            political_business_id,
            counting_circle_id,
            state: CountingCircleResultState::SubmissionOngoing,
            voting_cards: BTreeMap::new(),
            voter_counts: VoterCounts::default(),
            conventional: BallotSubtotal::default(),
            reviewed_bundles: BallotSubtotal::default(),
            open_bundle_count: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }

    /// 选票小计 = 直接录入 + 已审核票包
    pub fn ballot_subtotal(&self) -> BallotSubtotal {
        let mut total = self.conventional.clone();
        total.merge(&self.reviewed_bundles);
        total
    }
}

// ==========================================
// EndResult - 总结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndResult {
    pub political_business_id: PoliticalBusinessId,
    pub count_of_done_circles: u32,
    pub total_count_of_circles: u32,
    /// 仅包含调用方可见的计票区（监控视图）
    pub partial: bool,
    pub finalized: bool,
    pub voting_cards: BTreeMap<VotingChannel, VotingCardCount>,
    pub voter_counts: VoterCounts,
    pub ballot_count: u64,
    pub empty_votes_without_list: u64,
    pub lists: Vec<ListEndResult>,
    pub candidates: Vec<CandidateEndResult>,
}

impl EndResult {
    pub fn all_circles_done(&self) -> bool {
        !self.partial && self.count_of_done_circles == self.total_count_of_circles
    }

    pub fn list(&self, list_id: &ListId) -> Option<&ListEndResult> {
        self.lists.iter().find(|l| &l.list_id == list_id)
    }

    pub fn candidate(&self, candidate_id: &CandidateId) -> Option<&CandidateEndResult> {
        self.candidates.iter().find(|c| &c.candidate_id == candidate_id)
    }

    /// 名单得票 → 议席分配输入
    pub fn list_votes(&self) -> BTreeMap<ListId, u64> {
        self.lists.iter().map(|l| (l.list_id, l.list_votes())).collect()
    }

    pub fn total_voting_cards(&self) -> VotingCardCount {
        self.voting_cards
            .values()
            .fold(VotingCardCount::default(), |acc, c| VotingCardCount {
                valid: acc.valid + c.valid,
                invalid: acc.invalid + c.invalid,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEndResult {
    pub list_id: ListId,
    pub position: u32,
    pub unmodified_list_ballots: u64,
    pub candidate_votes: u64,
    pub blank_rows: u64,
    /// 分配议席数（议席分配前为 None）
    pub seats: Option<u32>,
}

impl ListEndResult {
    /// 名单得票 = 候选人票 + 空行
    pub fn list_votes(&self) -> u64 {
        self.candidate_votes + self.blank_rows
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateEndResult {
    pub candidate_id: CandidateId,
    pub list_id: Option<ListId>,
    pub position: u32,
    pub vote_count: u64,
    /// 部分结果中不可推导，置空
    pub rank: Option<u32>,
    pub state: Option<CandidateEndResultState>,
}

/// 合并投票卡（按渠道）
pub(crate) fn merge_voting_cards(
    target: &mut BTreeMap<VotingChannel, VotingCardCount>,
    source: &BTreeMap<VotingChannel, VotingCardCount>,
) {
    for (channel, count) in source {
        let entry = target.entry(*channel).or_default();
        entry.valid += count.valid;
        entry.invalid += count.invalid;
    }
}

/// 合并名单维度的计数
pub(crate) fn merge_list_counts(target: &mut BTreeMap<ListId, u64>, source: &BTreeMap<ListId, u64>) {
    merge_map(target, source);
}
