// ==========================================
// 选举计票系统 - 议席分配编排器
// ==========================================
// 流程: 前置检查 → 构造分配输入 → 执行分配方法 → 回写名单议席 → 候选人当选状态
// 前置: 全部计票区完成 + 已触发议席分配 + 比例选举
// 红线: 存在待决抽签时不得定稿
// ==========================================

use crate::config::TallyConfig;
use crate::domain::apportionment::LotDecision;
use crate::domain::political_business::{PoliticalBusiness, ProportionalElection, ProportionalElectionUnion};
use crate::domain::result::EndResult;
use crate::domain::types::{ApportionmentMethod, CandidateEndResultState, ListId};
use crate::engine::double_proportional::{
    DoubleProportional, DoubleProportionalResult, DpElectionInput, DpInput, DpListInput,
};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::hagenbach_bischoff::{HagenbachBischoff, HagenbachBischoffResult, HbInput, HbListInput};
use crate::engine::lot_decision::Resolutions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

// ==========================================
// 分配结果
// ==========================================

/// 单个选举的分配结果（Hagenbach-Bischoff）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionApportionment {
    pub end_result: EndResult,
    pub outcome: HagenbachBischoffResult,
}

/// 选举联合的分配结果（双重比例）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionApportionment {
    pub end_results: Vec<EndResult>,
    pub outcome: DoubleProportionalResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "result", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApportionmentOutcome {
    HagenbachBischoff(HagenbachBischoffResult),
    DoubleProportional(DoubleProportionalResult),
}

impl ApportionmentOutcome {
    pub fn lot_decisions(&self) -> &[LotDecision] {
        match self {
            ApportionmentOutcome::HagenbachBischoff(r) => &r.lot_decisions,
            ApportionmentOutcome::DoubleProportional(r) => &r.lot_decisions,
        }
    }

    pub fn is_complete(&self) -> bool {
        match self {
            ApportionmentOutcome::HagenbachBischoff(r) => r.is_complete(),
            ApportionmentOutcome::DoubleProportional(r) => r.is_complete(),
        }
    }
}

// ==========================================
// ApportionmentOrchestrator - 议席分配编排器
// ==========================================
pub struct ApportionmentOrchestrator {
    double_proportional: DoubleProportional,
}

impl ApportionmentOrchestrator {
    pub fn new(config: &TallyConfig) -> Self {
        Self {
            double_proportional: DoubleProportional::from_config(config),
        }
    }

    /// 分配前置检查
    pub fn check_ready(end_result: &EndResult, mandate_distribution_triggered: bool) -> EngineResult<()> {
        if !end_result.all_circles_done() {
            return Err(EngineError::Validation(format!(
                "apportionment requires all counting circles to be done ({}/{})",
                end_result.count_of_done_circles, end_result.total_count_of_circles
            )));
        }
        if !mandate_distribution_triggered {
            return Err(EngineError::Validation(
                "mandate distribution has not been triggered".to_string(),
            ));
        }
        Ok(())
    }

    /// 单个选举的 Hagenbach-Bischoff 分配
    ///
    /// # 参数
    /// - `end_result`: 该选举的完整总结果（不会被修改）
    /// - `resolutions`: 已有抽签裁决
    pub fn apportion_election(
        &self,
        business: &PoliticalBusiness,
        end_result: &EndResult,
        mandate_distribution_triggered: bool,
        resolutions: &Resolutions,
    ) -> EngineResult<ElectionApportionment> {
        let election = proportional(business)?;
        if election.method != ApportionmentMethod::HagenbachBischoff {
            return Err(EngineError::Validation(format!(
                "election {} is apportioned by {}",
                business.id, election.method
            )));
        }
        Self::check_ready(end_result, mandate_distribution_triggered)?;

        info!(
            political_business_id = %business.id,
            mandates = business.number_of_mandates,
            "starting hagenbach-bischoff apportionment"
        );

        let votes = end_result.list_votes();
        let input = HbInput {
            number_of_mandates: business.number_of_mandates,
            lists: election
                .lists
                .iter()
                .map(|l| HbListInput {
                    list_id: l.id,
                    position: l.position,
                    vote_count: votes.get(&l.id).copied().unwrap_or(0),
                })
                .collect(),
            list_unions: election.list_unions.clone(),
        };

        let outcome = HagenbachBischoff::apportion(&input, resolutions)?;
        let mut end_result = end_result.clone();
        apply_list_seats(&mut end_result, &outcome.list_seats(), outcome.is_complete());

        Ok(ElectionApportionment { end_result, outcome })
    }

    /// 选举联合的双重比例分配
    ///
    /// `businesses` 与 `end_results` 按选举 id 匹配，顺序无关
    pub fn apportion_union(
        &self,
        union: &ProportionalElectionUnion,
        businesses: &[PoliticalBusiness],
        end_results: &[EndResult],
        mandate_distribution_triggered: bool,
        resolutions: &Resolutions,
    ) -> EngineResult<UnionApportionment> {
        if union.election_ids.is_empty() {
            return Err(EngineError::Validation(format!(
                "election union {} has no elections",
                union.id
            )));
        }

        let mut elections = Vec::with_capacity(union.election_ids.len());
        let mut members = Vec::with_capacity(union.election_ids.len());
        for election_id in &union.election_ids {
            let business = businesses
                .iter()
                .find(|b| &b.id == election_id)
                .ok_or_else(|| EngineError::not_found("PoliticalBusiness", election_id))?;
            let end_result = end_results
                .iter()
                .find(|r| &r.political_business_id == election_id)
                .ok_or_else(|| EngineError::not_found("EndResult", election_id))?;

            let election = proportional(business)?;
            if election.method != ApportionmentMethod::DoubleProportional {
                return Err(EngineError::Validation(format!(
                    "election {} is apportioned by {}",
                    business.id, election.method
                )));
            }
            Self::check_ready(end_result, mandate_distribution_triggered)?;

            let votes = end_result.list_votes();
            elections.push(DpElectionInput {
                election_id: business.id,
                number_of_mandates: business.number_of_mandates,
                lists: election
                    .lists
                    .iter()
                    .map(|l| DpListInput {
                        list_id: l.id,
                        union_key: l.union_key.clone(),
                        vote_count: votes.get(&l.id).copied().unwrap_or(0),
                    })
                    .collect(),
            });
            members.push(end_result);
        }

        info!(
            election_union_id = %union.id,
            elections = elections.len(),
            "starting double proportional apportionment"
        );

        let outcome = self
            .double_proportional
            .apportion(&DpInput { elections }, resolutions)?;

        let complete = outcome.is_complete();
        let end_results = members
            .into_iter()
            .map(|member| {
                let mut end_result = member.clone();
                let seats = outcome.election_list_seats(&end_result.political_business_id);
                apply_list_seats(&mut end_result, &seats, complete);
                end_result
            })
            .collect();

        Ok(UnionApportionment { end_results, outcome })
    }

    /// 定稿
    ///
    /// 存在待决抽签或分配不完整时拒绝
    pub fn finalize(end_result: &mut EndResult, lot_decisions: &[LotDecision]) -> EngineResult<()> {
        if !end_result.all_circles_done() {
            return Err(EngineError::Precondition(
                "cannot finalize before all counting circles are done".to_string(),
            ));
        }

        let pending: Vec<&str> = lot_decisions
            .iter()
            .filter(|d| d.is_pending())
            .map(|d| d.id.as_str())
            .collect();
        if !pending.is_empty() {
            return Err(EngineError::Precondition(format!(
                "cannot finalize while lot decisions are pending: {}",
                pending.join(", ")
            )));
        }

        if end_result.lists.iter().any(|l| l.seats.is_none()) {
            return Err(EngineError::Precondition(
                "cannot finalize before the apportionment is complete".to_string(),
            ));
        }

        end_result.finalized = true;
        info!(
            political_business_id = %end_result.political_business_id,
            "end result finalized"
        );
        Ok(())
    }
}

fn proportional(business: &PoliticalBusiness) -> EngineResult<&ProportionalElection> {
    business.as_proportional().ok_or_else(|| {
        EngineError::Validation(format!(
            "political business {} is not a proportional election",
            business.id
        ))
    })
}

/// 回写名单议席与候选人当选状态
///
/// 分配不完整时议席保持为空，候选人保持待定
fn apply_list_seats(end_result: &mut EndResult, seats: &BTreeMap<ListId, u32>, complete: bool) {
    for list in end_result.lists.iter_mut() {
        list.seats = if complete {
            Some(seats.get(&list.list_id).copied().unwrap_or(0))
        } else {
            None
        };
    }
    if !complete {
        return;
    }

    for list in &end_result.lists {
        let list_seats = list.seats.unwrap_or(0) as usize;
        let mut members: Vec<(u64, u32, usize)> = end_result
            .candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.list_id == Some(list.list_id))
            .map(|(index, c)| (c.vote_count, c.position, index))
            .collect();
        members.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let states: Vec<(usize, CandidateEndResultState)> = members
            .iter()
            .enumerate()
            .map(|(order, (_, _, index))| {
                let state = if order < list_seats {
                    CandidateEndResultState::Elected
                } else {
                    CandidateEndResultState::NotElected
                };
                (*index, state)
            })
            .collect();
        for (index, state) in states {
            end_result.candidates[index].state = Some(state);
        }
    }

    debug!(
        political_business_id = %end_result.political_business_id,
        seats = seats.values().sum::<u32>(),
        "list seats applied"
    );
}
