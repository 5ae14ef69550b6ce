// ==========================================
// 选举计票系统 - 选票校验
// ==========================================
// 职责: 拒绝格式错误的选票
// 规则:
//   1. 完全空白的选票只能以空行数表示，且必须允许空行
//   2. 候选人行 + 空行 不超过议席数
//   3. 候选人必须属于本选举
//   4. 同一候选人出现次数不超过累积上限
// ==========================================

use crate::domain::bundle::BallotInput;
use crate::domain::political_business::BallotRules;
use crate::domain::types::{CandidateId, ListId};
use crate::engine::error::{EngineError, EngineResult};
use std::collections::BTreeMap;

pub struct BallotValidator<'a> {
    rules: &'a BallotRules,
}

impl<'a> BallotValidator<'a> {
    pub fn new(rules: &'a BallotRules) -> Self {
        Self { rules }
    }

    /// 校验一张选票
    ///
    /// # 参数
    /// - `input`: 录入内容
    /// - `bundle_list`: 票包所属名单（名单票包的空行计入该名单）
    pub fn validate(&self, input: &BallotInput, bundle_list: Option<ListId>) -> EngineResult<()> {
        if let Some(list_id) = bundle_list {
            if !self.rules.list_ids.contains(&list_id) {
                return Err(EngineError::InvalidBallot(format!(
                    "bundle list {} does not belong to this election",
                    list_id
                )));
            }
        }

        if input.selections.is_empty() && input.empty_vote_count == 0 {
            return Err(EngineError::InvalidBallot(
                "ballot has neither candidates nor empty votes".to_string(),
            ));
        }

        if input.empty_vote_count > 0 && !self.rules.allow_empty_votes {
            return Err(EngineError::InvalidBallot(
                "empty votes are not allowed for this election".to_string(),
            ));
        }

        let rows = input.selections.len() as u64 + u64::from(input.empty_vote_count);
        if rows > u64::from(self.rules.number_of_mandates) {
            return Err(EngineError::InvalidBallot(format!(
                "ballot has {} rows but only {} are available",
                rows, self.rules.number_of_mandates
            )));
        }

        let mut occurrences: BTreeMap<CandidateId, u32> = BTreeMap::new();
        for candidate_id in &input.selections {
            let candidate = self.rules.candidates.get(candidate_id).ok_or_else(|| {
                EngineError::InvalidBallot(format!("unknown candidate {}", candidate_id))
            })?;

            let count = occurrences.entry(*candidate_id).or_insert(0);
            *count += 1;
            if *count > candidate.max_occurrences {
                return Err(EngineError::InvalidBallot(format!(
                    "candidate {} appears {} times, at most {} allowed",
                    candidate_id, count, candidate.max_occurrences
                )));
            }
        }

        Ok(())
    }
}
