// ==========================================
// 双重比例 - 引擎入口
// ==========================================

use crate::config::TallyConfig;
use crate::domain::types::{ListId, PoliticalBusinessId};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::lot_decision::Resolutions;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info, warn};

use super::divisor::voter_number;
use super::model::{DoubleProportionalResult, DpCell, DpColumn, DpInput, DpRow};
use super::sub_apportionment::{apportion_cells, CellMatrix};
use super::super_apportionment::{alternate_scaling, apportion_rows};

/// 双重比例引擎
///
/// 参数来自 TallyConfig（迭代上限、除数小数位）
#[derive(Debug, Clone, Copy)]
pub struct DoubleProportional {
    max_iterations: u32,
    divisor_scale: u32,
}

impl DoubleProportional {
    pub fn new(max_iterations: u32, divisor_scale: u32) -> Self {
        Self {
            max_iterations,
            divisor_scale,
        }
    }

    pub fn from_config(config: &TallyConfig) -> Self {
        Self::new(config.dp_max_iterations, config.dp_divisor_scale)
    }

    /// 执行双重比例分配
    ///
    /// # 返回
    /// - 上层出现未裁决并列: 仅行议席（部分），单元议席为 None
    /// - 下层出现未裁决并列: 交换涉及的两个选举的单元议席为 None
    /// - 交替缩放不收敛: NoConvergence
    pub fn apportion(&self, input: &DpInput, resolutions: &Resolutions) -> EngineResult<DoubleProportionalResult> {
        Self::validate(input)?;

        // ===== 矩阵骨架 =====
        let keys: Vec<String> = input
            .elections
            .iter()
            .flat_map(|e| e.lists.iter().map(|l| l.union_key.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let row_of: BTreeMap<&str, usize> = keys.iter().enumerate().map(|(i, k)| (k.as_str(), i)).collect();

        let mut row_votes = vec![0u64; keys.len()];
        let mut voter_numbers = vec![0u64; keys.len()];
        let mut votes = vec![vec![0u64; input.elections.len()]; keys.len()];
        let mut list_ids: Vec<Vec<Option<ListId>>> = vec![vec![None; input.elections.len()]; keys.len()];
        let mut cells = Vec::new();

        for (j, election) in input.elections.iter().enumerate() {
            for list in &election.lists {
                let i = row_of[list.union_key.as_str()];
                row_votes[i] += list.vote_count;
                voter_numbers[i] += voter_number(list.vote_count, election.number_of_mandates);
                votes[i][j] = list.vote_count;
                list_ids[i][j] = Some(list.list_id);
                cells.push(DpCell {
                    union_key: list.union_key.clone(),
                    election_id: election.election_id,
                    list_id: list.list_id,
                    vote_count: list.vote_count,
                    seats: None,
                });
            }
        }

        let mut columns: Vec<DpColumn> = input
            .elections
            .iter()
            .map(|e| DpColumn {
                election_id: e.election_id,
                number_of_mandates: e.number_of_mandates,
                vote_count: e.lists.iter().map(|l| l.vote_count).sum(),
                divisor: None,
            })
            .collect();

        // ===== 1. 行议席 =====
        let total = input.total_mandates();
        let row_apportionment = apportion_rows(&keys, &voter_numbers, total, resolutions);
        let mut lot_decisions = row_apportionment.lot_decisions;
        let mut rows: Vec<DpRow> = keys
            .iter()
            .enumerate()
            .map(|(i, key)| DpRow {
                union_key: key.clone(),
                vote_count: row_votes[i],
                voter_number: voter_numbers[i],
                seats: row_apportionment.seats[i],
                divisor: None,
            })
            .collect();

        if !row_apportionment.complete {
            return Ok(DoubleProportionalResult {
                number_of_mandates: total,
                rows,
                columns,
                cells,
                iterations: 0,
                lot_decisions,
            });
        }

        // ===== 2. 交替缩放（仅有议席的行） =====
        let active: Vec<usize> = (0..keys.len()).filter(|i| rows[*i].seats > 0).collect();
        let active_votes: Vec<Vec<Decimal>> = active
            .iter()
            .map(|i| votes[*i].iter().map(|v| Decimal::from(*v)).collect())
            .collect();
        let row_margins: Vec<u32> = active.iter().map(|i| rows[*i].seats).collect();
        let col_margins: Vec<u32> = input.elections.iter().map(|e| e.number_of_mandates).collect();

        let scaling = alternate_scaling(
            &active_votes,
            &row_margins,
            &col_margins,
            self.max_iterations,
            self.divisor_scale,
        )
        .map_err(|e| {
            warn!(max_iterations = self.max_iterations, "double proportional scaling did not converge");
            e
        })?;

        for (a, i) in active.iter().enumerate() {
            rows[*i].divisor = Some(scaling.row_divisors[a]);
        }
        debug!(
            iterations = scaling.iterations,
            matrix = ?scaling.seats,
            "super apportionment matrix"
        );

        // ===== 3. 下层分配: 单元议席取自收敛矩阵 =====
        let mut full_seats = vec![vec![0u32; input.elections.len()]; keys.len()];
        for (a, i) in active.iter().enumerate() {
            full_seats[*i] = scaling.seats[a].clone();
        }
        let election_ids: Vec<PoliticalBusinessId> = input.elections.iter().map(|e| e.election_id).collect();

        let outcome = apportion_cells(
            &CellMatrix {
                election_ids: &election_ids,
                list_ids: &list_ids,
                votes: &votes,
            },
            full_seats,
            resolutions,
        );
        lot_decisions.extend(outcome.lot_decisions);

        for (j, column) in columns.iter_mut().enumerate() {
            if !outcome.pending_columns.contains(&j) {
                column.divisor = Some(scaling.col_divisors[j]);
            }
        }
        for cell in cells.iter_mut() {
            let Some(j) = election_ids.iter().position(|e| *e == cell.election_id) else {
                continue;
            };
            if outcome.pending_columns.contains(&j) {
                continue;
            }
            let i = row_of[cell.union_key.as_str()];
            cell.seats = Some(outcome.seats[i][j]);
        }

        let result = DoubleProportionalResult {
            number_of_mandates: total,
            rows,
            columns,
            cells,
            iterations: scaling.iterations,
            lot_decisions,
        };

        info!(
            mandates = total,
            rows = result.rows.len(),
            columns = result.columns.len(),
            iterations = result.iterations,
            pending = result.has_pending_lot_decisions(),
            "double proportional apportionment finished"
        );
        Ok(result)
    }

    fn validate(input: &DpInput) -> EngineResult<()> {
        if input.elections.is_empty() {
            return Err(EngineError::Validation(
                "double proportional apportionment requires at least one election".to_string(),
            ));
        }

        let mut list_ids = HashSet::new();
        for election in &input.elections {
            if election.number_of_mandates == 0 {
                return Err(EngineError::Validation(format!(
                    "election {} has no mandates",
                    election.election_id
                )));
            }
            if election.lists.iter().map(|l| l.vote_count).sum::<u64>() == 0 {
                return Err(EngineError::Precondition(format!(
                    "election {} has no votes available for apportionment",
                    election.election_id
                )));
            }

            let mut keys = HashSet::new();
            for list in &election.lists {
                if !keys.insert(list.union_key.as_str()) {
                    return Err(EngineError::Validation(format!(
                        "union list {} appears twice in election {}",
                        list.union_key, election.election_id
                    )));
                }
                if !list_ids.insert(list.list_id) {
                    return Err(EngineError::Validation(format!("duplicate list {}", list.list_id)));
                }
            }
        }
        Ok(())
    }
}
