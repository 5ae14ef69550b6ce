// ==========================================
// 双重比例 - 输入/输出模型
// ==========================================

use crate::domain::apportionment::LotDecision;
use crate::domain::types::{ListId, PoliticalBusinessId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// 输入
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpListInput {
    pub list_id: ListId,
    /// 跨选举归并键
    pub union_key: String,
    pub vote_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpElectionInput {
    pub election_id: PoliticalBusinessId,
    pub number_of_mandates: u32,
    pub lists: Vec<DpListInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpInput {
    pub elections: Vec<DpElectionInput>,
}

impl DpInput {
    pub fn total_mandates(&self) -> u32 {
        self.elections.iter().map(|e| e.number_of_mandates).sum()
    }
}

// ==========================================
// 输出
// ==========================================

/// 联合名单（矩阵行）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpRow {
    pub union_key: String,
    pub vote_count: u64,
    pub voter_number: u64,
    pub seats: u32,
    pub divisor: Option<Decimal>,
}

/// 选举（矩阵列）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpColumn {
    pub election_id: PoliticalBusinessId,
    pub number_of_mandates: u32,
    pub vote_count: u64,
    pub divisor: Option<Decimal>,
}

/// 矩阵单元（= 某选举中的一个名单）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpCell {
    pub union_key: String,
    pub election_id: PoliticalBusinessId,
    pub list_id: ListId,
    pub vote_count: u64,
    /// 下层分配未完成时为 None
    pub seats: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoubleProportionalResult {
    pub number_of_mandates: u32,
    pub rows: Vec<DpRow>,
    pub columns: Vec<DpColumn>,
    pub cells: Vec<DpCell>,
    /// 交替缩放迭代次数
    pub iterations: u32,
    pub lot_decisions: Vec<LotDecision>,
}

impl DoubleProportionalResult {
    pub fn has_pending_lot_decisions(&self) -> bool {
        self.lot_decisions.iter().any(LotDecision::is_pending)
    }

    /// 无待决抽签，全部单元已分配，且单元议席同时满足行边际与列边际
    pub fn is_complete(&self) -> bool {
        !self.has_pending_lot_decisions()
            && self.cells.iter().all(|c| c.seats.is_some())
            && self.rows.iter().all(|r| self.union_seats(&r.union_key) == r.seats)
            && self
                .columns
                .iter()
                .all(|c| self.election_list_seats(&c.election_id).values().sum::<u32>() == c.number_of_mandates)
    }

    /// 某联合名单在全部选举中的单元议席之和
    pub fn union_seats(&self, union_key: &str) -> u32 {
        self.cells
            .iter()
            .filter(|c| c.union_key == union_key)
            .filter_map(|c| c.seats)
            .sum()
    }

    pub fn list_seats(&self) -> BTreeMap<ListId, u32> {
        self.cells
            .iter()
            .filter_map(|c| c.seats.map(|s| (c.list_id, s)))
            .collect()
    }

    pub fn election_list_seats(&self, election_id: &PoliticalBusinessId) -> BTreeMap<ListId, u32> {
        self.cells
            .iter()
            .filter(|c| &c.election_id == election_id)
            .filter_map(|c| c.seats.map(|s| (c.list_id, s)))
            .collect()
    }

    pub fn row_seat_sum(&self) -> u32 {
        self.rows.iter().map(|r| r.seats).sum()
    }

    pub fn column_seat_sum(&self) -> u32 {
        self.cells.iter().filter_map(|c| c.seats).sum()
    }

    pub fn row(&self, union_key: &str) -> Option<&DpRow> {
        self.rows.iter().find(|r| r.union_key == union_key)
    }
}
