// ==========================================
// Hagenbach-Bischoff - 逐席分配
// ==========================================

use crate::domain::apportionment::{
    CalculationRound, LotDecision, LotDecisionScope, NodeIndex, NodeKey, TiedEntity,
};
use crate::domain::types::ListId;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::lot_decision::{settle, Resolutions};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::tree::{ApportionmentTree, HbInput};

/// 展示用比值的小数位
const RATIO_DISPLAY_SCALE: u32 = 6;

/// 名单联合 / 子名单联合的议席明细
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionSeatBreakdown {
    pub union: NodeKey,
    pub vote_count: u64,
    pub seats: u32,
    pub members: Vec<(NodeKey, u64, u32)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HagenbachBischoffResult {
    pub number_of_mandates: u32,
    pub tree: ApportionmentTree,
    /// 按议席顺序追加
    pub rounds: Vec<CalculationRound>,
    pub lot_decisions: Vec<LotDecision>,
}

impl HagenbachBischoffResult {
    pub fn assigned_seats(&self) -> u32 {
        self.tree.list_seats().values().sum()
    }

    /// 全部议席已分配（无待决抽签）
    pub fn is_complete(&self) -> bool {
        self.assigned_seats() == self.number_of_mandates
            && self.lot_decisions.iter().all(|d| !d.is_pending())
    }

    pub fn has_pending_lot_decisions(&self) -> bool {
        self.lot_decisions.iter().any(LotDecision::is_pending)
    }

    pub fn list_seats(&self) -> BTreeMap<ListId, u32> {
        self.tree.list_seats()
    }

    /// 顶层名单联合议席表
    pub fn list_union_table(&self) -> Vec<UnionSeatBreakdown> {
        self.breakdown(|key| matches!(key, NodeKey::ListUnion(_)))
    }

    /// 子名单联合议席表
    pub fn sub_list_union_table(&self) -> Vec<UnionSeatBreakdown> {
        self.breakdown(|key| matches!(key, NodeKey::SubListUnion(_)))
    }

    fn breakdown(&self, select: impl Fn(&NodeKey) -> bool) -> Vec<UnionSeatBreakdown> {
        self.tree
            .nodes()
            .iter()
            .filter(|n| select(&n.key))
            .map(|n| UnionSeatBreakdown {
                union: n.key,
                vote_count: n.vote_count,
                seats: n.seats,
                members: n
                    .children
                    .iter()
                    .map(|c| {
                        let child = self.tree.node(*c);
                        (child.key, child.vote_count, child.seats)
                    })
                    .collect(),
            })
            .collect()
    }
}

/// 比较 a.votes/(a.seats+1) 与 b.votes/(b.seats+1)
fn compare_ratio(a_votes: u64, a_seats: u32, b_votes: u64, b_seats: u32) -> Ordering {
    let left = u128::from(a_votes) * (u128::from(b_seats) + 1);
    let right = u128::from(b_votes) * (u128::from(a_seats) + 1);
    left.cmp(&right)
}

fn display_ratio(votes: u64, seats: u32) -> Decimal {
    (Decimal::from(votes) / Decimal::from(u64::from(seats) + 1)).round_dp(RATIO_DISPLAY_SCALE)
}

/// 决定 id: hb/{父节点}/{议席序号}
pub fn decision_id(parent: &NodeKey, seat_number: u32) -> String {
    format!("hb/{}/{}", parent, seat_number)
}

// ==========================================
// HagenbachBischoff - 引擎（无状态）
// ==========================================
pub struct HagenbachBischoff;

impl HagenbachBischoff {
    /// 执行议席分配
    ///
    /// # 参数
    /// - `input`: 名单得票与联合
    /// - `resolutions`: 已有抽签裁决（按决定 id）
    ///
    /// # 返回
    /// 出现未裁决的并列时提前停止，剩余议席不分配
    pub fn apportion(input: &HbInput, resolutions: &Resolutions) -> EngineResult<HagenbachBischoffResult> {
        let mut tree = ApportionmentTree::build(input)?;

        if input.number_of_mandates > 0 && tree.root().vote_count == 0 {
            return Err(EngineError::Precondition(
                "no votes available for apportionment".to_string(),
            ));
        }

        let mut rounds = Vec::with_capacity(input.number_of_mandates as usize);
        let mut lot_decisions = Vec::new();

        'seats: for seat_number in 1..=input.number_of_mandates {
            let mut parent = ApportionmentTree::ROOT;

            loop {
                let parent_key = tree.node(parent).key;
                let children = tree.node(parent).children.clone();
                let tied = Self::leading_children(&tree, &children);

                let (winner, decided_by_lot) = if tied.len() == 1 {
                    (tied[0], false)
                } else {
                    let decision = LotDecision::new(
                        decision_id(&parent_key, seat_number),
                        LotDecisionScope::HagenbachBischoff { parent: parent_key },
                        seat_number,
                        tied.iter()
                            .map(|i| TiedEntity {
                                entity_id: tree.node(*i).key.entity_id(),
                                vote_count: tree.node(*i).vote_count,
                            })
                            .collect(),
                    );
                    let (decision, chosen) = settle(decision, resolutions);
                    let chosen_index = chosen.and_then(|entity_id| {
                        tied.iter()
                            .copied()
                            .find(|i| tree.node(*i).key.entity_id() == entity_id)
                    });

                    match chosen_index {
                        Some(index) => {
                            lot_decisions.push(decision);
                            (index, true)
                        }
                        None => {
                            info!(
                                decision_id = %decision.id,
                                seat_number,
                                tied = decision.tied.len(),
                                "tie requires lot decision, apportionment paused"
                            );
                            lot_decisions.push(decision);
                            break 'seats;
                        }
                    }
                };

                let winner_node = tree.node_mut(winner);
                let ratio = display_ratio(winner_node.vote_count, winner_node.seats);
                winner_node.seats += 1;
                let round = CalculationRound {
                    seat_number,
                    scope: parent_key,
                    winner: winner_node.key,
                    ratio,
                    cumulative_seats: winner_node.seats,
                    decided_by_lot,
                };
                debug!(
                    seat_number,
                    scope = %round.scope,
                    winner = %round.winner,
                    ratio = %round.ratio,
                    "seat awarded"
                );
                rounds.push(round);

                if tree.node(winner).is_leaf() {
                    break;
                }
                parent = winner;
            }

            tree.node_mut(ApportionmentTree::ROOT).seats += 1;
        }

        let result = HagenbachBischoffResult {
            number_of_mandates: input.number_of_mandates,
            tree,
            rounds,
            lot_decisions,
        };

        info!(
            mandates = result.number_of_mandates,
            assigned = result.assigned_seats(),
            pending = result.has_pending_lot_decisions(),
            "hagenbach-bischoff apportionment finished"
        );
        Ok(result)
    }

    /// 同级中比值最大的节点（可能多个）
    fn leading_children(tree: &ApportionmentTree, children: &[NodeIndex]) -> Vec<NodeIndex> {
        let mut best: Vec<NodeIndex> = Vec::new();
        for child in children {
            let node = tree.node(*child);
            match best.first().map(|b| tree.node(*b)) {
                None => best.push(*child),
                Some(current) => {
                    match compare_ratio(node.vote_count, node.seats, current.vote_count, current.seats) {
                        Ordering::Greater => best = vec![*child],
                        Ordering::Equal => best.push(*child),
                        Ordering::Less => {}
                    }
                }
            }
        }
        best
    }
}
