// ==========================================
// 选举计票系统 - Hagenbach-Bischoff 议席分配
// ==========================================
// 输入: 名单得票 + 名单联合/子名单联合 + 议席数
// 输出: 名单议席 + 计算轮次（审计轨迹）+ 抽签决定
// ==========================================
// 规则:
//   每次分配一个议席，同级节点中 votes / (seats + 1) 最大者获胜
//   联合节点获胜后在其子节点中递归同一规则，直到具体名单
// 红线: 比较使用整数交叉相乘，不使用浮点
// 红线: 任一层出现并列且无有效裁决时停止分配，不自动指派
// ==========================================

mod core;
mod tree;

#[cfg(test)]
mod tests;

pub use self::core::{HagenbachBischoff, HagenbachBischoffResult, UnionSeatBreakdown};
pub use self::tree::{ApportionmentTree, HbInput, HbListInput};
