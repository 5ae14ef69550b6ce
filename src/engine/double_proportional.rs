// ==========================================
// 选举计票系统 - 双重比例议席分配（Pukelsheim）
// ==========================================
// 输入: 选举联合内各选举的名单得票（名单以 union_key 归并为联合名单）
// 输出: 联合名单 × 选举 的议席矩阵 + 行/列除数 + 抽签决定
// ==========================================
// 阶段:
//   1. 上层分配: 选民数（名单得票 / 选举议席，四舍五入）按联合名单求和，
//      Sainte-Laguë 决定行议席；列议席为各选举固定议席；
//      交替缩放求行/列除数，使 round(v / (R×C)) 同时满足行列边际
//   2. 下层分配: 单元议席取自收敛矩阵；仅当两行两列的交换同样成立时抽签
// 红线: 比较使用 Decimal 交叉相乘，不使用浮点
// 红线: 迭代次数有上限，不收敛时报错
// ==========================================

mod core;
mod divisor;
mod model;
mod sub_apportionment;
mod super_apportionment;

#[cfg(test)]
mod tests;

pub use self::core::DoubleProportional;
pub use self::model::{
    DoubleProportionalResult, DpCell, DpColumn, DpElectionInput, DpInput, DpListInput, DpRow,
};
