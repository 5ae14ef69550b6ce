// ==========================================
// 选举计票系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化
// ==========================================

pub mod bundle_event_repo;
pub mod counting_circle_result_repo;
pub mod error;
pub mod lot_decision_repo;

// 重导出核心仓储
pub use bundle_event_repo::BundleEventRepository;
pub use counting_circle_result_repo::CountingCircleResultRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use lot_decision_repo::LotDecisionRepository;
