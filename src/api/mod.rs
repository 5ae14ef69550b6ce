// ==========================================
// 选举计票系统 - API 层
// ==========================================
// 职责: 组合工作流、事件存储、投影、汇总、议席分配与抽签
// 约定: 每个调用显式携带 ActorContext
// ==========================================

pub mod bundle_api;
pub mod catalog;
pub mod change_feed;
pub mod error;
pub mod permission;
pub mod result_api;
pub mod result_lock;

// 重导出核心类型
pub use bundle_api::BundleApi;
pub use catalog::ElectionCatalog;
pub use change_feed::{ChangeFeed, ChangeFilter, Subscription, SubscriptionHandle, DEFAULT_CHANGE_FEED_CAPACITY};
pub use error::{ApiError, ApiResult};
pub use permission::{ContextPermissionResolver, PermissionResolver, StaticPermissionResolver};
pub use result_api::{ConventionalResultEntry, ResultApi, ScopedApportionment};
pub use result_lock::ResultLocks;
