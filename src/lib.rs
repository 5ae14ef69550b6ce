// ==========================================
// 选举计票系统 - 核心库
// ==========================================
// 流程: 票包审核 → 结果汇总 → 议席分配 → 抽签裁决 → 定稿
// 技术栈: Rust + SQLite + tokio
// 系统定位: 计票辅助系统 (定稿前人工裁决并列)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ApportionmentMethod, BundleState, CandidateEndResultState, CountingCircleResultState, Role,
    VotingChannel,
};

// 领域实体
pub use domain::{
    ActorContext, Ballot, Bundle, CountingCircleResult, EndResult, LotDecision,
    LotDecisionResolution, PoliticalBusiness, ProportionalElectionUnion,
};

// 引擎
pub use engine::{
    ApportionmentOrchestrator, BundleWorkflow, DoubleProportional, EngineError, EventProjector,
    HagenbachBischoff, ResultAggregator,
};

// API
pub use api::{BundleApi, ChangeFeed, ChangeFilter, ResultApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "election-tally";
