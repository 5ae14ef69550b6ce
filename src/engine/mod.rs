// ==========================================
// 选举计票系统 - 引擎层
// ==========================================
// 职责: 票包工作流、事件投影、结果汇总、议席分配、抽签决定
// 红线: Engine 不拼 SQL，全部为纯函数或无状态结构
// ==========================================

pub mod aggregator;
pub mod ballot_validator;
pub mod bundle_workflow;
pub mod double_proportional;
pub mod error;
pub mod events;
pub mod hagenbach_bischoff;
pub mod lot_decision;
pub mod orchestrator;
pub mod projector;
pub mod sampling;

// 重导出核心引擎
pub use aggregator::{AggregationScope, ResultAggregator};
pub use ballot_validator::BallotValidator;
pub use bundle_workflow::{
    evolve, BundleCommand, BundleEnvironment, BundleNumbers, BundleWorkflow, CommandOutcome,
};
pub use double_proportional::{DoubleProportional, DoubleProportionalResult};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use events::{
    BundleEvent, ChangeKind, ChangeNotification, ChangePublisher, EventEnvelope,
    NoOpChangePublisher, OptionalChangePublisher,
};
pub use hagenbach_bischoff::{HagenbachBischoff, HagenbachBischoffResult, HbInput, HbListInput};
pub use lot_decision::{LotDecisionRegistry, Resolutions};
pub use orchestrator::{
    ApportionmentOrchestrator, ApportionmentOutcome, ElectionApportionment, UnionApportionment,
};
pub use projector::{EventProjector, ResultBundleProjection};
pub use sampling::draw_review_sample;
