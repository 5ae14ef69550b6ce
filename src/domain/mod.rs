// ==========================================
// 选举计票系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod apportionment;
pub mod bundle;
pub mod context;
pub mod political_business;
pub mod result;
pub mod types;

// 重导出核心类型
pub use apportionment::{
    ApportionmentNode, CalculationRound, LotDecision, LotDecisionResolution, LotDecisionScope,
    LotDecisionState, NodeIndex, NodeKey, TiedEntity,
};
pub use bundle::{Ballot, BallotInput, BallotSubtotal, Bundle};
pub use context::ActorContext;
pub use political_business::{
    BallotRules, CandidateRef, ElectionCandidate, ElectionList, ElectionVariant, ListUnion,
    MajorityCandidate, MajorityElection, PoliticalBusiness, PoliticalBusinessKind,
    ProportionalElection, ProportionalElectionUnion,
};
pub use result::{
    CandidateEndResult, CountingCircleResult, EndResult, ListEndResult, VoterCounts,
    VotingCardCount,
};
pub use types::{
    ApportionmentMethod, BundleId, BundleState, CandidateEndResultState, CandidateId,
    CountingCircleId, CountingCircleResultState, ListId, PoliticalBusinessId, ResultId, Role,
    VotingChannel,
};
