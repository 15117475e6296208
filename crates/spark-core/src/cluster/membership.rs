use crate::{
    BoxFuture,
    cluster::{
        backpressure::{SubscriptionFlowControl, SubscriptionStream},
        topology::{ClusterConsistencyLevel, ClusterEpoch, ClusterRevision, RoleDescriptor},
    },
    error::CoreError,
    transport::Endpoint,
};
use alloc::{collections::BTreeMap, string::String, vec::Vec};

/// 集群领域统一使用的错误类型别名。
///
/// 直接复用框架级的 [`CoreError`]，避免重复定义错误枚举，并兼容链路追踪元数据。
pub type ClusterError = CoreError;

/// 节点唯一标识。
pub type NodeId = String;

/// 节点健康状态枚举。
///
/// # 契约说明（What）
/// - `Active`：节点可完全提供服务能力。
/// - `Degraded`：节点仍在线，但性能或功能受限，建议路由层降权。
/// - `Unreachable`：节点不可达，应立即停止流量。
/// - `Retiring`：节点正在退出，拒绝新流量但允许完成存量请求。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClusterNodeState {
    Active,
    Degraded,
    Unreachable,
    Retiring,
}

/// 节点全量画像。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterNodeProfile {
    pub node_id: NodeId,
    pub endpoint: Endpoint,
    pub roles: Vec<RoleDescriptor>,
    pub metadata: BTreeMap<String, String>,
    pub state: ClusterNodeState,
    pub revision: ClusterRevision,
}

/// 快照级别的成员集合。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterMembershipSnapshot {
    pub epoch: ClusterEpoch,
    pub members: Vec<ClusterNodeProfile>,
    pub generated_at_revision: ClusterRevision,
}

/// 订阅范围选择器。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClusterScopeSelector {
    EntireCluster,
    ByRole(RoleDescriptor),
    ByShard(String),
    Custom(String),
}

/// 成员订阅的范围描述。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterMembershipScope {
    pub selector: ClusterScopeSelector,
    pub consistency: ClusterConsistencyLevel,
}

impl ClusterMembershipScope {
    /// 创建订阅全量节点、最终一致性的默认范围。
    pub fn entire_cluster() -> Self {
        Self {
            selector: ClusterScopeSelector::EntireCluster,
            consistency: ClusterConsistencyLevel::Eventual,
        }
    }
}

/// 成员事件流。
#[derive(Clone, Debug)]
pub enum ClusterMembershipEvent {
    SnapshotApplied(ClusterMembershipSnapshot),
    MemberJoined {
        revision: ClusterRevision,
        profile: ClusterNodeProfile,
    },
    MemberUpdated {
        revision: ClusterRevision,
        profile: ClusterNodeProfile,
    },
    MemberStateChanged {
        revision: ClusterRevision,
        node_id: NodeId,
        new_state: ClusterNodeState,
    },
    MemberRetired {
        revision: ClusterRevision,
        node_id: NodeId,
    },
    MemberUnreachable {
        revision: ClusterRevision,
        node_id: NodeId,
    },
}

/// 集群成员管理契约。
///
/// # 逻辑解析（How）
/// - `snapshot`：获取指定范围的全量视图，应尊重 `consistency` 的语义。
/// - `subscribe`：返回一个流式事件源，可选起始修订号用于断点续传，并允许通过
///   [`SubscriptionFlowControl`] 协商缓冲模式与队列探针。
/// - `self_profile`：提供运行时自身节点的画像，便于 Handler 决策。
///
/// # 错误契约（Error Contract）
/// - `snapshot`/`subscribe` 在网络分区或领导权丢失时分别返回
///   [`crate::error::codes::CLUSTER_NETWORK_PARTITION`] / [`crate::error::codes::CLUSTER_LEADER_LOST`]。
/// - `subscribe` 在背压策略为 `FailStream` 且缓冲耗尽时返回
///   [`crate::error::codes::CLUSTER_QUEUE_OVERFLOW`]。
/// - `self_profile` 读取到陈旧缓存时返回 [`crate::error::codes::DISCOVERY_STALE_READ`]。
pub trait ClusterMembership: Send + Sync + 'static {
    /// 获取指定范围的全量快照。
    fn snapshot(
        &self,
        scope: ClusterMembershipScope,
    ) -> BoxFuture<'static, Result<ClusterMembershipSnapshot, ClusterError>>;

    /// 订阅指定范围的增量事件。
    fn subscribe(
        &self,
        scope: ClusterMembershipScope,
        resume_from: Option<ClusterRevision>,
        backpressure: SubscriptionFlowControl,
    ) -> SubscriptionStream<ClusterMembershipEvent>;

    /// 获取当前节点的画像。
    fn self_profile(&self) -> BoxFuture<'static, Result<ClusterNodeProfile, ClusterError>>;
}
