//! 集群契约模块。
//!
//! # 模块定位（Why）
//! - 将集群契约拆分为"成员管理"、"服务发现"、"拓扑抽象"三部分，对应云原生主流平台
//!   （Kubernetes、Consul、Eureka、etcd）在生产中的职责划分。
//! - `spark-cluster` crate 在这些契约之上实现一套具体的、有状态的集群协调引擎
//!   （端点管理、发现、配置复制、检查委派）。
//!
//! # 架构关系（How）
//! - `membership`：节点身份、状态与增量事件流的统一契约。
//! - `discovery`：逻辑服务解析与订阅接口。
//! - `topology`：跨模块共享的拓扑语义（角色、修订号、一致性等级）。
//! - `backpressure`：成员订阅与服务发现共用的流控/队列观测类型。

pub mod backpressure;
pub mod discovery;
pub mod membership;
pub mod topology;

pub use backpressure::{
    FlowControlMode, OverflowPolicy, SubscriptionFlowControl, SubscriptionQueueProbe,
    SubscriptionQueueSnapshot, SubscriptionStream,
};
pub use discovery::{
    DiscoveryEvent, DiscoverySnapshot, ServiceDiscovery, ServiceInstance, ServiceName,
};
pub use membership::{
    ClusterError, ClusterMembership, ClusterMembershipEvent, ClusterMembershipScope,
    ClusterMembershipSnapshot, ClusterNodeProfile, ClusterNodeState, ClusterScopeSelector, NodeId,
};
pub use topology::{ClusterConsistencyLevel, ClusterEpoch, ClusterRevision, RoleDescriptor};
