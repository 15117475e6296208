#![doc = r#"
# spark-cluster

## 设计动机（Why）
- **定位**：集群协调引擎，负责端点发现、身份握手、配置对象复制与检查任务的
  委派分发，是多节点协同运行的粘合层。
- **架构角色**：坐在 `spark-core` 的契约之上，通过 [`transport::Channel`] 抽象
  对接具体传输实现（生产环境可接入 `spark-transport-tcp`），自身不关心字节
  如何上线。

## 核心契约（What）
- [`EndpointManager`] 是唯一的端点注册表与消息路由入口：单播、多播与带超时
  关联的 API 调用都经由它完成。
- [`discovery::DiscoveryEngine`]、[`replication::ReplicationEngine`]、
  [`delegation::DelegationEngine`]、[`checker::CheckerIngress`] 各自订阅自己
  的方法命名空间，彼此不直接调用。
- [`checker::CheckerIngress`] 对外暴露两个回调：[`checker::CheckResultSink`]
  接收去重后的检查结果，[`checker::NextCheckObserver`] 在结果携带下一次检查
  时间时通知外部调度器。

## 实现策略（How）
- 每个引擎在 `start()` 时把处理函数注册进 `EndpointManager`，此后完全由消息
  驱动；没有共享的全局状态机。
- 本地端点与远程端点共用同一套 [`endpoint::Endpoint`] 类型，区别只在于
  `is_local()`——本地投递走处理函数表，远程投递走出站队列。

## 风险与考量（Trade-offs）
- 对象存储（[`object_store::ObjectStore`]）目前不保留历史版本，`BuildUpdate`
  总是返回所选属性类的完整当前值，不是真正的增量 diff。
"#]

pub mod checker;
pub mod codec;
pub mod config;
pub mod delegation;
pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod manager;
pub mod object_store;
pub mod replication;
pub mod transport;

pub use checker::{
    CheckResultSink, CheckerIngress, CheckerStats, NextCheckObserver, NoopCheckResultSink, NoopNextCheckObserver,
};
pub use codec::{EndpointId, MethodName, ParamMap, ParamValue, Request};
pub use config::{ClusterConfig, EndpointConfig, RoleConfig};
pub use delegation::DelegationEngine;
pub use discovery::{ComponentDiscoveryInfo, DiscoveryEngine, DiscoveryMessage};
pub use endpoint::{ConnectionState, Endpoint};
pub use error::ClusterError;
pub use manager::EndpointManager;
pub use object_store::{AttributeClass, AttributeMask, DynamicObject, ObjectStore, Origin, RegisterOutcome, TransactionId};
pub use replication::ReplicationEngine;
pub use transport::{Channel, Connector, Listener};

use std::sync::Arc;

/// Bootstraps one node's worth of cluster engines over a shared
/// [`EndpointManager`] and [`ObjectStore`], and starts them all.
///
/// This is a convenience for the common case (every engine wired against the
/// same manager/store); nothing stops a host from constructing and starting
/// the engines individually instead.
pub struct ClusterNode {
    pub manager: Arc<EndpointManager>,
    pub store: Arc<ObjectStore>,
    pub discovery: Arc<DiscoveryEngine>,
    pub replication: Arc<ReplicationEngine>,
    pub delegation: Arc<DelegationEngine>,
    pub checker: Arc<CheckerIngress>,
}

impl ClusterNode {
    pub fn new(config: ClusterConfig, connector: Option<Arc<dyn Connector>>, check_result_sink: Arc<dyn CheckResultSink>) -> Result<Self, ClusterError> {
        Self::with_next_check_observer(config, connector, check_result_sink, Arc::new(NoopNextCheckObserver))
    }

    pub fn with_next_check_observer(
        config: ClusterConfig,
        connector: Option<Arc<dyn Connector>>,
        check_result_sink: Arc<dyn CheckResultSink>,
        next_check_observer: Arc<dyn NextCheckObserver>,
    ) -> Result<Self, ClusterError> {
        config.validate()?;
        let config = Arc::new(config);

        let manager = EndpointManager::new(config.identity.clone(), config.api_timeout());
        let store = Arc::new(ObjectStore::new());

        let self_endpoint = Arc::new(Endpoint::new(EndpointId::from(config.identity.as_str()), true));
        manager.register_endpoint(self_endpoint);

        let discovery = DiscoveryEngine::new(manager.clone(), config.clone(), connector);
        let replication = ReplicationEngine::new(manager.clone(), store.clone());
        let delegation = DelegationEngine::new(manager.clone(), store.clone(), config.delegation_interval());
        let checker = CheckerIngress::with_next_check_observer(manager.clone(), check_result_sink, next_check_observer);

        Ok(Self {
            manager,
            store,
            discovery,
            replication,
            delegation,
            checker,
        })
    }

    pub fn start(&self) {
        self.discovery.start();
        self.replication.start();
        self.delegation.start();
        self.checker.start();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(identity: &str) -> ClusterConfig {
        ClusterConfig {
            identity: identity.to_string(),
            endpoints: Vec::new(),
            roles: Default::default(),
            registration_ttl_secs: 300,
            discovery_interval_secs: 30,
            delegation_interval_secs: 30,
            api_timeout_secs: 1,
        }
    }

    #[test]
    fn missing_identity_is_rejected_at_construction() {
        let result = ClusterNode::new(config(""), None, Arc::new(NoopCheckResultSink));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn node_bootstraps_with_a_local_endpoint_registered() {
        let node = ClusterNode::new(config("node-a"), None, Arc::new(NoopCheckResultSink)).unwrap();
        assert!(node.manager.endpoint_by_identity("node-a").is_some());
    }
}
