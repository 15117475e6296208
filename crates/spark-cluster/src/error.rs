//! 集群引擎错误域。
//!
//! 归档端点管理、发现、复制、委派四个子系统的失败路径，并提供向
//! [`spark_core::SparkError`] 的转换，便于宿主统一处理。

use std::string::String;

use spark_core::SparkError;
use thiserror::Error;

use crate::endpoint::ConnectionState;

/// 集群引擎的错误类型。
///
/// 传输失败、身份冲突等事件在协议层面是*可观测事件*而非异常：引擎内部只在记录日志、
/// 决定是否重连、或向调用方的回调传递超时标记时构造本类型的值，几乎从不经由
/// `?` 向上传播穿越模块边界。
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum ClusterError {
    #[error("transport failure talking to `{identity}`: {detail}")]
    Transport { identity: String, detail: String },

    #[error("malformed or unexpected message from `{identity}`: {detail}")]
    Protocol { identity: String, detail: String },

    #[error("`{identity}` lacks permission for `{method}`")]
    PermissionDenied { identity: String, method: String },

    #[error("semantic violation from `{identity}`: {detail}")]
    SemanticViolation { identity: String, detail: String },

    #[error("identity `{identity}` collided with an existing endpoint")]
    IdentityCollision { identity: String },

    #[error("endpoint `{identity}` is not registered")]
    UnknownEndpoint { identity: String },

    #[error("endpoint `{identity}` in state {state:?} cannot transition to {target:?}")]
    InvalidTransition {
        identity: String,
        state: ConnectionState,
        target: ConnectionState,
    },

    #[error("pending call `{call_id}` timed out")]
    CallTimedOut { call_id: String },

    #[error("required configuration key `{key}` is missing")]
    MissingConfig { key: String },

    #[error("internal cluster engine failure: {detail}")]
    Internal { detail: String },
}

impl From<ClusterError> for SparkError {
    fn from(value: ClusterError) -> Self {
        match value {
            ClusterError::Transport { identity, detail } => SparkError::new(
                "cluster.transport",
                format!("transport failure talking to `{identity}`: {detail}"),
            ),
            ClusterError::Protocol { identity, detail } => SparkError::new(
                "cluster.protocol",
                format!("malformed message from `{identity}`: {detail}"),
            ),
            ClusterError::PermissionDenied { identity, method } => SparkError::new(
                "cluster.permission_denied",
                format!("`{identity}` lacks permission for `{method}`"),
            ),
            ClusterError::SemanticViolation { identity, detail } => SparkError::new(
                "cluster.semantic_violation",
                format!("semantic violation from `{identity}`: {detail}"),
            ),
            ClusterError::IdentityCollision { identity } => SparkError::new(
                "cluster.identity_collision",
                format!("identity `{identity}` collided with an existing endpoint"),
            ),
            ClusterError::UnknownEndpoint { identity } => SparkError::new(
                "cluster.node_unavailable",
                format!("endpoint `{identity}` is not registered"),
            ),
            ClusterError::InvalidTransition {
                identity,
                state,
                target,
            } => SparkError::new(
                "cluster.invalid_transition",
                format!("endpoint `{identity}` cannot move {state:?} -> {target:?}"),
            ),
            ClusterError::CallTimedOut { call_id } => SparkError::new(
                "cluster.call_timed_out",
                format!("pending call `{call_id}` timed out"),
            ),
            ClusterError::MissingConfig { key } => SparkError::new(
                "cluster.missing_config",
                format!("required configuration key `{key}` is missing"),
            ),
            ClusterError::Internal { detail } => {
                SparkError::new("cluster.internal", format!("internal failure: {detail}"))
            }
        }
    }
}
