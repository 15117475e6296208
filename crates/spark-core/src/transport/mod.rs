//! 传输层地址与端点类型，供集群/路由等上层模块复用。
//!
//! # 模块定位（Why）
//! - `address`/`params`/`endpoint` 是与具体传输实现（TCP/QUIC/...)无关的纯数据类型，
//!   被 `cluster` 契约模块、`spark-cluster` 等上层 crate 直接引用。
//! - `builder`/`shutdown` 桥接到 `spark-transport` crate 中定义的运行时契约。
//!
//! # 取舍（Trade-offs）
//! - `traits/` 子树依赖尚未迁移完成的 `factory`/`intent`/`server` 模块，本次未重新连接，
//!   维持其独立、未编译进 crate 的状态，避免把无关子系统的缺口引入这次改动。

pub mod address;
pub mod builder;
pub mod endpoint;
pub mod params;
pub mod shutdown;

pub use address::TransportSocketAddr;
pub use builder::TransportBuilder;
pub use endpoint::{Endpoint, EndpointBuilder, EndpointKind};
pub use params::TransportParams;
pub use shutdown::ShutdownDirection;
