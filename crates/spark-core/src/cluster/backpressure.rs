//! 集群订阅背压与队列观测的统一抽象层。
//!
//! # 模块定位（Why）
//! - 将成员订阅与服务发现共用的背压语义集中管理，避免两个子模块各自维护一套选项导致概念漂移。
//! - 通过结构化的配置体与探针接口，引导调用方在高吞吐事件流中显式规划缓冲区与监控逻辑。
//!
//! # 协议互操作（How）
//! - [`SubscriptionFlowControl`] 以不可变配置的形式传入，实现可在建立订阅时决定缓冲模型与溢出策略。
//! - 若调用方启用队列观测，返回值 [`SubscriptionStream`] 会绑定一个实现 [`SubscriptionQueueProbe`] 的探针，
//!   使用者可定期查询以驱动指标或自适应节流算法。
//!
//! # 风险与扩展（Trade-offs）
//! - 有界缓冲策略需要实现层配合，否则 `Bounded` 模式可能退化为无界缓存；若无法满足需求，建议通过队列探针在运行期及时捕获异常信号。
use crate::BoxStream;
use alloc::sync::Arc;
use core::{fmt, num::NonZeroUsize};

/// 分布式订阅使用的溢出处理策略。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverflowPolicy {
    DropOldest,
    DropNewest,
    FailStream,
}

/// 流控模式，描述订阅内部使用的缓冲模型。
///
/// # 契约说明（What）
/// - `Unbounded`：实现无需显式限制缓冲深度，但仍可在内部进行流控（如背压下游或阻塞生产者）。
/// - `Bounded { capacity, overflow }`：调用方要求订阅在指定容量内运行，并以 [`OverflowPolicy`] 指定溢出时的处理方式。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowControlMode {
    Unbounded,
    Bounded {
        capacity: NonZeroUsize,
        overflow: OverflowPolicy,
    },
}

/// 订阅背压配置，调用方可通过构造函数表达期望行为。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionFlowControl {
    pub mode: FlowControlMode,
    pub observe_queue: bool,
}

impl SubscriptionFlowControl {
    /// 构造一个默认的无界配置。
    pub const fn unbounded() -> Self {
        Self {
            mode: FlowControlMode::Unbounded,
            observe_queue: false,
        }
    }

    /// 构造一个带容量限制的配置。
    pub const fn bounded(capacity: NonZeroUsize, overflow: OverflowPolicy) -> Self {
        Self {
            mode: FlowControlMode::Bounded { capacity, overflow },
            observe_queue: false,
        }
    }

    /// 请求实现提供队列观测能力。
    pub const fn with_queue_observation(mut self, enable: bool) -> Self {
        self.observe_queue = enable;
        self
    }
}

impl Default for SubscriptionFlowControl {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// 订阅流的返回体，承载事件流与可选的队列探针。
pub struct SubscriptionStream<T> {
    pub stream: BoxStream<'static, T>,
    pub queue_probe: Option<Arc<dyn SubscriptionQueueProbe>>,
}

impl<T> SubscriptionStream<T> {
    /// 仅使用事件流构建订阅返回体。
    pub fn new(stream: BoxStream<'static, T>) -> Self {
        Self {
            stream,
            queue_probe: None,
        }
    }

    /// 为订阅附加队列探针。
    pub fn with_probe(mut self, probe: Arc<dyn SubscriptionQueueProbe>) -> Self {
        self.queue_probe = Some(probe);
        self
    }
}

impl<T> fmt::Debug for SubscriptionStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionStream")
            .field("has_probe", &self.queue_probe.is_some())
            .finish()
    }
}

/// 订阅队列的观测快照。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubscriptionQueueSnapshot {
    pub capacity: Option<NonZeroUsize>,
    pub depth: usize,
    pub dropped_events: u64,
}

/// 订阅队列探针，用于查询当前背压状态。
pub trait SubscriptionQueueProbe: Send + Sync + 'static {
    fn snapshot(&self) -> SubscriptionQueueSnapshot;
}
