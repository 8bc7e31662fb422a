// ==========================================
// 用户导入服务 - 进度事件发布
// ==========================================
// 职责: 将导入/落库进度扇出给所有在线订阅者
// 语义: 尽力投递，不缓存、不重放、不反压
//       单个订阅者投递失败不影响调用方和其他订阅者
// ==========================================

use crate::domain::progress::{ProgressEvent, ProgressStage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, error::TrySendError};

/// 默认订阅通道容量
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

// ==========================================
// 事件发布 Trait
// ==========================================

/// 进度事件发布者 Trait
///
/// 导入流程只依赖此 trait，不依赖具体传输
pub trait ProgressPublisher: Send + Sync {
    /// 发布进度事件
    ///
    /// # 返回
    /// - 实际投递成功的订阅者数量
    fn publish(&self, event: ProgressEvent) -> usize;
}

/// 空操作事件发布者
///
/// 用于不需要进度推送的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpProgressPublisher;

impl ProgressPublisher for NoOpProgressPublisher {
    fn publish(&self, event: ProgressEvent) -> usize {
        tracing::debug!(
            stage = %event.stage,
            progress = event.progress,
            "NoOpProgressPublisher: 跳过事件发布"
        );
        0
    }
}

// ==========================================
// ProgressBroadcaster - 订阅者注册表
// ==========================================

/// 订阅句柄
///
/// 持有接收端；drop 接收端后，下一次发布时自动从注册表移除
pub struct ProgressSubscription {
    pub id: u64,
    pub receiver: mpsc::Receiver<ProgressEvent>,
}

pub struct ProgressBroadcaster {
    subscribers: Mutex<HashMap<u64, mpsc::Sender<ProgressEvent>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ProgressBroadcaster {
    /// 创建广播器
    ///
    /// # 参数
    /// - `capacity`: 每个订阅者的通道容量（满时丢弃新事件）
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    /// 注册新的订阅者
    pub fn subscribe(&self) -> ProgressSubscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock_subscribers().insert(id, tx);
        tracing::debug!(subscriber_id = id, "进度订阅者已连接");
        ProgressSubscription { id, receiver: rx }
    }

    /// 注销订阅者（重复注销无副作用）
    pub fn unsubscribe(&self, id: u64) {
        if self.lock_subscribers().remove(&id).is_some() {
            tracing::debug!(subscriber_id = id, "进度订阅者已断开");
        }
    }

    /// 当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    // 锁中毒时继续使用内部数据，发布路径不能失败
    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, HashMap<u64, mpsc::Sender<ProgressEvent>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ProgressPublisher for ProgressBroadcaster {
    fn publish(&self, event: ProgressEvent) -> usize {
        let mut subscribers = self.lock_subscribers();
        let mut delivered = 0;
        let mut closed = Vec::new();

        for (id, tx) in subscribers.iter() {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(subscriber_id = *id, stage = %event.stage, "订阅者通道已满，丢弃进度事件");
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        for id in closed {
            subscribers.remove(&id);
            tracing::debug!(subscriber_id = id, "移除已关闭的订阅者");
        }

        delivered
    }
}

// ==========================================
// ProgressReporter - 单次操作的进度上报
// ==========================================
// 记录本次操作已达到的最大进度，保证事件 progress 单调不减
pub struct ProgressReporter {
    publisher: Arc<dyn ProgressPublisher>,
    last_progress: u8,
}

impl ProgressReporter {
    pub fn new(publisher: Arc<dyn ProgressPublisher>) -> Self {
        Self {
            publisher,
            last_progress: 0,
        }
    }

    /// 上报阶段进度（低于已达进度时按已达进度发送）
    pub fn report(&mut self, stage: ProgressStage, progress: u8, message: impl Into<String>) {
        self.last_progress = self.last_progress.max(progress.min(100));
        self.publisher
            .publish(ProgressEvent::new(stage, self.last_progress, message));
    }

    /// 上报失败（携带最后达到的进度）
    pub fn fail(&mut self, message: impl Into<String>) {
        let progress = self.last_progress;
        self.report(ProgressStage::Error, progress, message);
    }

    pub fn last_progress(&self) -> u8 {
        self.last_progress
    }
}
