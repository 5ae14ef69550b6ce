// ==========================================
// 选举计票系统 - 变更订阅
// ==========================================
// 实现: tokio broadcast 通道 + 按选举/结果过滤
// 取消: 显式 cancel 后立即停止投递
// 慢订阅者: 被覆盖的通知跳过并记录日志，不阻塞发布方
// ==========================================

use crate::domain::types::{PoliticalBusinessId, ResultId};
use crate::engine::events::{ChangeNotification, ChangePublisher};
use futures::stream::{self, Stream};
use std::error::Error;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

/// 默认通道容量
pub const DEFAULT_CHANGE_FEED_CAPACITY: usize = 256;

/// 订阅过滤条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFilter {
    PoliticalBusiness(PoliticalBusinessId),
    Result(ResultId),
}

impl ChangeFilter {
    pub fn matches(&self, notification: &ChangeNotification) -> bool {
        match self {
            ChangeFilter::PoliticalBusiness(id) => &notification.political_business_id == id,
            ChangeFilter::Result(id) => notification.result_id.as_ref() == Some(id),
        }
    }
}

// ==========================================
// ChangeFeed - 变更广播
// ==========================================
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeNotification>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self, filter: ChangeFilter) -> Subscription {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        debug!(?filter, "change subscription opened");
        Subscription {
            receiver: Some(self.sender.subscribe()),
            filter,
            cancelled: cancel_rx,
            handle: SubscriptionHandle {
                cancel: Arc::new(cancel_tx),
            },
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CHANGE_FEED_CAPACITY)
    }
}

impl ChangePublisher for ChangeFeed {
    fn publish(&self, notification: ChangeNotification) -> Result<usize, Box<dyn Error + Send + Sync>> {
        // 没有订阅者时 send 返回错误，视为投递 0 个
        Ok(self.sender.send(notification).unwrap_or(0))
    }
}

// ==========================================
// Subscription - 单个订阅
// ==========================================

/// 可跨任务共享的取消句柄
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    cancel: Arc<watch::Sender<bool>>,
}

impl SubscriptionHandle {
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

pub struct Subscription {
    /// 取消后释放，不再计入订阅者
    receiver: Option<broadcast::Receiver<ChangeNotification>>,
    filter: ChangeFilter,
    cancelled: watch::Receiver<bool>,
    handle: SubscriptionHandle,
}

impl Subscription {
    pub fn filter(&self) -> ChangeFilter {
        self.filter
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// 取消并立即释放广播接收端
    pub fn cancel(&mut self) {
        self.handle.cancel();
        self.release();
    }

    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }

    fn release(&mut self) {
        if self.receiver.take().is_some() {
            debug!(filter = ?self.filter, "change subscription cancelled");
        }
    }

    /// 等待下一条匹配的通知
    ///
    /// # 返回
    /// - `None`: 已取消或通道已关闭
    pub async fn recv(&mut self) -> Option<ChangeNotification> {
        loop {
            if *self.cancelled.borrow() {
                self.release();
                return None;
            }
            let receiver = self.receiver.as_mut()?;

            tokio::select! {
                biased;
                changed = self.cancelled.changed() => {
                    if changed.is_err() {
                        self.release();
                        return None;
                    }
                }
                received = receiver.recv() => match received {
                    Ok(notification) if self.filter.matches(&notification) => return Some(notification),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(filter = ?self.filter, skipped, "change subscriber lagged, notifications skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        self.release();
                        return None;
                    }
                },
            }
        }
    }

    /// 转为 Stream；通过 [`SubscriptionHandle`] 取消
    pub fn into_stream(self) -> impl Stream<Item = ChangeNotification> + Send {
        stream::unfold(self, |mut subscription| async move {
            subscription
                .recv()
                .await
                .map(|notification| (notification, subscription))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::ChangeKind;
    use futures::StreamExt;
    use uuid::Uuid;

    fn notification(pb: u128, result: u128) -> ChangeNotification {
        ChangeNotification::new(
            Uuid::from_u128(pb),
            Some(Uuid::from_u128(result)),
            None,
            ChangeKind::CountingCircleResultChanged,
        )
    }

    #[tokio::test]
    async fn test_filtered_delivery() {
        let feed = ChangeFeed::new(16);
        let mut by_business = feed.subscribe(ChangeFilter::PoliticalBusiness(Uuid::from_u128(1)));
        let mut by_result = feed.subscribe(ChangeFilter::Result(Uuid::from_u128(20)));

        assert_eq!(feed.publish(notification(2, 20)).unwrap(), 2);
        assert_eq!(feed.publish(notification(1, 10)).unwrap(), 2);

        let first = by_business.recv().await.unwrap();
        assert_eq!(first.political_business_id, Uuid::from_u128(1));
        let second = by_result.recv().await.unwrap();
        assert_eq!(second.result_id, Some(Uuid::from_u128(20)));
    }

    #[tokio::test]
    async fn test_cancel_stops_delivery() {
        let feed = ChangeFeed::new(16);
        let mut subscription = feed.subscribe(ChangeFilter::PoliticalBusiness(Uuid::from_u128(1)));
        feed.publish(notification(1, 10)).unwrap();

        subscription.cancel();
        assert!(subscription.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_releases_receiver() {
        let feed = ChangeFeed::new(16);
        let mut kept = feed.subscribe(ChangeFilter::PoliticalBusiness(Uuid::from_u128(1)));
        let mut cancelled = feed.subscribe(ChangeFilter::PoliticalBusiness(Uuid::from_u128(1)));
        assert_eq!(feed.subscriber_count(), 2);

        cancelled.cancel();
        assert!(!cancelled.is_active());
        assert_eq!(feed.subscriber_count(), 1);
        assert_eq!(feed.publish(notification(1, 10)).unwrap(), 1);
        assert!(kept.recv().await.is_some());

        // 经句柄取消时，下一次 recv 释放接收端
        let handle = kept.handle();
        handle.cancel();
        assert!(kept.recv().await.is_none());
        assert!(!kept.is_active());
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_ends_on_cancel_from_other_task() {
        let feed = ChangeFeed::new(16);
        let subscription = feed.subscribe(ChangeFilter::PoliticalBusiness(Uuid::from_u128(1)));
        let handle = subscription.handle();
        let mut stream = Box::pin(subscription.into_stream());

        feed.publish(notification(1, 10)).unwrap();
        assert!(stream.next().await.is_some());

        let canceller = tokio::spawn(async move { handle.cancel() });
        canceller.await.unwrap();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_dropped_notifications() {
        let feed = ChangeFeed::new(2);
        let mut subscription = feed.subscribe(ChangeFilter::PoliticalBusiness(Uuid::from_u128(1)));
        for result in 0..5u128 {
            feed.publish(notification(1, result)).unwrap();
        }

        let received = subscription.recv().await.unwrap();
        assert_eq!(received.result_id, Some(Uuid::from_u128(3)));
        let next = subscription.recv().await.unwrap();
        assert_eq!(next.result_id, Some(Uuid::from_u128(4)));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let feed = ChangeFeed::default();
        assert_eq!(feed.publish(notification(1, 1)).unwrap(), 0);
        assert_eq!(feed.subscriber_count(), 0);
    }
}
