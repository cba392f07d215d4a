//! 过期清理任务
//!
//! 定期把到期房间标记为过期，并清空所有已过期房间的消息（包括先前被读取操作
//! 惰性标记的房间）；过期超过宽限期的房间连同成员集合一起删除。

use std::sync::Arc;
use std::time::Duration;

use application::{ApplicationError, Clock, MessageStore, RoomStore};
use config::SweeperConfig;
use domain::RoomId;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 单次清理的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: Vec<RoomId>,
    pub purged: Vec<RoomId>,
    pub evicted_messages: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.purged.is_empty() && self.evicted_messages == 0
    }
}

pub struct ExpirySweeper {
    room_store: Arc<dyn RoomStore>,
    message_store: Arc<dyn MessageStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    purge_after: chrono::Duration,
}

impl ExpirySweeper {
    pub fn new(
        room_store: Arc<dyn RoomStore>,
        message_store: Arc<dyn MessageStore>,
        clock: Arc<dyn Clock>,
        config: &SweeperConfig,
    ) -> Self {
        Self {
            room_store,
            message_store,
            clock,
            interval: Duration::from_secs(config.interval_seconds.max(1)),
            purge_after: chrono::Duration::seconds(
                i64::try_from(config.purge_after_seconds)
                    .unwrap_or(i64::MAX)
                    .min(i64::MAX / 1000),
            ),
        }
    }

    pub async fn run_once(&self) -> Result<SweepReport, ApplicationError> {
        let now = self.clock.now();
        let mut report = SweepReport {
            expired: self.room_store.expire_due(now).await?,
            ..SweepReport::default()
        };

        for room_id in self.room_store.expired_rooms(now).await? {
            report.evicted_messages += self.message_store.evict_room(room_id).await?;
        }

        if let Some(cutoff) = now.checked_sub_signed(self.purge_after) {
            report.purged = self.room_store.purge_expired_before(cutoff).await?;
        }

        Ok(report)
    }

    /// 在后台按固定间隔运行，直到 `shutdown` 被取消
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            tracing::info!(interval_secs = self.interval.as_secs(), "过期清理任务已启动");

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {}
                }

                match self.run_once().await {
                    Ok(report) if report.is_empty() => tracing::debug!("本轮没有需要清理的房间"),
                    Ok(report) => tracing::info!(
                        expired = report.expired.len(),
                        purged = report.purged.len(),
                        evicted_messages = report.evicted_messages,
                        "过期清理完成"
                    ),
                    Err(err) => tracing::error!(error = %err, "过期清理失败"),
                }
            }

            tracing::info!("过期清理任务已停止");
        })
    }
}
