// 闲置终端清理任务
// 按固定间隔触发终端闲置停用

use std::sync::Arc;
use tokio::time::{sleep, Duration};

use crate::error::LifecycleResult;
use crate::services::{SweepReport, TerminalLifecycle};

/// 闲置清理调度器
pub struct SweepScheduler {
    terminals: Arc<TerminalLifecycle>,
    sweep_interval: Duration,
}

impl SweepScheduler {
    /// 创建新的调度器
    pub fn new(terminals: Arc<TerminalLifecycle>, interval_minutes: u64) -> Self {
        Self {
            terminals,
            sweep_interval: Duration::from_secs(interval_minutes.saturating_mul(60)),
        }
    }

    /// 启动周期清理任务，不会返回
    pub async fn start(&self) {
        log::info!(
            "Starting terminal inactivity sweep every {} minutes",
            self.sweep_interval.as_secs() / 60
        );

        loop {
            if let Err(e) = self.run_cycle().await {
                log::error!("Inactivity sweep failed: {}", e);
            }

            sleep(self.sweep_interval).await;
        }
    }

    /// 执行一次清理
    pub async fn run_cycle(&self) -> LifecycleResult<SweepReport> {
        let report = self.terminals.sweep_inactivity().await?;

        if report.deactivated.is_empty() {
            log::debug!("No idle terminals found in this cycle");
        }
        if !report.failed.is_empty() {
            log::warn!(
                "{} terminals could not be deactivated: {}",
                report.failed.len(),
                report.failed.join(", ")
            );
        }

        Ok(report)
    }
}
