// 服务层模块
// 商户与POS终端的生命周期规则

pub mod merchant_service;
pub mod terminal_service;

// 重新导出服务
pub use merchant_service::MerchantLifecycle;
pub use terminal_service::{SweepReport, TerminalLifecycle};

/// 生命周期策略参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// 每个商户最多可登记的终端数
    pub terminal_quota: usize,
    /// 闲置超过该天数的活跃终端将被停用
    pub staleness_days: i64,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            terminal_quota: 10,
            staleness_days: 90,
        }
    }
}
