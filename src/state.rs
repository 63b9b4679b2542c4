// 应用状态管理
// 包含数据库连接池、配置信息以及生命周期服务

use sqlx::PgPool;
use std::sync::Arc;

use crate::config::Config;
use crate::services::{MerchantLifecycle, TerminalLifecycle};
use crate::store::{PgMerchantStore, PgTerminalStore};

/// 应用全局状态
pub struct AppState {
    /// 数据库连接池
    pub db_pool: PgPool,
    /// 应用配置
    pub config: Config,
    /// 商户生命周期服务
    pub merchants: Arc<MerchantLifecycle>,
    /// 终端生命周期服务
    pub terminals: Arc<TerminalLifecycle>,
}

impl AppState {
    /// 创建新的应用状态实例
    ///
    /// # Arguments
    /// * `db_pool` - 数据库连接池
    /// * `config` - 应用配置
    ///
    /// # Returns
    /// * 基于PostgreSQL存储的应用状态实例
    pub fn new(db_pool: PgPool, config: Config) -> Self {
        let merchants = Arc::new(MerchantLifecycle::new(Arc::new(PgMerchantStore::new(
            db_pool.clone(),
        ))));
        let terminals = Arc::new(TerminalLifecycle::new(
            Arc::new(PgTerminalStore::new(db_pool.clone())),
            merchants.clone(),
            config.lifecycle.policy(),
        ));

        Self {
            db_pool,
            config,
            merchants,
            terminals,
        }
    }
}
