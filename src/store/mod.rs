// 持久化协作接口
// 生命周期服务只依赖这些trait，不关心数据如何存储

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{Merchant, MerchantStatus, Terminal, TerminalStatus};

pub use memory::{InMemoryMerchantStore, InMemoryTerminalStore};
pub use postgres::{PgMerchantStore, PgTerminalStore};

pub type StoreResult<T> = Result<T, StoreError>;

/// 商户存储
///
/// `insert` 必须在商户代码或税号重复时返回 [`StoreError::Duplicate`]，
/// 它是并发创建时唯一性的最终裁决者。
#[async_trait]
pub trait MerchantStore: Send + Sync {
    async fn get_by_code(&self, code: &str) -> StoreResult<Option<Merchant>>;

    async fn get_by_tax_id(&self, tax_id: &str) -> StoreResult<Vec<Merchant>>;

    async fn get_by_state(&self, status: MerchantStatus) -> StoreResult<Vec<Merchant>>;

    /// 商业名称子串匹配，不区分大小写
    async fn get_by_name(&self, name: &str) -> StoreResult<Vec<Merchant>>;

    async fn get_by_iban(&self, iban: &str) -> StoreResult<Option<Merchant>>;

    async fn get_by_swift(&self, swift: &str) -> StoreResult<Vec<Merchant>>;

    async fn get_all(&self) -> StoreResult<Vec<Merchant>>;

    /// 插入新商户
    async fn insert(&self, merchant: Merchant) -> StoreResult<Merchant>;

    /// 更新已存在的商户
    async fn save(&self, merchant: Merchant) -> StoreResult<Merchant>;

    async fn delete(&self, merchant: &Merchant) -> StoreResult<()>;
}

/// 终端存储
///
/// `insert` 必须在终端代码或MAC地址重复时返回 [`StoreError::Duplicate`]。
#[async_trait]
pub trait TerminalStore: Send + Sync {
    async fn get_by_code(&self, code: &str) -> StoreResult<Option<Terminal>>;

    async fn get_by_merchant(&self, merchant_code: &str) -> StoreResult<Vec<Terminal>>;

    async fn get_by_mac(&self, mac: &str) -> StoreResult<Vec<Terminal>>;

    async fn get_by_state(&self, status: TerminalStatus) -> StoreResult<Vec<Terminal>>;

    async fn get_by_model(&self, model: &str) -> StoreResult<Vec<Terminal>>;

    async fn get_all(&self) -> StoreResult<Vec<Terminal>>;

    async fn insert(&self, terminal: Terminal) -> StoreResult<Terminal>;

    async fn save(&self, terminal: Terminal) -> StoreResult<Terminal>;

    /// 条件停用: 仅当终端仍为 `ACT` 且最后使用时间与读取时一致时写入 `INA`
    ///
    /// 返回是否发生了停用。
    async fn deactivate_idle(
        &self,
        code: &str,
        last_used_at: Option<DateTime<Utc>>,
    ) -> StoreResult<bool>;

    async fn delete(&self, terminal: &Terminal) -> StoreResult<()>;
}
