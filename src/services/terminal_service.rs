// POS终端生命周期服务
// 负责终端登记、状态切换、使用记录、删除以及闲置终端批量停用

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::LifecyclePolicy;
use crate::error::{LifecycleError, LifecycleResult};
use crate::models::{Merchant, MerchantInfo, NewTerminal, Terminal, TerminalStatus};
use crate::services::MerchantLifecycle;
use crate::store::TerminalStore;
use crate::utils::{canonical_mac, validate_mac, InputValidator};

/// 一次闲置清理的结果
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// 检查过的活跃终端数
    pub examined: usize,
    /// 被停用的终端代码
    pub deactivated: Vec<String>,
    /// 写入失败的终端代码
    pub failed: Vec<String>,
}

/// POS终端生命周期服务
///
/// 涉及商户资格的操作都通过 [`MerchantLifecycle`] 同步查询商户快照，
/// 不持有商户记录的引用。
#[derive(Clone)]
pub struct TerminalLifecycle {
    store: Arc<dyn TerminalStore>,
    merchants: Arc<MerchantLifecycle>,
    policy: LifecyclePolicy,
}

impl TerminalLifecycle {
    /// 创建新的终端服务实例
    pub fn new(
        store: Arc<dyn TerminalStore>,
        merchants: Arc<MerchantLifecycle>,
        policy: LifecyclePolicy,
    ) -> Self {
        Self {
            store,
            merchants,
            policy,
        }
    }

    /// 为商户登记新终端
    ///
    /// # Arguments
    /// * `candidate` - 终端登记请求
    ///
    /// # Returns
    /// * 已存储的终端记录，状态为 `ACT`，激活与最后使用时间为当前时间
    pub async fn create(&self, candidate: NewTerminal) -> LifecycleResult<Terminal> {
        log::info!(
            "Creating terminal {} for merchant {}",
            candidate.code,
            candidate.merchant_code
        );

        self.validate_fields(&candidate.code, &candidate.model)?;

        if self.store.get_by_code(&candidate.code).await?.is_some() {
            log::warn!("Rejected terminal {}: code already registered", candidate.code);
            return Err(LifecycleError::conflict(format!(
                "terminal with code {} already exists",
                candidate.code
            )));
        }

        let merchant = self.active_merchant(&candidate.merchant_code).await?;

        let owned = self.store.get_by_merchant(&merchant.code).await?.len();
        if owned >= self.policy.terminal_quota {
            log::warn!(
                "Rejected terminal {}: merchant {} already owns {} terminals",
                candidate.code,
                merchant.code,
                owned
            );
            return Err(LifecycleError::conflict(format!(
                "merchant {} has reached the maximum of {} terminals",
                merchant.code, self.policy.terminal_quota
            )));
        }

        if !validate_mac(&candidate.mac) {
            return Err(LifecycleError::validation(format!(
                "mac: Invalid MAC address format '{}'",
                candidate.mac
            )));
        }
        let mac = canonical_mac(&candidate.mac);

        if !self.store.get_by_mac(&mac).await?.is_empty() {
            log::warn!("Rejected terminal {}: MAC {} already registered", candidate.code, mac);
            return Err(LifecycleError::conflict(format!(
                "a terminal with MAC address {} already exists",
                mac
            )));
        }

        let terminal = NewTerminal {
            merchant_code: merchant.code,
            mac,
            ..candidate
        }
        .into_terminal(Utc::now());

        let stored = self.store.insert(terminal).await.map_err(|e| {
            log::error!("Failed to persist terminal: {}", e);
            LifecycleError::from(e)
        })?;

        log::info!("Created terminal {} for merchant {}", stored.code, stored.merchant_code);
        Ok(stored)
    }

    /// 更新终端资料
    ///
    /// 只更新型号与MAC地址，状态与时间戳沿用已存储的记录，状态切换只能经由
    /// [`set_state`](Self::set_state)。不重新检查MAC唯一性与终端配额，
    /// 重复MAC由存储层唯一约束拒绝。
    pub async fn update(&self, candidate: Terminal) -> LifecycleResult<Terminal> {
        log::info!("Updating terminal: {}", candidate.code);

        self.validate_fields(&candidate.code, &candidate.model)?;
        let mut validator = InputValidator::new();
        validator.validate_mac_field("mac", &candidate.mac);
        validator.into_result()?;

        let existing = self.find_by_code(&candidate.code).await?;

        if existing.merchant_code != candidate.merchant_code {
            log::warn!(
                "Rejected update of {}: cannot move from merchant {} to {}",
                candidate.code,
                existing.merchant_code,
                candidate.merchant_code
            );
            return Err(LifecycleError::conflict(format!(
                "terminal {} belongs to merchant {} and cannot be reassigned",
                candidate.code, existing.merchant_code
            )));
        }

        self.active_merchant(&candidate.merchant_code).await?;

        let terminal = Terminal {
            model: candidate.model,
            mac: canonical_mac(&candidate.mac),
            ..existing
        };

        let stored = self.store.save(terminal).await?;
        log::info!("Updated terminal: {}", stored.code);
        Ok(stored)
    }

    /// 切换终端状态
    ///
    /// # Arguments
    /// * `code` - 终端代码
    /// * `state` - 目标状态代码 (`ACT`/`INA`)
    ///
    /// # Returns
    /// * 更新后的终端；切换为活跃时刷新激活时间，不刷新最后使用时间
    pub async fn set_state(&self, code: &str, state: &str) -> LifecycleResult<Terminal> {
        log::info!("Changing state of terminal {} to {}", code, state);

        let target: TerminalStatus = state.parse()?;
        let mut terminal = self.find_by_code(code).await?;

        if terminal.status == target {
            log::warn!("Rejected state change of {}: already {}", code, target);
            return Err(LifecycleError::conflict(format!(
                "terminal {} is already in state {}",
                code, target
            )));
        }

        terminal.status = target;
        if target == TerminalStatus::Active {
            terminal.activated_at = Some(Utc::now());
        }

        let stored = self.store.save(terminal).await?;
        log::info!("Terminal {} is now {}", code, stored.status);
        Ok(stored)
    }

    /// 记录终端使用
    pub async fn mark_used(&self, code: &str) -> LifecycleResult<Terminal> {
        log::info!("Updating last use of terminal: {}", code);

        let mut terminal = self.find_by_code(code).await?;

        if !terminal.is_active() {
            log::warn!("Rejected use of {}: terminal is inactive", code);
            return Err(LifecycleError::conflict(format!(
                "terminal {} is inactive",
                code
            )));
        }

        terminal.last_used_at = Some(Utc::now());
        Ok(self.store.save(terminal).await?)
    }

    /// 删除终端
    ///
    /// 活跃终端必须先停用。
    pub async fn delete(&self, code: &str) -> LifecycleResult<()> {
        log::info!("Deleting terminal: {}", code);

        let terminal = self.find_by_code(code).await?;

        if terminal.is_active() {
            log::warn!("Rejected deletion of {}: terminal is still active", code);
            return Err(LifecycleError::conflict(format!(
                "terminal {} is active and must be deactivated before deletion",
                code
            )));
        }

        self.store.delete(&terminal).await?;
        log::info!("Deleted terminal: {}", code);
        Ok(())
    }

    /// 停用所有闲置超过阈值的活跃终端
    pub async fn sweep_inactivity(&self) -> LifecycleResult<SweepReport> {
        self.sweep_inactivity_at(Utc::now()).await
    }

    /// 以给定时间为基准执行闲置清理
    ///
    /// 未记录最后使用时间的终端不会被自动停用。停用为条件写入，读取之后
    /// 被再次使用或已改变状态的终端保持不变。单个终端写入失败只记录，
    /// 不影响其他终端。
    pub async fn sweep_inactivity_at(&self, now: DateTime<Utc>) -> LifecycleResult<SweepReport> {
        let active = self.store.get_by_state(TerminalStatus::Active).await?;
        let mut report = SweepReport {
            examined: active.len(),
            ..SweepReport::default()
        };

        for terminal in active {
            if !terminal.is_stale(now, self.policy.staleness_days) {
                continue;
            }

            let code = terminal.code;

            match self.store.deactivate_idle(&code, terminal.last_used_at).await {
                Ok(true) => {
                    log::info!("Deactivated idle terminal: {}", code);
                    report.deactivated.push(code);
                }
                Ok(false) => {
                    log::debug!("Terminal {} changed during sweep, skipped", code);
                }
                Err(e) => {
                    log::error!("Failed to deactivate idle terminal {}: {}", code, e);
                    report.failed.push(code);
                }
            }
        }

        log::info!(
            "Inactivity sweep examined {} terminals, deactivated {}",
            report.examined,
            report.deactivated.len()
        );
        Ok(report)
    }

    /// 暂停商户，并提示其名下仍在使用的终端
    ///
    /// 终端是否随商户一并停用由外部策略决定，这里只记录警告。
    pub async fn suspend_merchant(&self, merchant_code: &str) -> LifecycleResult<Merchant> {
        let merchant = self.merchants.suspend(merchant_code).await?;

        let still_active = self
            .store
            .get_by_merchant(merchant_code)
            .await?
            .iter()
            .filter(|t| t.is_active())
            .count();
        if still_active > 0 {
            log::warn!(
                "Merchant {} was suspended with {} active terminals",
                merchant_code,
                still_active
            );
        }

        Ok(merchant)
    }

    /// 删除商户
    ///
    /// 商户名下仍有任何终端时拒绝删除，不做级联删除。
    pub async fn delete_merchant(&self, merchant_code: &str) -> LifecycleResult<()> {
        log::info!("Deleting merchant: {}", merchant_code);

        let merchant = self.merchants.find_by_code(merchant_code).await?;
        let owned = self.store.get_by_merchant(merchant_code).await?.len();

        if owned > 0 {
            log::warn!(
                "Rejected deletion of merchant {}: {} terminals still assigned",
                merchant_code,
                owned
            );
            return Err(LifecycleError::conflict(format!(
                "merchant {} still owns {} terminals; remove them first",
                merchant_code, owned
            )));
        }

        self.merchants.remove(&merchant).await
    }

    /// 获取终端所属商户的摘要信息
    pub async fn merchant_info(&self, terminal_code: &str) -> LifecycleResult<MerchantInfo> {
        let terminal = self.find_by_code(terminal_code).await?;
        let merchant = self.merchants.find_by_code(&terminal.merchant_code).await?;
        Ok(merchant.to_info())
    }

    /// 根据代码获取终端
    pub async fn find_by_code(&self, code: &str) -> LifecycleResult<Terminal> {
        log::debug!("Looking up terminal: {}", code);
        self.store
            .get_by_code(code)
            .await?
            .ok_or_else(|| LifecycleError::terminal_not_found(code))
    }

    pub async fn find_all(&self) -> LifecycleResult<Vec<Terminal>> {
        Ok(self.store.get_all().await?)
    }

    pub async fn find_by_merchant(&self, merchant_code: &str) -> LifecycleResult<Vec<Terminal>> {
        log::debug!("Searching terminals by merchant: {}", merchant_code);
        Ok(self.store.get_by_merchant(merchant_code).await?)
    }

    pub async fn find_by_model(&self, model: &str) -> LifecycleResult<Vec<Terminal>> {
        log::debug!("Searching terminals by model: {}", model);
        Ok(self.store.get_by_model(model).await?)
    }

    pub async fn find_by_state(&self, status: TerminalStatus) -> LifecycleResult<Vec<Terminal>> {
        log::debug!("Searching terminals by state: {}", status);
        Ok(self.store.get_by_state(status).await?)
    }

    /// 按MAC地址查询，分隔符与大小写不敏感
    pub async fn find_by_mac(&self, mac: &str) -> LifecycleResult<Vec<Terminal>> {
        log::debug!("Searching terminals by MAC: {}", mac);
        Ok(self.store.get_by_mac(&canonical_mac(mac)).await?)
    }

    /// 获取商户快照并确认其处于活跃状态
    async fn active_merchant(&self, merchant_code: &str) -> LifecycleResult<Merchant> {
        let merchant = self.merchants.find_by_code(merchant_code).await?;

        if !merchant.is_active() {
            log::warn!("Rejected terminal operation: merchant {} is inactive", merchant_code);
            return Err(LifecycleError::conflict(format!(
                "merchant {} is inactive",
                merchant_code
            )));
        }

        Ok(merchant)
    }

    fn validate_fields(&self, code: &str, model: &str) -> LifecycleResult<()> {
        let mut validator = InputValidator::new();

        validator.validate_required("code", code);
        validator.validate_max_length("code", code, 15);

        validator.validate_required("model", model);
        validator.validate_max_length("model", model, 10);

        validator.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, StoreError};
    use crate::models::{MerchantStatus, NewMerchant};
    use crate::store::{InMemoryMerchantStore, InMemoryTerminalStore, StoreResult};
    use async_trait::async_trait;
    use chrono::Duration;

    struct Fixture {
        merchants: Arc<MerchantLifecycle>,
        terminals: TerminalLifecycle,
        store: Arc<InMemoryTerminalStore>,
    }

    fn fixture() -> Fixture {
        let merchants = Arc::new(MerchantLifecycle::new(Arc::new(InMemoryMerchantStore::new())));
        let store = Arc::new(InMemoryTerminalStore::new());
        let terminals =
            TerminalLifecycle::new(store.clone(), merchants.clone(), LifecyclePolicy::default());
        Fixture {
            merchants,
            terminals,
            store,
        }
    }

    fn new_merchant(code: &str, tax_id: &str) -> NewMerchant {
        NewMerchant {
            code: code.to_string(),
            internal_code: "INT001".to_string(),
            tax_id: tax_id.to_string(),
            legal_name: "Empresa XYZ S.A.".to_string(),
            commercial_name: "XYZ Store".to_string(),
            commission_code: 1,
            swift: "BOFAUS3NXXX".to_string(),
            iban: None,
        }
    }

    fn new_terminal(code: &str, merchant_code: &str, mac: &str) -> NewTerminal {
        NewTerminal {
            code: code.to_string(),
            model: "VX520".to_string(),
            merchant_code: merchant_code.to_string(),
            mac: mac.to_string(),
        }
    }

    fn mac(n: u8) -> String {
        format!("00:1B:44:11:3A:{:02X}", n)
    }

    async fn with_merchant() -> Fixture {
        let f = fixture();
        f.merchants.create(new_merchant("M1", "1234567890001")).await.unwrap();
        f
    }

    /// 存储一个指定最后使用时间的活跃终端
    async fn seed(f: &Fixture, code: &str, n: u8, last_used_at: Option<DateTime<Utc>>) {
        let mut terminal = f.terminals.create(new_terminal(code, "M1", &mac(n))).await.unwrap();
        terminal.last_used_at = last_used_at;
        f.store.save(terminal).await.unwrap();
    }

    #[tokio::test]
    async fn test_merchant_terminal_scenario() {
        let f = with_merchant().await;

        let t1 = f
            .terminals
            .create(new_terminal("T1", "M1", "00:1B:44:11:3A:B7"))
            .await
            .unwrap();
        assert_eq!(t1.status, TerminalStatus::Active);
        assert!(t1.activated_at.is_some());
        assert!(t1.last_used_at.is_some());

        let dup = f
            .terminals
            .create(new_terminal("T2", "M1", "00:1B:44:11:3A:B7"))
            .await
            .unwrap_err();
        assert_eq!(dup.kind(), ErrorKind::Conflict);

        let suspended = f.terminals.suspend_merchant("M1").await.unwrap();
        assert_eq!(suspended.status, MerchantStatus::Suspended);

        let inactive = f
            .terminals
            .create(new_terminal("T3", "M1", &mac(3)))
            .await
            .unwrap_err();
        assert_eq!(inactive.kind(), ErrorKind::Conflict);
        assert!(inactive.to_string().contains("inactive"));
    }

    #[tokio::test]
    async fn test_create_requires_known_merchant() {
        let f = fixture();
        let err = f
            .terminals
            .create(new_terminal("T1", "NOPE", &mac(1)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_code() {
        let f = with_merchant().await;
        f.terminals.create(new_terminal("T1", "M1", &mac(1))).await.unwrap();

        let err = f
            .terminals
            .create(new_terminal("T1", "M1", &mac(2)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_quota_checked_before_mac() {
        let f = with_merchant().await;
        for n in 0..10 {
            f.terminals
                .create(new_terminal(&format!("T{}", n), "M1", &mac(n)))
                .await
                .unwrap();
        }

        let valid_mac = f
            .terminals
            .create(new_terminal("T10", "M1", &mac(10)))
            .await
            .unwrap_err();
        assert_eq!(valid_mac.kind(), ErrorKind::Conflict);

        let bad_mac = f
            .terminals
            .create(new_terminal("T11", "M1", "not-a-mac"))
            .await
            .unwrap_err();
        assert_eq!(bad_mac.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_invalid_mac_rejected() {
        let f = with_merchant().await;
        let err = f
            .terminals
            .create(new_terminal("T1", "M1", "00:1B:44:11:3A"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_mac_uniqueness_ignores_separator_and_case() {
        let f = with_merchant().await;
        f.terminals
            .create(new_terminal("T1", "M1", "00:1B:44:11:3A:B7"))
            .await
            .unwrap();

        let err = f
            .terminals
            .create(new_terminal("T2", "M1", "00-1b-44-11-3a-b7"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(f.terminals.find_by_mac("00-1b-44-11-3a-b7").await.unwrap().len(), 1);
    }

    /// MAC查询总是返回空、写入均失败的存储，模拟并发登记与连接故障
    struct RacingTerminalStore(InMemoryTerminalStore);

    #[async_trait]
    impl TerminalStore for RacingTerminalStore {
        async fn get_by_code(&self, code: &str) -> StoreResult<Option<Terminal>> {
            self.0.get_by_code(code).await
        }
        async fn get_by_merchant(&self, merchant_code: &str) -> StoreResult<Vec<Terminal>> {
            self.0.get_by_merchant(merchant_code).await
        }
        async fn get_by_mac(&self, _mac: &str) -> StoreResult<Vec<Terminal>> {
            Ok(Vec::new())
        }
        async fn get_by_state(&self, status: TerminalStatus) -> StoreResult<Vec<Terminal>> {
            self.0.get_by_state(status).await
        }
        async fn get_by_model(&self, model: &str) -> StoreResult<Vec<Terminal>> {
            self.0.get_by_model(model).await
        }
        async fn get_all(&self) -> StoreResult<Vec<Terminal>> {
            self.0.get_all().await
        }
        async fn insert(&self, _terminal: Terminal) -> StoreResult<Terminal> {
            Err(StoreError::Backend("terminals_mac_key violated".to_string()))
        }
        async fn save(&self, _terminal: Terminal) -> StoreResult<Terminal> {
            Err(StoreError::Backend("connection reset".to_string()))
        }
        async fn deactivate_idle(
            &self,
            code: &str,
            last_used_at: Option<DateTime<Utc>>,
        ) -> StoreResult<bool> {
            self.0.deactivate_idle(code, last_used_at).await
        }
        async fn delete(&self, terminal: &Terminal) -> StoreResult<()> {
            self.0.delete(terminal).await
        }
    }

    #[tokio::test]
    async fn test_persistence_failure_wrapped_as_conflict() {
        let merchants = Arc::new(MerchantLifecycle::new(Arc::new(InMemoryMerchantStore::new())));
        merchants.create(new_merchant("M1", "1234567890001")).await.unwrap();
        let terminals = TerminalLifecycle::new(
            Arc::new(RacingTerminalStore(InMemoryTerminalStore::new())),
            merchants,
            LifecyclePolicy::default(),
        );

        let err = terminals
            .create(new_terminal("T1", "M1", &mac(1)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("terminals_mac_key"));
    }

    #[tokio::test]
    async fn test_backend_failure_on_state_change_is_conflict() {
        let merchants = Arc::new(MerchantLifecycle::new(Arc::new(InMemoryMerchantStore::new())));
        let store = Arc::new(RacingTerminalStore(InMemoryTerminalStore::new()));
        store
            .0
            .insert(new_terminal("T1", "M1", &mac(1)).into_terminal(Utc::now()))
            .await
            .unwrap();
        let terminals = TerminalLifecycle::new(store, merchants, LifecyclePolicy::default());

        let err = terminals.set_state("T1", "INA").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("connection reset"));

        let err = terminals.mark_used("T1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_set_state_transitions() {
        let f = with_merchant().await;
        let created = f.terminals.create(new_terminal("T1", "M1", &mac(1))).await.unwrap();

        let same = f.terminals.set_state("T1", "ACT").await.unwrap_err();
        assert_eq!(same.kind(), ErrorKind::Conflict);

        let bogus = f.terminals.set_state("T1", "SUS").await.unwrap_err();
        assert_eq!(bogus.kind(), ErrorKind::Validation);

        let missing = f.terminals.set_state("NOPE", "INA").await.unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let inactive = f.terminals.set_state("T1", "INA").await.unwrap();
        assert_eq!(inactive.status, TerminalStatus::Inactive);

        let reactivated = f.terminals.set_state("T1", "ACTIVE").await.unwrap();
        assert_eq!(reactivated.status, TerminalStatus::Active);
        assert!(reactivated.activated_at >= created.activated_at);
        assert_eq!(reactivated.last_used_at, created.last_used_at);
    }

    #[tokio::test]
    async fn test_invalid_state_token_checked_before_lookup() {
        let f = fixture();
        let err = f.terminals.set_state("NOPE", "maybe").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_mark_used_requires_active() {
        let f = with_merchant().await;
        let past = Utc::now() - Duration::days(5);
        seed(&f, "T1", 1, Some(past)).await;

        let used = f.terminals.mark_used("T1").await.unwrap();
        assert!(used.last_used_at.unwrap() > past);

        f.terminals.set_state("T1", "INA").await.unwrap();
        let err = f.terminals.mark_used("T1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let missing = f.terminals.mark_used("NOPE").await.unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_only_after_deactivation() {
        let f = with_merchant().await;
        f.terminals.create(new_terminal("T1", "M1", &mac(1))).await.unwrap();
        f.terminals.mark_used("T1").await.unwrap();

        let err = f.terminals.delete("T1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        f.terminals.set_state("T1", "INA").await.unwrap();
        f.terminals.delete("T1").await.unwrap();

        let gone = f.terminals.find_by_code("T1").await.unwrap_err();
        assert_eq!(gone.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_sweep_inactivity_threshold() {
        let f = with_merchant().await;
        let now = Utc::now();
        seed(&f, "EXACT", 1, Some(now - Duration::days(90))).await;
        seed(&f, "STALE", 2, Some(now - Duration::days(91))).await;
        seed(&f, "NEVER", 3, None).await;
        seed(&f, "FRESH", 4, Some(now - Duration::days(1))).await;

        let report = f.terminals.sweep_inactivity_at(now).await.unwrap();

        assert_eq!(report.examined, 4);
        assert_eq!(report.deactivated, vec!["STALE".to_string()]);
        assert!(report.failed.is_empty());

        let status = |code: &'static str| {
            let terminals = f.terminals.clone();
            async move { terminals.find_by_code(code).await.unwrap().status }
        };
        assert_eq!(status("EXACT").await, TerminalStatus::Active);
        assert_eq!(status("STALE").await, TerminalStatus::Inactive);
        assert_eq!(status("NEVER").await, TerminalStatus::Active);
        assert_eq!(status("FRESH").await, TerminalStatus::Active);
    }

    #[tokio::test]
    async fn test_sweep_is_repeatable() {
        let f = with_merchant().await;
        let now = Utc::now();
        seed(&f, "STALE", 1, Some(now - Duration::days(200))).await;

        assert_eq!(f.terminals.sweep_inactivity_at(now).await.unwrap().deactivated.len(), 1);

        let second = f.terminals.sweep_inactivity_at(now).await.unwrap();
        assert_eq!(second.examined, 0);
        assert!(second.deactivated.is_empty());
    }

    #[tokio::test]
    async fn test_update_revalidates_merchant() {
        let f = with_merchant().await;
        let created = f.terminals.create(new_terminal("T1", "M1", &mac(1))).await.unwrap();

        let mut changed = created.clone();
        changed.model = "A920".to_string();
        changed.mac = "00-1b-44-11-3a-01".to_string();
        let updated = f.terminals.update(changed).await.unwrap();
        assert_eq!(updated.model, "A920");
        assert_eq!(updated.mac, "00:1B:44:11:3A:01");
        assert_eq!(updated.activated_at, created.activated_at);

        f.merchants.suspend("M1").await.unwrap();
        let err = f.terminals.update(created).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_update_keeps_state_and_timestamps() {
        let f = with_merchant().await;
        let created = f.terminals.create(new_terminal("T1", "M1", &mac(1))).await.unwrap();
        f.terminals.set_state("T1", "INA").await.unwrap();

        let mut changed = created.clone();
        changed.model = "A920".to_string();
        changed.status = TerminalStatus::Active;
        changed.activated_at = Some(Utc::now() - Duration::days(3650));
        changed.last_used_at = None;
        let updated = f.terminals.update(changed).await.unwrap();

        assert_eq!(updated.model, "A920");
        assert_eq!(updated.status, TerminalStatus::Inactive);
        assert_eq!(updated.activated_at, created.activated_at);
        assert_eq!(updated.last_used_at, created.last_used_at);
        assert_eq!(
            f.terminals.find_by_code("T1").await.unwrap().status,
            TerminalStatus::Inactive
        );
    }

    #[tokio::test]
    async fn test_update_rejects_mac_of_other_terminal() {
        let f = with_merchant().await;
        let t1 = f.terminals.create(new_terminal("T1", "M1", &mac(1))).await.unwrap();
        let mut t2 = f.terminals.create(new_terminal("T2", "M1", &mac(2))).await.unwrap();

        t2.mac = mac(1);
        let err = f.terminals.update(t2).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        assert_eq!(f.terminals.find_by_code("T1").await.unwrap(), t1);
        assert_eq!(f.terminals.find_by_code("T2").await.unwrap().mac, mac(2));
    }

    /// 返回固定活跃终端快照的存储，模拟清理读取之后终端被再次使用
    struct SnapshotTerminalStore {
        inner: Arc<InMemoryTerminalStore>,
        snapshot: Vec<Terminal>,
    }

    #[async_trait]
    impl TerminalStore for SnapshotTerminalStore {
        async fn get_by_code(&self, code: &str) -> StoreResult<Option<Terminal>> {
            self.inner.get_by_code(code).await
        }
        async fn get_by_merchant(&self, merchant_code: &str) -> StoreResult<Vec<Terminal>> {
            self.inner.get_by_merchant(merchant_code).await
        }
        async fn get_by_mac(&self, mac: &str) -> StoreResult<Vec<Terminal>> {
            self.inner.get_by_mac(mac).await
        }
        async fn get_by_state(&self, _status: TerminalStatus) -> StoreResult<Vec<Terminal>> {
            Ok(self.snapshot.clone())
        }
        async fn get_by_model(&self, model: &str) -> StoreResult<Vec<Terminal>> {
            self.inner.get_by_model(model).await
        }
        async fn get_all(&self) -> StoreResult<Vec<Terminal>> {
            self.inner.get_all().await
        }
        async fn insert(&self, terminal: Terminal) -> StoreResult<Terminal> {
            self.inner.insert(terminal).await
        }
        async fn save(&self, terminal: Terminal) -> StoreResult<Terminal> {
            self.inner.save(terminal).await
        }
        async fn deactivate_idle(
            &self,
            code: &str,
            last_used_at: Option<DateTime<Utc>>,
        ) -> StoreResult<bool> {
            self.inner.deactivate_idle(code, last_used_at).await
        }
        async fn delete(&self, terminal: &Terminal) -> StoreResult<()> {
            self.inner.delete(terminal).await
        }
    }

    #[tokio::test]
    async fn test_sweep_skips_terminal_used_after_read() {
        let f = with_merchant().await;
        seed(&f, "T1", 1, Some(Utc::now() - Duration::days(200))).await;
        let snapshot = f.store.get_by_state(TerminalStatus::Active).await.unwrap();

        let used = f.terminals.mark_used("T1").await.unwrap();

        let terminals = TerminalLifecycle::new(
            Arc::new(SnapshotTerminalStore {
                inner: f.store.clone(),
                snapshot,
            }),
            f.merchants.clone(),
            LifecyclePolicy::default(),
        );
        let report = terminals.sweep_inactivity_at(Utc::now()).await.unwrap();

        assert_eq!(report.examined, 1);
        assert!(report.deactivated.is_empty());
        assert!(report.failed.is_empty());

        let stored = f.terminals.find_by_code("T1").await.unwrap();
        assert_eq!(stored.status, TerminalStatus::Active);
        assert_eq!(stored.last_used_at, used.last_used_at);
    }

    #[tokio::test]
    async fn test_update_cannot_reassign_merchant() {
        let f = with_merchant().await;
        f.merchants.create(new_merchant("M2", "1234567890002")).await.unwrap();
        let mut terminal = f.terminals.create(new_terminal("T1", "M1", &mac(1))).await.unwrap();

        terminal.merchant_code = "M2".to_string();
        let err = f.terminals.update(terminal).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(f.terminals.find_by_code("T1").await.unwrap().merchant_code, "M1");
    }

    #[tokio::test]
    async fn test_delete_merchant_requires_no_terminals() {
        let f = with_merchant().await;
        f.terminals.create(new_terminal("T1", "M1", &mac(1))).await.unwrap();

        let err = f.terminals.delete_merchant("M1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        f.terminals.set_state("T1", "INA").await.unwrap();
        f.terminals.delete("T1").await.unwrap();
        f.terminals.delete_merchant("M1").await.unwrap();

        let gone = f.merchants.find_by_code("M1").await.unwrap_err();
        assert_eq!(gone.kind(), ErrorKind::NotFound);

        let missing = f.terminals.delete_merchant("M1").await.unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_merchant_info() {
        let f = with_merchant().await;
        f.terminals.create(new_terminal("T1", "M1", &mac(1))).await.unwrap();

        let info = f.terminals.merchant_info("T1").await.unwrap();
        assert_eq!(info.merchant_code, "M1");
        assert_eq!(info.status, "ACTIVO");

        f.merchants.suspend("M1").await.unwrap();
        assert_eq!(f.terminals.merchant_info("T1").await.unwrap().status, "INACTIVO");
    }

    #[tokio::test]
    async fn test_queries() {
        let f = with_merchant().await;
        f.merchants.create(new_merchant("M2", "1234567890002")).await.unwrap();
        f.terminals.create(new_terminal("T1", "M1", &mac(1))).await.unwrap();
        f.terminals.create(new_terminal("T2", "M2", &mac(2))).await.unwrap();
        let mut other_model = new_terminal("T3", "M1", &mac(3));
        other_model.model = "A920".to_string();
        f.terminals.create(other_model).await.unwrap();
        f.terminals.set_state("T2", "INA").await.unwrap();

        assert_eq!(f.terminals.find_by_merchant("M1").await.unwrap().len(), 2);
        assert_eq!(f.terminals.find_by_model("A920").await.unwrap().len(), 1);
        assert_eq!(f.terminals.find_by_state(TerminalStatus::Inactive).await.unwrap().len(), 1);
        assert_eq!(f.terminals.find_all().await.unwrap().len(), 3);
    }
}
