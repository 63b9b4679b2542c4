// 商户生命周期服务
// 负责商户登记、暂停、资料更新及格式与唯一性校验

use chrono::Utc;
use std::sync::Arc;

use crate::error::{LifecycleError, LifecycleResult};
use crate::models::{normalize_iban, Merchant, MerchantStatus, NewMerchant};
use crate::store::MerchantStore;
use crate::utils::{validate_iban, InputValidator};

/// 商户生命周期服务
///
/// 校验顺序固定: 格式检查 → 唯一性检查 → 状态检查 → 写入。
/// 格式错误的输入不会触发任何存储查询。
#[derive(Clone)]
pub struct MerchantLifecycle {
    store: Arc<dyn MerchantStore>,
}

impl MerchantLifecycle {
    /// 创建新的商户服务实例
    pub fn new(store: Arc<dyn MerchantStore>) -> Self {
        Self { store }
    }

    /// 登记新商户
    ///
    /// # Arguments
    /// * `candidate` - 商户登记请求
    ///
    /// # Returns
    /// * 已存储的商户记录，状态为 `ACT`
    pub async fn create(&self, candidate: NewMerchant) -> LifecycleResult<Merchant> {
        log::info!("Creating merchant: {}", candidate.code);

        // 输入验证
        self.validate_candidate(&candidate, true)?;

        // 检查代码与税号是否已存在
        if self.store.get_by_code(&candidate.code).await?.is_some() {
            log::warn!("Rejected merchant {}: code already registered", candidate.code);
            return Err(LifecycleError::conflict(format!(
                "merchant with code {} already exists",
                candidate.code
            )));
        }
        self.check_tax_id_available(&candidate.tax_id, None).await?;

        let merchant = candidate.into_merchant(Utc::now());

        // 并发创建时以存储层唯一约束为准
        let stored = self.store.insert(merchant).await.map_err(|e| {
            log::error!("Failed to persist merchant: {}", e);
            LifecycleError::from(e)
        })?;

        log::info!("Created new merchant: {} ({})", stored.commercial_name, stored.code);
        Ok(stored)
    }

    /// 暂停商户
    ///
    /// 已暂停的商户再次暂停返回冲突错误，而不是静默成功。
    pub async fn suspend(&self, code: &str) -> LifecycleResult<Merchant> {
        log::info!("Suspending merchant: {}", code);

        let mut merchant = self.find_by_code(code).await?;

        if merchant.is_suspended() {
            log::warn!("Rejected suspension of {}: already suspended", code);
            return Err(LifecycleError::conflict(format!(
                "merchant {} is already suspended",
                code
            )));
        }

        merchant.status = MerchantStatus::Suspended;
        merchant.suspended_at = Some(Utc::now());

        let stored = self.store.save(merchant).await?;
        log::info!("Suspended merchant: {}", code);
        Ok(stored)
    }

    /// 更新商户资料
    ///
    /// 代码、状态以及创建/激活/暂停时间沿用已存储的记录。
    pub async fn update(&self, code: &str, candidate: NewMerchant) -> LifecycleResult<Merchant> {
        log::info!("Updating merchant: {}", code);

        // 更新时沿用已存储的代码，请求中的代码不参与校验
        self.validate_candidate(&candidate, false)?;

        let existing = self.find_by_code(code).await?;
        self.check_tax_id_available(&candidate.tax_id, Some(code)).await?;

        let updated = Merchant {
            code: existing.code,
            internal_code: candidate.internal_code,
            tax_id: candidate.tax_id,
            legal_name: candidate.legal_name,
            commercial_name: candidate.commercial_name,
            commission_code: candidate.commission_code,
            swift: candidate.swift,
            iban: normalize_iban(candidate.iban),
            status: existing.status,
            created_at: existing.created_at,
            activated_at: existing.activated_at,
            suspended_at: existing.suspended_at,
        };

        let stored = self.store.save(updated).await?;
        log::info!("Updated merchant: {}", code);
        Ok(stored)
    }

    /// 根据代码获取商户
    pub async fn find_by_code(&self, code: &str) -> LifecycleResult<Merchant> {
        log::debug!("Looking up merchant: {}", code);
        self.store
            .get_by_code(code)
            .await?
            .ok_or_else(|| LifecycleError::merchant_not_found(code))
    }

    pub async fn find_all(&self) -> LifecycleResult<Vec<Merchant>> {
        Ok(self.store.get_all().await?)
    }

    pub async fn find_by_tax_id(&self, tax_id: &str) -> LifecycleResult<Vec<Merchant>> {
        log::debug!("Searching merchants by tax id: {}", tax_id);
        Ok(self.store.get_by_tax_id(tax_id).await?)
    }

    /// 按商业名称模糊查询，不区分大小写
    pub async fn find_by_name(&self, name: &str) -> LifecycleResult<Vec<Merchant>> {
        log::debug!("Searching merchants by name: {}", name);
        Ok(self.store.get_by_name(name).await?)
    }

    /// 按IBAN精确查询
    ///
    /// 查询前先校验IBAN格式；无匹配时返回未找到错误。
    pub async fn find_by_iban(&self, iban: &str) -> LifecycleResult<Merchant> {
        log::debug!("Searching merchant by IBAN: {}", iban);

        if !validate_iban(iban) {
            return Err(LifecycleError::validation(format!(
                "iban: Invalid IBAN format '{}'",
                iban
            )));
        }

        self.store
            .get_by_iban(iban)
            .await?
            .ok_or_else(|| LifecycleError::not_found(format!("no merchant with IBAN {}", iban)))
    }

    pub async fn find_by_state(&self, status: MerchantStatus) -> LifecycleResult<Vec<Merchant>> {
        log::debug!("Searching merchants by state: {}", status);
        Ok(self.store.get_by_state(status).await?)
    }

    pub async fn find_by_swift(&self, swift: &str) -> LifecycleResult<Vec<Merchant>> {
        log::debug!("Searching merchants by SWIFT: {}", swift);
        Ok(self.store.get_by_swift(swift).await?)
    }

    /// 删除商户记录
    ///
    /// 只能由终端服务在确认商户名下没有终端后调用。
    pub(crate) async fn remove(&self, merchant: &Merchant) -> LifecycleResult<()> {
        self.store.delete(merchant).await?;
        log::info!("Deleted merchant: {}", merchant.code);
        Ok(())
    }

    /// 验证商户登记/更新请求
    fn validate_candidate(&self, candidate: &NewMerchant, check_code: bool) -> LifecycleResult<()> {
        let mut validator = InputValidator::new();

        if check_code {
            validator.validate_required("code", &candidate.code);
            validator.validate_max_length("code", &candidate.code, 15);
        }

        validator.validate_required("internal_code", &candidate.internal_code);
        validator.validate_max_length("internal_code", &candidate.internal_code, 10);

        validator.validate_tax_id_field("tax_id", &candidate.tax_id);

        validator.validate_required("legal_name", &candidate.legal_name);
        validator.validate_max_length("legal_name", &candidate.legal_name, 100);

        validator.validate_required("commercial_name", &candidate.commercial_name);
        validator.validate_max_length("commercial_name", &candidate.commercial_name, 100);

        validator.validate_swift_field("swift", &candidate.swift);
        validator.validate_optional_iban_field("iban", candidate.iban.as_deref());

        validator.into_result().map_err(|e| {
            log::warn!("Rejected merchant {}: {}", candidate.code, e);
            e
        })
    }

    /// 检查税号是否已被其他商户使用
    async fn check_tax_id_available(
        &self,
        tax_id: &str,
        except_code: Option<&str>,
    ) -> LifecycleResult<()> {
        let taken = self
            .store
            .get_by_tax_id(tax_id)
            .await?
            .iter()
            .any(|m| Some(m.code.as_str()) != except_code);

        if taken {
            log::warn!("Rejected tax id {}: already registered", tax_id);
            return Err(LifecycleError::conflict(format!(
                "a merchant with tax id {} already exists",
                tax_id
            )));
        }

        Ok(())
    }
}
