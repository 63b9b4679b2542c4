// 内存存储实现
// 与数据库表结构相同的唯一约束，用于测试和本地运行

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{MerchantStore, StoreResult, TerminalStore};
use crate::error::StoreError;
use crate::models::{Merchant, MerchantStatus, Terminal, TerminalStatus};

/// 内存商户存储
#[derive(Debug, Default)]
pub struct InMemoryMerchantStore {
    merchants: RwLock<BTreeMap<String, Merchant>>,
}

impl InMemoryMerchantStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn filter<F>(&self, predicate: F) -> Vec<Merchant>
    where
        F: Fn(&Merchant) -> bool,
    {
        self.merchants
            .read()
            .await
            .values()
            .filter(|m| predicate(m))
            .cloned()
            .collect()
    }
}

fn check_unique_tax_id(
    merchants: &BTreeMap<String, Merchant>,
    merchant: &Merchant,
) -> StoreResult<()> {
    let clash = merchants
        .values()
        .any(|m| m.code != merchant.code && m.tax_id == merchant.tax_id);
    if clash {
        return Err(StoreError::Duplicate(format!(
            "tax id {} already registered",
            merchant.tax_id
        )));
    }
    Ok(())
}

#[async_trait]
impl MerchantStore for InMemoryMerchantStore {
    async fn get_by_code(&self, code: &str) -> StoreResult<Option<Merchant>> {
        Ok(self.merchants.read().await.get(code).cloned())
    }

    async fn get_by_tax_id(&self, tax_id: &str) -> StoreResult<Vec<Merchant>> {
        Ok(self.filter(|m| m.tax_id == tax_id).await)
    }

    async fn get_by_state(&self, status: MerchantStatus) -> StoreResult<Vec<Merchant>> {
        Ok(self.filter(|m| m.status == status).await)
    }

    async fn get_by_name(&self, name: &str) -> StoreResult<Vec<Merchant>> {
        let needle = name.to_lowercase();
        Ok(self
            .filter(|m| m.commercial_name.to_lowercase().contains(&needle))
            .await)
    }

    async fn get_by_iban(&self, iban: &str) -> StoreResult<Option<Merchant>> {
        Ok(self
            .filter(|m| m.iban.as_deref() == Some(iban))
            .await
            .into_iter()
            .next())
    }

    async fn get_by_swift(&self, swift: &str) -> StoreResult<Vec<Merchant>> {
        Ok(self.filter(|m| m.swift == swift).await)
    }

    async fn get_all(&self) -> StoreResult<Vec<Merchant>> {
        Ok(self.filter(|_| true).await)
    }

    async fn insert(&self, merchant: Merchant) -> StoreResult<Merchant> {
        let mut merchants = self.merchants.write().await;
        if merchants.contains_key(&merchant.code) {
            return Err(StoreError::Duplicate(format!(
                "merchant code {} already registered",
                merchant.code
            )));
        }
        check_unique_tax_id(&merchants, &merchant)?;
        merchants.insert(merchant.code.clone(), merchant.clone());
        Ok(merchant)
    }

    async fn save(&self, merchant: Merchant) -> StoreResult<Merchant> {
        let mut merchants = self.merchants.write().await;
        if !merchants.contains_key(&merchant.code) {
            return Err(StoreError::Backend(format!(
                "no merchant row with code {}",
                merchant.code
            )));
        }
        check_unique_tax_id(&merchants, &merchant)?;
        merchants.insert(merchant.code.clone(), merchant.clone());
        Ok(merchant)
    }

    async fn delete(&self, merchant: &Merchant) -> StoreResult<()> {
        self.merchants.write().await.remove(&merchant.code);
        Ok(())
    }
}

/// 内存终端存储
#[derive(Debug, Default)]
pub struct InMemoryTerminalStore {
    terminals: RwLock<BTreeMap<String, Terminal>>,
}

impl InMemoryTerminalStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn filter<F>(&self, predicate: F) -> Vec<Terminal>
    where
        F: Fn(&Terminal) -> bool,
    {
        self.terminals
            .read()
            .await
            .values()
            .filter(|t| predicate(t))
            .cloned()
            .collect()
    }
}

fn check_unique_mac(terminals: &BTreeMap<String, Terminal>, terminal: &Terminal) -> StoreResult<()> {
    let clash = terminals
        .values()
        .any(|t| t.code != terminal.code && t.mac == terminal.mac);
    if clash {
        return Err(StoreError::Duplicate(format!(
            "mac address {} already registered",
            terminal.mac
        )));
    }
    Ok(())
}

#[async_trait]
impl TerminalStore for InMemoryTerminalStore {
    async fn get_by_code(&self, code: &str) -> StoreResult<Option<Terminal>> {
        Ok(self.terminals.read().await.get(code).cloned())
    }

    async fn get_by_merchant(&self, merchant_code: &str) -> StoreResult<Vec<Terminal>> {
        Ok(self.filter(|t| t.merchant_code == merchant_code).await)
    }

    async fn get_by_mac(&self, mac: &str) -> StoreResult<Vec<Terminal>> {
        Ok(self.filter(|t| t.mac == mac).await)
    }

    async fn get_by_state(&self, status: TerminalStatus) -> StoreResult<Vec<Terminal>> {
        Ok(self.filter(|t| t.status == status).await)
    }

    async fn get_by_model(&self, model: &str) -> StoreResult<Vec<Terminal>> {
        Ok(self.filter(|t| t.model == model).await)
    }

    async fn get_all(&self) -> StoreResult<Vec<Terminal>> {
        Ok(self.filter(|_| true).await)
    }

    async fn insert(&self, terminal: Terminal) -> StoreResult<Terminal> {
        let mut terminals = self.terminals.write().await;
        if terminals.contains_key(&terminal.code) {
            return Err(StoreError::Duplicate(format!(
                "terminal code {} already registered",
                terminal.code
            )));
        }
        check_unique_mac(&terminals, &terminal)?;
        terminals.insert(terminal.code.clone(), terminal.clone());
        Ok(terminal)
    }

    async fn save(&self, terminal: Terminal) -> StoreResult<Terminal> {
        let mut terminals = self.terminals.write().await;
        if !terminals.contains_key(&terminal.code) {
            return Err(StoreError::Backend(format!(
                "no terminal row with code {}",
                terminal.code
            )));
        }
        check_unique_mac(&terminals, &terminal)?;
        terminals.insert(terminal.code.clone(), terminal.clone());
        Ok(terminal)
    }

    async fn deactivate_idle(
        &self,
        code: &str,
        last_used_at: Option<DateTime<Utc>>,
    ) -> StoreResult<bool> {
        let mut terminals = self.terminals.write().await;
        match terminals.get_mut(code) {
            Some(t) if t.is_active() && t.last_used_at == last_used_at => {
                t.status = TerminalStatus::Inactive;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, terminal: &Terminal) -> StoreResult<()> {
        self.terminals.write().await.remove(&terminal.code);
        Ok(())
    }
}
