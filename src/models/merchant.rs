// 商户数据模型
// 定义商户相关的数据结构和状态

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LifecycleError;

/// 商户信息模型
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Merchant {
    /// 商户唯一代码 (外部分配，创建后不可变)
    pub code: String,
    /// 内部代码
    pub internal_code: String,
    /// 税号 (RUC，13位数字)
    pub tax_id: String,
    /// 法定名称
    pub legal_name: String,
    /// 商业名称
    pub commercial_name: String,
    /// 佣金代码
    pub commission_code: i32,
    /// 银行SWIFT代码
    pub swift: String,
    /// 银行账户IBAN (可选)
    pub iban: Option<String>,
    /// 商户状态
    pub status: MerchantStatus,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 激活时间
    pub activated_at: Option<DateTime<Utc>>,
    /// 暂停时间
    pub suspended_at: Option<DateTime<Utc>>,
}

/// 商户状态枚举
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MerchantStatus {
    /// 活跃状态
    #[default]
    #[serde(rename = "ACT")]
    Active,
    /// 非活跃状态
    #[serde(rename = "INA")]
    Inactive,
    /// 暂停状态
    #[serde(rename = "SUS")]
    Suspended,
}

impl MerchantStatus {
    /// 存储使用的三字母代码
    pub fn code(&self) -> &'static str {
        match self {
            MerchantStatus::Active => "ACT",
            MerchantStatus::Inactive => "INA",
            MerchantStatus::Suspended => "SUS",
        }
    }
}

impl fmt::Display for MerchantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for MerchantStatus {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACT" | "ACTIVE" => Ok(MerchantStatus::Active),
            "INA" | "INACTIVE" => Ok(MerchantStatus::Inactive),
            "SUS" | "SUSPENDED" => Ok(MerchantStatus::Suspended),
            other => Err(LifecycleError::validation(format!(
                "merchant state must be ACT, INA or SUS, got '{}'",
                other
            ))),
        }
    }
}

/// 商户注册请求
#[derive(Debug, Deserialize, Clone)]
pub struct NewMerchant {
    pub code: String,
    pub internal_code: String,
    pub tax_id: String,
    pub legal_name: String,
    pub commercial_name: String,
    pub commission_code: i32,
    pub swift: String,
    /// IBAN (可选，提供时校验格式)
    pub iban: Option<String>,
}

impl NewMerchant {
    /// 生成新商户记录，状态为活跃，创建与激活时间均为 `now`
    pub fn into_merchant(self, now: DateTime<Utc>) -> Merchant {
        Merchant {
            code: self.code,
            internal_code: self.internal_code,
            tax_id: self.tax_id,
            legal_name: self.legal_name,
            commercial_name: self.commercial_name,
            commission_code: self.commission_code,
            swift: self.swift,
            iban: normalize_iban(self.iban),
            status: MerchantStatus::Active,
            created_at: now,
            activated_at: Some(now),
            suspended_at: None,
        }
    }
}

/// 空字符串的IBAN视为未提供
pub(crate) fn normalize_iban(iban: Option<String>) -> Option<String> {
    iban.filter(|value| !value.trim().is_empty())
}

impl Merchant {
    /// 检查商户是否处于活跃状态
    pub fn is_active(&self) -> bool {
        self.status == MerchantStatus::Active
    }

    pub fn is_suspended(&self) -> bool {
        self.status == MerchantStatus::Suspended
    }

    /// 获取商户摘要信息
    pub fn to_info(&self) -> MerchantInfo {
        MerchantInfo {
            merchant_code: self.code.clone(),
            merchant_name: self.commercial_name.clone(),
            swift: self.swift.clone(),
            iban: self.iban.clone(),
            status: if self.is_active() {
                "ACTIVO".to_string()
            } else {
                "INACTIVO".to_string()
            },
        }
    }
}

/// 终端所属商户的摘要信息
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MerchantInfo {
    pub merchant_code: String,
    pub merchant_name: String,
    pub swift: String,
    pub iban: Option<String>,
    /// 展示状态: ACTIVO / INACTIVO
    pub status: String,
}
