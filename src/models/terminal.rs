// POS终端数据模型
// 定义终端记录、终端状态及闲置判断

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LifecycleError;

/// POS终端模型
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Terminal {
    /// 终端唯一代码 (外部分配，不可变)
    pub code: String,
    /// 终端型号
    pub model: String,
    /// 所属商户代码 (创建后不可重新分配)
    pub merchant_code: String,
    /// MAC地址
    pub mac: String,
    /// 终端状态
    pub status: TerminalStatus,
    /// 激活时间
    pub activated_at: Option<DateTime<Utc>>,
    /// 最后使用时间
    pub last_used_at: Option<DateTime<Utc>>,
}

/// 终端状态枚举
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TerminalStatus {
    #[default]
    #[serde(rename = "ACT")]
    Active,
    #[serde(rename = "INA")]
    Inactive,
}

impl TerminalStatus {
    /// 存储使用的三字母代码
    pub fn code(&self) -> &'static str {
        match self {
            TerminalStatus::Active => "ACT",
            TerminalStatus::Inactive => "INA",
        }
    }
}

impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for TerminalStatus {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACT" | "ACTIVE" => Ok(TerminalStatus::Active),
            "INA" | "INACTIVE" => Ok(TerminalStatus::Inactive),
            other => Err(LifecycleError::validation(format!(
                "terminal state must be ACT or INA, got '{}'",
                other
            ))),
        }
    }
}

/// 终端登记请求
#[derive(Debug, Deserialize, Clone)]
pub struct NewTerminal {
    pub code: String,
    pub model: String,
    pub merchant_code: String,
    pub mac: String,
}

impl NewTerminal {
    /// 生成新终端记录，激活与最后使用时间均为 `now`
    pub fn into_terminal(self, now: DateTime<Utc>) -> Terminal {
        Terminal {
            code: self.code,
            model: self.model,
            merchant_code: self.merchant_code,
            mac: self.mac,
            status: TerminalStatus::Active,
            activated_at: Some(now),
            last_used_at: Some(now),
        }
    }
}

impl Terminal {
    pub fn is_active(&self) -> bool {
        self.status == TerminalStatus::Active
    }

    /// 距最后使用的整天数，未记录使用时间时返回 `None`
    pub fn days_since_last_use(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_used_at.map(|last_used| (now - last_used).num_days())
    }

    /// 活跃终端的闲置天数严格超过阈值时视为过期
    pub fn is_stale(&self, now: DateTime<Utc>, staleness_days: i64) -> bool {
        self.is_active()
            && self
                .days_since_last_use(now)
                .map_or(false, |days| days > staleness_days)
    }
}
