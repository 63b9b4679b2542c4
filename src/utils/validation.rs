// 数据验证工具函数
// 提供税号、银行代码、MAC地址等格式检查功能

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::error::{LifecycleError, LifecycleResult};

static TAX_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{13}$").expect("tax id pattern"));

static SWIFT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{6}[A-Z0-9]{2}([A-Z0-9]{3})?$").expect("swift pattern"));

static IBAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}[0-9]{2}[A-Z0-9]{1,30}$").expect("iban pattern"));

static MAC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})$").expect("mac pattern")
});

/// 验证税号 (RUC) 格式: 13位数字
pub fn validate_tax_id(tax_id: &str) -> bool {
    TAX_ID_RE.is_match(tax_id)
}

/// 验证银行SWIFT代码格式
///
/// 6位字母 + 2位字母数字，可选3位分行代码 (共8或11位)
pub fn validate_swift(swift: &str) -> bool {
    SWIFT_RE.is_match(swift)
}

/// 验证IBAN格式
///
/// 2位国家代码 + 2位校验数字 + 1到30位字母数字。不做校验和计算。
pub fn validate_iban(iban: &str) -> bool {
    IBAN_RE.is_match(iban)
}

/// 验证MAC地址格式
///
/// # Arguments
/// * `mac` - 以冒号或连字符分隔的六组十六进制字节
///
/// # Returns
/// * 地址是否有效
pub fn validate_mac(mac: &str) -> bool {
    MAC_RE.is_match(mac)
}

/// MAC地址规范化: 大写十六进制，冒号分隔
///
/// 同一设备以 `00-1b-..` 或 `00:1B:..` 登记时视为同一地址。
pub fn canonical_mac(mac: &str) -> String {
    mac.trim().replace('-', ":").to_ascii_uppercase()
}

/// 字段级输入验证器
///
/// 收集同一请求中的全部字段错误，最后统一转换为验证错误。
pub struct InputValidator {
    errors: BTreeMap<String, Vec<String>>,
}

impl InputValidator {
    /// 创建新的验证器
    pub fn new() -> Self {
        Self {
            errors: BTreeMap::new(),
        }
    }

    /// 添加字段验证错误
    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    /// 验证必填字段
    pub fn validate_required(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add_error(field, "This field is required");
        }
    }

    /// 验证最大长度
    pub fn validate_max_length(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add_error(field, &format!("Must be at most {} characters", max));
        }
    }

    pub fn validate_tax_id_field(&mut self, field: &str, tax_id: &str) {
        if !validate_tax_id(tax_id) {
            self.add_error(field, "Tax id must be exactly 13 numeric digits");
        }
    }

    pub fn validate_swift_field(&mut self, field: &str, swift: &str) {
        if !validate_swift(swift) {
            self.add_error(field, "Invalid SWIFT code format");
        }
    }

    /// 仅在提供了IBAN时校验
    pub fn validate_optional_iban_field(&mut self, field: &str, iban: Option<&str>) {
        if let Some(iban) = iban {
            if !iban.trim().is_empty() && !validate_iban(iban) {
                self.add_error(field, "Invalid IBAN format");
            }
        }
    }

    pub fn validate_mac_field(&mut self, field: &str, mac: &str) {
        if !validate_mac(mac) {
            self.add_error(field, "Invalid MAC address format");
        }
    }

    /// 检查是否有验证错误
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// 获取验证错误
    pub fn get_errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    /// 转换为错误结果
    pub fn into_result(self) -> LifecycleResult<()> {
        if self.has_errors() {
            let error_msg = self
                .errors
                .iter()
                .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
                .collect::<Vec<_>>()
                .join("; ");

            return Err(LifecycleError::validation(error_msg));
        }

        Ok(())
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new()
    }
}
