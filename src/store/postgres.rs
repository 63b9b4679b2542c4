// PostgreSQL存储实现
// 基于sqlx连接池，状态以三字母代码存储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::{MerchantStore, StoreResult, TerminalStore};
use crate::error::StoreError;
use crate::models::{Merchant, MerchantStatus, Terminal, TerminalStatus};

/// 商户表行
#[derive(Debug, FromRow)]
struct MerchantRow {
    code: String,
    internal_code: String,
    tax_id: String,
    legal_name: String,
    commercial_name: String,
    commission_code: i32,
    swift: String,
    iban: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    activated_at: Option<DateTime<Utc>>,
    suspended_at: Option<DateTime<Utc>>,
}

impl TryFrom<MerchantRow> for Merchant {
    type Error = StoreError;

    fn try_from(row: MerchantRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<MerchantStatus>()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Merchant {
            code: row.code,
            internal_code: row.internal_code,
            tax_id: row.tax_id,
            legal_name: row.legal_name,
            commercial_name: row.commercial_name,
            commission_code: row.commission_code,
            swift: row.swift,
            iban: row.iban,
            status,
            created_at: row.created_at,
            activated_at: row.activated_at,
            suspended_at: row.suspended_at,
        })
    }
}

/// 终端表行
#[derive(Debug, FromRow)]
struct TerminalRow {
    code: String,
    model: String,
    merchant_code: String,
    mac: String,
    status: String,
    activated_at: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
}

impl TryFrom<TerminalRow> for Terminal {
    type Error = StoreError;

    fn try_from(row: TerminalRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<TerminalStatus>()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Terminal {
            code: row.code,
            model: row.model,
            merchant_code: row.merchant_code,
            mac: row.mac,
            status,
            activated_at: row.activated_at,
            last_used_at: row.last_used_at,
        })
    }
}

fn into_merchants(rows: Vec<MerchantRow>) -> StoreResult<Vec<Merchant>> {
    rows.into_iter().map(Merchant::try_from).collect()
}

fn into_terminals(rows: Vec<TerminalRow>) -> StoreResult<Vec<Terminal>> {
    rows.into_iter().map(Terminal::try_from).collect()
}

/// PostgreSQL商户存储
#[derive(Clone)]
pub struct PgMerchantStore {
    pool: PgPool,
}

impl PgMerchantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MerchantStore for PgMerchantStore {
    async fn get_by_code(&self, code: &str) -> StoreResult<Option<Merchant>> {
        let row = sqlx::query_as::<_, MerchantRow>(
            r#"
            SELECT code, internal_code, tax_id, legal_name, commercial_name, commission_code,
                   swift, iban, status, created_at, activated_at, suspended_at
            FROM merchants
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Merchant::try_from).transpose()
    }

    async fn get_by_tax_id(&self, tax_id: &str) -> StoreResult<Vec<Merchant>> {
        let rows = sqlx::query_as::<_, MerchantRow>(
            r#"
            SELECT code, internal_code, tax_id, legal_name, commercial_name, commission_code,
                   swift, iban, status, created_at, activated_at, suspended_at
            FROM merchants
            WHERE tax_id = $1
            ORDER BY code
            "#,
        )
        .bind(tax_id)
        .fetch_all(&self.pool)
        .await?;

        into_merchants(rows)
    }

    async fn get_by_state(&self, status: MerchantStatus) -> StoreResult<Vec<Merchant>> {
        let rows = sqlx::query_as::<_, MerchantRow>(
            r#"
            SELECT code, internal_code, tax_id, legal_name, commercial_name, commission_code,
                   swift, iban, status, created_at, activated_at, suspended_at
            FROM merchants
            WHERE status = $1
            ORDER BY code
            "#,
        )
        .bind(status.code())
        .fetch_all(&self.pool)
        .await?;

        into_merchants(rows)
    }

    async fn get_by_name(&self, name: &str) -> StoreResult<Vec<Merchant>> {
        // strpos而非ILIKE，避免输入中的 % 和 _ 被当作通配符
        let rows = sqlx::query_as::<_, MerchantRow>(
            r#"
            SELECT code, internal_code, tax_id, legal_name, commercial_name, commission_code,
                   swift, iban, status, created_at, activated_at, suspended_at
            FROM merchants
            WHERE strpos(lower(commercial_name), lower($1)) > 0
            ORDER BY code
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        into_merchants(rows)
    }

    async fn get_by_iban(&self, iban: &str) -> StoreResult<Option<Merchant>> {
        let row = sqlx::query_as::<_, MerchantRow>(
            r#"
            SELECT code, internal_code, tax_id, legal_name, commercial_name, commission_code,
                   swift, iban, status, created_at, activated_at, suspended_at
            FROM merchants
            WHERE iban = $1
            ORDER BY code
            LIMIT 1
            "#,
        )
        .bind(iban)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Merchant::try_from).transpose()
    }

    async fn get_by_swift(&self, swift: &str) -> StoreResult<Vec<Merchant>> {
        let rows = sqlx::query_as::<_, MerchantRow>(
            r#"
            SELECT code, internal_code, tax_id, legal_name, commercial_name, commission_code,
                   swift, iban, status, created_at, activated_at, suspended_at
            FROM merchants
            WHERE swift = $1
            ORDER BY code
            "#,
        )
        .bind(swift)
        .fetch_all(&self.pool)
        .await?;

        into_merchants(rows)
    }

    async fn get_all(&self) -> StoreResult<Vec<Merchant>> {
        let rows = sqlx::query_as::<_, MerchantRow>(
            r#"
            SELECT code, internal_code, tax_id, legal_name, commercial_name, commission_code,
                   swift, iban, status, created_at, activated_at, suspended_at
            FROM merchants
            ORDER BY code
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        into_merchants(rows)
    }

    async fn insert(&self, merchant: Merchant) -> StoreResult<Merchant> {
        let row = sqlx::query_as::<_, MerchantRow>(
            r#"
            INSERT INTO merchants (
                code, internal_code, tax_id, legal_name, commercial_name, commission_code,
                swift, iban, status, created_at, activated_at, suspended_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING code, internal_code, tax_id, legal_name, commercial_name, commission_code,
                      swift, iban, status, created_at, activated_at, suspended_at
            "#,
        )
        .bind(&merchant.code)
        .bind(&merchant.internal_code)
        .bind(&merchant.tax_id)
        .bind(&merchant.legal_name)
        .bind(&merchant.commercial_name)
        .bind(merchant.commission_code)
        .bind(&merchant.swift)
        .bind(&merchant.iban)
        .bind(merchant.status.code())
        .bind(merchant.created_at)
        .bind(merchant.activated_at)
        .bind(merchant.suspended_at)
        .fetch_one(&self.pool)
        .await?;

        Merchant::try_from(row)
    }

    async fn save(&self, merchant: Merchant) -> StoreResult<Merchant> {
        // created_at 不在更新列中，创建时间一经写入即不可变
        let row = sqlx::query_as::<_, MerchantRow>(
            r#"
            UPDATE merchants
            SET internal_code = $2, tax_id = $3, legal_name = $4, commercial_name = $5,
                commission_code = $6, swift = $7, iban = $8, status = $9,
                activated_at = $10, suspended_at = $11
            WHERE code = $1
            RETURNING code, internal_code, tax_id, legal_name, commercial_name, commission_code,
                      swift, iban, status, created_at, activated_at, suspended_at
            "#,
        )
        .bind(&merchant.code)
        .bind(&merchant.internal_code)
        .bind(&merchant.tax_id)
        .bind(&merchant.legal_name)
        .bind(&merchant.commercial_name)
        .bind(merchant.commission_code)
        .bind(&merchant.swift)
        .bind(&merchant.iban)
        .bind(merchant.status.code())
        .bind(merchant.activated_at)
        .bind(merchant.suspended_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            StoreError::Backend(format!("no merchant row with code {}", merchant.code))
        })?;

        Merchant::try_from(row)
    }

    async fn delete(&self, merchant: &Merchant) -> StoreResult<()> {
        sqlx::query("DELETE FROM merchants WHERE code = $1")
            .bind(&merchant.code)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// PostgreSQL终端存储
#[derive(Clone)]
pub struct PgTerminalStore {
    pool: PgPool,
}

impl PgTerminalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_where(&self, clause: &str, value: &str) -> StoreResult<Vec<Terminal>> {
        let sql = format!(
            "SELECT code, model, merchant_code, mac, status, activated_at, last_used_at \
             FROM terminals WHERE {} = $1 ORDER BY code",
            clause
        );
        let rows = sqlx::query_as::<_, TerminalRow>(&sql)
            .bind(value)
            .fetch_all(&self.pool)
            .await?;

        into_terminals(rows)
    }
}

#[async_trait]
impl TerminalStore for PgTerminalStore {
    async fn get_by_code(&self, code: &str) -> StoreResult<Option<Terminal>> {
        let row = sqlx::query_as::<_, TerminalRow>(
            r#"
            SELECT code, model, merchant_code, mac, status, activated_at, last_used_at
            FROM terminals
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Terminal::try_from).transpose()
    }

    async fn get_by_merchant(&self, merchant_code: &str) -> StoreResult<Vec<Terminal>> {
        self.fetch_where("merchant_code", merchant_code).await
    }

    async fn get_by_mac(&self, mac: &str) -> StoreResult<Vec<Terminal>> {
        self.fetch_where("mac", mac).await
    }

    async fn get_by_state(&self, status: TerminalStatus) -> StoreResult<Vec<Terminal>> {
        self.fetch_where("status", status.code()).await
    }

    async fn get_by_model(&self, model: &str) -> StoreResult<Vec<Terminal>> {
        self.fetch_where("model", model).await
    }

    async fn get_all(&self) -> StoreResult<Vec<Terminal>> {
        let rows = sqlx::query_as::<_, TerminalRow>(
            r#"
            SELECT code, model, merchant_code, mac, status, activated_at, last_used_at
            FROM terminals
            ORDER BY code
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        into_terminals(rows)
    }

    async fn insert(&self, terminal: Terminal) -> StoreResult<Terminal> {
        let row = sqlx::query_as::<_, TerminalRow>(
            r#"
            INSERT INTO terminals (code, model, merchant_code, mac, status, activated_at, last_used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING code, model, merchant_code, mac, status, activated_at, last_used_at
            "#,
        )
        .bind(&terminal.code)
        .bind(&terminal.model)
        .bind(&terminal.merchant_code)
        .bind(&terminal.mac)
        .bind(terminal.status.code())
        .bind(terminal.activated_at)
        .bind(terminal.last_used_at)
        .fetch_one(&self.pool)
        .await?;

        Terminal::try_from(row)
    }

    async fn save(&self, terminal: Terminal) -> StoreResult<Terminal> {
        // merchant_code 不在更新列中，终端不可转移到其他商户
        let row = sqlx::query_as::<_, TerminalRow>(
            r#"
            UPDATE terminals
            SET model = $2, mac = $3, status = $4, activated_at = $5, last_used_at = $6
            WHERE code = $1
            RETURNING code, model, merchant_code, mac, status, activated_at, last_used_at
            "#,
        )
        .bind(&terminal.code)
        .bind(&terminal.model)
        .bind(&terminal.mac)
        .bind(terminal.status.code())
        .bind(terminal.activated_at)
        .bind(terminal.last_used_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            StoreError::Backend(format!("no terminal row with code {}", terminal.code))
        })?;

        Terminal::try_from(row)
    }

    async fn deactivate_idle(
        &self,
        code: &str,
        last_used_at: Option<DateTime<Utc>>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE terminals
            SET status = 'INA'
            WHERE code = $1 AND status = 'ACT' AND last_used_at IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(code)
        .bind(last_used_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, terminal: &Terminal) -> StoreResult<()> {
        sqlx::query("DELETE FROM terminals WHERE code = $1")
            .bind(&terminal.code)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
