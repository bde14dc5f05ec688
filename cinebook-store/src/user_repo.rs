use async_trait::async_trait;
use uuid::Uuid;
use sqlx::PgPool;
use chrono::{DateTime, Utc};
use tracing::debug;
use cinebook_catalog::coupon::code_key;
use cinebook_catalog::Coupon;
use cinebook_core::repository::{CouponUpdate, StoreError, StoreResult, UserStore};
use cinebook_core::user::{NewUser, Role, User};
use cinebook_shared::Masked;
use crate::database::store_error;

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_coupons(&self, user_id: Uuid) -> StoreResult<Vec<Coupon>> {
        let rows = sqlx::query_as::<_, CouponRow>(
            r#"
            SELECT code, discount_percent, max_discount_amount, min_total_amount, usage_count, max_usage_count
            FROM coupons WHERE user_id = $1 ORDER BY code_key
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().map(Coupon::from).collect())
    }

    async fn with_coupons(&self, row: Option<UserRow>) -> StoreResult<Option<User>> {
        match row {
            Some(row) => {
                let coupons = self.load_coupons(row.id).await?;
                row.into_user(coupons).map(Some)
            }
            None => Ok(None),
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    contact: Option<String>,
    role: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self, coupons: Vec<Coupon>) -> StoreResult<User> {
        let role = Role::parse(&self.role)
            .ok_or_else(|| StoreError::Backend(format!("unknown role {:?} for user {}", self.role, self.id)))?;
        Ok(User {
            id: self.id,
            username: self.username,
            email: Masked::new(self.email),
            first_name: self.first_name,
            last_name: self.last_name,
            contact: self.contact,
            role,
            password_hash: Masked::new(self.password_hash),
            coupons,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CouponRow {
    code: String,
    discount_percent: i32,
    max_discount_amount: i64,
    min_total_amount: i64,
    usage_count: i32,
    max_usage_count: i32,
}

impl From<CouponRow> for Coupon {
    fn from(row: CouponRow) -> Self {
        Coupon {
            code: row.code,
            discount_percent: row.discount_percent,
            max_discount_amount: row.max_discount_amount,
            min_total_amount: row.min_total_amount,
            usage_count: row.usage_count,
            max_usage_count: row.max_usage_count,
        }
    }
}

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, contact, role, password_hash, created_at";

#[async_trait]
impl UserStore for PgUserStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let user = user.into_user();
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, first_name, last_name, contact, role, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(user.email.expose())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.contact)
        .bind(user.role.as_str())
        .bind(user.password_hash.expose())
        .bind(user.created_at)
        .execute(&mut *tx)
        .await
        .map_err(store_error)?;

        for coupon in &user.coupons {
            sqlx::query(
                r#"
                INSERT INTO coupons (user_id, code, code_key, discount_percent, max_discount_amount, min_total_amount, usage_count, max_usage_count)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(user.id)
            .bind(&coupon.code)
            .bind(code_key(&coupon.code))
            .bind(coupon.discount_percent)
            .bind(coupon.max_discount_amount)
            .bind(coupon.min_total_amount)
            .bind(coupon.usage_count)
            .bind(coupon.max_usage_count)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        }

        tx.commit().await.map_err(store_error)?;
        debug!(user_id = %user.id, "user created");
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        self.with_coupons(row).await
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS))
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        self.with_coupons(row).await
    }

    async fn find_coupon(&self, user_id: Uuid, code: &str) -> StoreResult<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>(
            r#"
            SELECT code, discount_percent, max_discount_amount, min_total_amount, usage_count, max_usage_count
            FROM coupons WHERE user_id = $1 AND code_key = $2
            "#,
        )
        .bind(user_id)
        .bind(code_key(code))
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(Coupon::from))
    }

    async fn redeem_coupon(
        &self,
        user_id: Uuid,
        code: &str,
        expected_usage: i32,
    ) -> StoreResult<CouponUpdate> {
        // One statement: the last use deletes the row, any other use increments it.
        // Both branches are conditioned on the usage count read by the caller.
        let outcome = sqlx::query_as::<_, (String, i32)>(
            r#"
            WITH retired AS (
                DELETE FROM coupons
                WHERE user_id = $1 AND code_key = $2
                  AND usage_count = $3 AND usage_count + 1 >= max_usage_count
                RETURNING max_usage_count AS usage_count
            ), applied AS (
                UPDATE coupons SET usage_count = usage_count + 1
                WHERE user_id = $1 AND code_key = $2
                  AND usage_count = $3 AND usage_count + 1 < max_usage_count
                RETURNING usage_count
            )
            SELECT 'retired'::text AS outcome, usage_count FROM retired
            UNION ALL
            SELECT 'applied'::text AS outcome, usage_count FROM applied
            "#,
        )
        .bind(user_id)
        .bind(code_key(code))
        .bind(expected_usage)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(match outcome {
            Some((kind, _)) if kind == "retired" => CouponUpdate::Retired,
            Some((_, usage_count)) => CouponUpdate::Applied { usage_count },
            None => CouponUpdate::Conflict,
        })
    }

    async fn restore_coupon(&self, user_id: Uuid, coupon: &Coupon) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO coupons (user_id, code, code_key, discount_percent, max_discount_amount, min_total_amount, usage_count, max_usage_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7 - 1, $7)
            ON CONFLICT (user_id, code_key)
            DO UPDATE SET usage_count = GREATEST(coupons.usage_count - 1, 0)
            "#,
        )
        .bind(user_id)
        .bind(&coupon.code)
        .bind(code_key(&coupon.code))
        .bind(coupon.discount_percent)
        .bind(coupon.max_discount_amount)
        .bind(coupon.min_total_amount)
        .bind(coupon.max_usage_count)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }
}
