//! PostgreSQL store (feature `postgres`).
//!
//! Schema lives in `migrations/` and is applied by [`PgStore::connect`].

use crate::error::{Error, Result};
use crate::models::{Customer, NewCustomer, NewProduct, NewUser, Product, User};
use crate::repository::{CustomerRepository, ProductRepository, UserRepository};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;

const PRODUCT_COLUMNS: &str = "id, name, reference, price, brand, model, description";
const USER_COLUMNS: &str = r#"id, email, roles, password, customer_id"#;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    roles: Json<Vec<String>>,
    password: String,
    customer_id: Option<i64>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            roles: row.roles.0,
            password_hash: row.password,
            customer_id: row.customer_id,
        }
    }
}

fn to_i64(value: u64, what: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| Error::RepositoryError(format!("{} out of range", what)))
}

/// Store backed by a sqlx connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    /// Connect, then apply pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| Error::RepositoryError(format!("Migration failed: {}", e)))?;

        info!("✓ PostgreSQL store connected, migrations applied");
        Ok(PgStore { pool })
    }

    /// Whether the database holds no customer yet (fixtures not loaded).
    pub async fn is_empty(&self) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customer")
            .fetch_one(&self.pool)
            .await?;
        Ok(count == 0)
    }
}

impl ProductRepository for PgStore {
    async fn find_product(&self, id: i64) -> Result<Option<Product>> {
        let sql = format!("SELECT {} FROM product WHERE id = $1", PRODUCT_COLUMNS);
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_products(&self, offset: u64, limit: u32) -> Result<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM product ORDER BY name, id LIMIT $1 OFFSET $2",
            PRODUCT_COLUMNS
        );
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(i64::from(limit))
            .bind(to_i64(offset, "offset")?)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count_products(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn save_product(&self, product: NewProduct) -> Result<Product> {
        let sql = format!(
            "INSERT INTO product (name, reference, price, brand, model, description) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            PRODUCT_COLUMNS
        );
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(&product.name)
            .bind(&product.reference)
            .bind(product.price)
            .bind(&product.brand)
            .bind(&product.model)
            .bind(&product.description)
            .fetch_one(&self.pool)
            .await?)
    }
}

impl CustomerRepository for PgStore {
    async fn find_customer(&self, id: i64) -> Result<Option<Customer>> {
        Ok(
            sqlx::query_as::<_, Customer>("SELECT id, name FROM customer WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn save_customer(&self, customer: NewCustomer) -> Result<Customer> {
        Ok(sqlx::query_as::<_, Customer>(
            "INSERT INTO customer (name) VALUES ($1) RETURNING id, name",
        )
        .bind(&customer.name)
        .fetch_one(&self.pool)
        .await?)
    }
}

impl UserRepository for PgStore {
    async fn find_user(&self, id: i64) -> Result<Option<User>> {
        let sql = format!(r#"SELECT {} FROM "user" WHERE id = $1"#, USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!(r#"SELECT {} FROM "user" WHERE email = $1"#, USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_users_by_customer(
        &self,
        customer_id: i64,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<User>> {
        let sql = format!(
            r#"SELECT {} FROM "user" WHERE customer_id = $1 ORDER BY email, id LIMIT $2 OFFSET $3"#,
            USER_COLUMNS
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(customer_id)
            .bind(i64::from(limit))
            .bind(to_i64(offset, "offset")?)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn count_users_by_customer(&self, customer_id: i64) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "user" WHERE customer_id = $1"#)
            .bind(customer_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn save_user(&self, user: NewUser) -> Result<User> {
        let sql = format!(
            r#"INSERT INTO "user" (email, roles, password, customer_id) VALUES ($1, $2, $3, $4) RETURNING {}"#,
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.email)
            .bind(Json(&user.roles))
            .bind(&user.password_hash)
            .bind(user.customer_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn remove_user(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM "user" WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
