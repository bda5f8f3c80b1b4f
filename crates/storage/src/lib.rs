use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{
    Order, OrderId, OrderStatus, Photo, PhotoId, PhotoTemplate, TemplateId, User, UserId,
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct NewPhoto<'a> {
    pub order_id: OrderId,
    pub template_id: TemplateId,
    pub filename: &'a str,
    pub content: &'a [u8],
    pub uploaded_by: UserId,
}

const PHOTO_COLUMNS: &str =
    "id, order_id, template_id, filename, length(content), uploaded_by, approved, created_at";
const TEMPLATE_COLUMNS: &str = "id, order_id, name, sequence, required";

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        // In-memory databases live in a shared cache; one connection avoids table locks.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_user(&self, username: &str, nfc_id: Option<&str>) -> Result<UserId> {
        let rec = sqlx::query(
            "INSERT INTO users (username, nfc_id) VALUES (?, ?)
             ON CONFLICT(username) DO UPDATE SET nfc_id=excluded.nfc_id
             RETURNING id",
        )
        .bind(username)
        .bind(nfc_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(UserId(rec.get::<i64, _>(0)))
    }

    pub async fn user_for_nfc(&self, nfc_id: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, username FROM users WHERE nfc_id = ?")
            .bind(nfc_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| User {
            user_id: UserId(r.get::<i64, _>(0)),
            username: r.get::<String, _>(1),
        }))
    }

    pub async fn create_order(&self, reference: &str) -> Result<OrderId> {
        let rec = sqlx::query("INSERT INTO orders (reference, status) VALUES (?, ?) RETURNING id")
            .bind(reference)
            .bind(OrderStatus::Open.as_str())
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("failed to create order '{reference}'"))?;
        Ok(OrderId(rec.get::<i64, _>(0)))
    }

    pub async fn load_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT id, reference, status FROM orders WHERE id = ?")
            .bind(order_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            let status = r.get::<String, _>(2).parse::<OrderStatus>()?;
            Ok::<_, anyhow::Error>(Order {
                order_id: OrderId(r.get::<i64, _>(0)),
                reference: r.get::<String, _>(1),
                status,
            })
        })
        .transpose()
    }

    pub async fn order_by_reference(&self, reference: &str) -> Result<Option<Order>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM orders WHERE reference = ?")
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?;
        match id {
            Some(id) => self.load_order(OrderId(id)).await,
            None => Ok(None),
        }
    }

    pub async fn set_order_status(&self, order_id: OrderId, status: OrderStatus) -> Result<bool> {
        let updated = sqlx::query("UPDATE orders SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(order_id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to set order {order_id} status to {status}"))?
            .rows_affected();
        Ok(updated > 0)
    }

    pub async fn create_template(
        &self,
        order_id: OrderId,
        name: &str,
        sequence: i64,
        required: bool,
    ) -> Result<TemplateId> {
        let rec = sqlx::query(
            "INSERT INTO photo_templates (order_id, name, sequence, required) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(order_id.0)
        .bind(name)
        .bind(sequence)
        .bind(required)
        .fetch_one(&self.pool)
        .await?;
        Ok(TemplateId(rec.get::<i64, _>(0)))
    }

    pub async fn load_template(&self, template_id: TemplateId) -> Result<Option<PhotoTemplate>> {
        let row = sqlx::query(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM photo_templates WHERE id = ?"
        ))
        .bind(template_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| template_from_row(&r)))
    }

    pub async fn templates_for_order(&self, order_id: OrderId) -> Result<Vec<PhotoTemplate>> {
        let rows = sqlx::query(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM photo_templates WHERE order_id = ? ORDER BY sequence ASC, id ASC"
        ))
        .bind(order_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(template_from_row).collect())
    }

    /// Required templates of the order that have no photo attached yet, in capture order.
    pub async fn missing_templates(&self, order_id: OrderId) -> Result<Vec<PhotoTemplate>> {
        let rows = sqlx::query(&format!(
            "SELECT {TEMPLATE_COLUMNS}
             FROM photo_templates t
             WHERE t.order_id = ? AND t.required = 1
               AND NOT EXISTS (
                 SELECT 1 FROM photos p WHERE p.template_id = t.id AND p.order_id = t.order_id
               )
             ORDER BY t.sequence ASC, t.id ASC"
        ))
        .bind(order_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(template_from_row).collect())
    }

    pub async fn insert_photo(&self, photo: NewPhoto<'_>) -> Result<Photo> {
        let row = sqlx::query(&format!(
            "INSERT INTO photos (order_id, template_id, filename, content, uploaded_by, approved, created_at)
             VALUES (?, ?, ?, ?, ?, 0, ?)
             RETURNING {PHOTO_COLUMNS}"
        ))
        .bind(photo.order_id.0)
        .bind(photo.template_id.0)
        .bind(photo.filename)
        .bind(photo.content)
        .bind(photo.uploaded_by.0)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .with_context(|| {
            format!(
                "failed to store photo '{}' for order {}",
                photo.filename, photo.order_id
            )
        })?;
        Ok(photo_from_row(&row))
    }

    pub async fn load_photo(&self, photo_id: PhotoId) -> Result<Option<Photo>> {
        let row = sqlx::query(&format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?"))
            .bind(photo_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| photo_from_row(&r)))
    }

    pub async fn photos_for_order(&self, order_id: OrderId) -> Result<Vec<Photo>> {
        let rows = sqlx::query(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE order_id = ? ORDER BY id ASC"
        ))
        .bind(order_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(photo_from_row).collect())
    }

    pub async fn delete_photo(&self, photo_id: PhotoId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM photos WHERE id = ?")
            .bind(photo_id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete photo {photo_id}"))?
            .rows_affected();
        Ok(deleted > 0)
    }
}

fn template_from_row(r: &SqliteRow) -> PhotoTemplate {
    PhotoTemplate {
        template_id: TemplateId(r.get::<i64, _>(0)),
        order_id: OrderId(r.get::<i64, _>(1)),
        name: r.get::<String, _>(2),
        sequence: r.get::<i64, _>(3),
        required: r.get::<bool, _>(4),
    }
}

fn photo_from_row(r: &SqliteRow) -> Photo {
    Photo {
        photo_id: PhotoId(r.get::<i64, _>(0)),
        order_id: OrderId(r.get::<i64, _>(1)),
        template_id: TemplateId(r.get::<i64, _>(2)),
        filename: r.get::<String, _>(3),
        size_bytes: u64::try_from(r.get::<i64, _>(4)).unwrap_or_default(),
        uploaded_by: UserId(r.get::<i64, _>(5)),
        approved: r.get::<bool, _>(6),
        created_at: r.get(7),
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
