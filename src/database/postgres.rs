use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool, Postgres, QueryBuilder};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::models::{
    Item, ItemChanges, ItemFilter, Location, NewItem, Page, SearchQuery, User, UserChanges,
};
use super::store::{Store, StoreError};
use crate::config::DatabaseConfig;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const USER_COLUMNS: &str =
    "id, name, email, password_hash, rating, profileimg, coverimg, bio, link, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, reported_by, item_type, title, description, category, location_name, \
     latitude, longitude, date_occurred, images, contact_method, claimed_by, is_resolved, \
     is_verified, views, is_deleted, created_at, updated_at";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| StoreError::Unavailable("DATABASE_URL is not set".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Connected database pool (max {} connections)", config.max_connections);
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        info!("Database migrations applied");
        Ok(())
    }

    async fn fetch_item(&self, sql: &str, id: Uuid, other: Option<Uuid>) -> Result<Option<Item>, StoreError> {
        let mut query = sqlx::query_as::<_, ItemRow>(sql).bind(id);
        if let Some(other) = other {
            query = query.bind(other);
        }
        query.fetch_optional(&self.pool).await?.map(Item::try_from).transpose()
    }
}

/// Row shape of the `items` table; enum columns are stored as text.
#[derive(Debug, FromRow)]
struct ItemRow {
    id: Uuid,
    reported_by: Uuid,
    item_type: String,
    title: String,
    description: String,
    category: String,
    location_name: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    date_occurred: DateTime<Utc>,
    images: Vec<String>,
    contact_method: String,
    claimed_by: Option<Uuid>,
    is_resolved: bool,
    is_verified: bool,
    views: i64,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for Item {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt = move |e: super::models::UnknownVariant| StoreError::Corrupt(format!("item {}: {}", id, e));
        Ok(Item {
            id: row.id,
            reported_by: row.reported_by,
            item_type: row.item_type.parse().map_err(corrupt)?,
            title: row.title,
            description: row.description,
            category: row.category.parse().map_err(corrupt)?,
            location: Location {
                name: row.location_name,
                latitude: row.latitude,
                longitude: row.longitude,
            },
            date_occurred: row.date_occurred,
            images: row.images,
            contact_method: row.contact_method.parse().map_err(corrupt)?,
            claimed_by: row.claimed_by,
            is_resolved: row.is_resolved,
            is_verified: row.is_verified,
            views: row.views,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn rows_to_items(rows: Vec<ItemRow>) -> Result<Vec<Item>, StoreError> {
    rows.into_iter().map(Item::try_from).collect()
}

/// Escapes LIKE metacharacters so user text is matched literally.
fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// `LIMIT`/`OFFSET` are BIGINT; larger values are clamped.
fn sql_bigint(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn push_item_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ItemFilter) {
    builder.push(" WHERE is_deleted = FALSE");
    if let Some(item_type) = filter.item_type {
        builder.push(" AND item_type = ").push_bind(item_type.as_str());
    }
    if let Some(category) = filter.category {
        builder.push(" AND category = ").push_bind(category.as_str());
    }
    if let Some(resolved) = filter.is_resolved {
        builder.push(" AND is_resolved = ").push_bind(resolved);
    }
    if let Some(verified) = filter.is_verified {
        builder.push(" AND is_verified = ").push_bind(verified);
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.rating)
            .bind(&user.profileimg)
            .bind(&user.coverimg)
            .bind(&user.bio)
            .bind(&user.link)
            .bind(user.created_at)
            .bind(user.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    StoreError::Conflict(format!("email {}", user.email))
                }
                other => StoreError::Sqlx(other),
            })
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
        Ok(sqlx::query_as::<_, User>(&sql).bind(email).fetch_optional(&self.pool).await?)
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)");
        Ok(sqlx::query_as::<_, User>(&sql).bind(ids).fetch_all(&self.pool).await?)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC");
        Ok(sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "UPDATE users SET \
                name = COALESCE($2, name), \
                bio = COALESCE($3, bio), \
                link = COALESCE($4, link), \
                profileimg = COALESCE($5, profileimg), \
                coverimg = COALESCE($6, coverimg), \
                updated_at = now() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(changes.name)
            .bind(changes.bio)
            .bind(changes.link)
            .bind(changes.profileimg)
            .bind(changes.coverimg)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn apply_rating(&self, id: Uuid, given: f64) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "UPDATE users SET rating = (rating + $2) / 2, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(given)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_item(&self, item: NewItem) -> Result<Item, StoreError> {
        let item = item.into_item();
        let sql = format!(
            "INSERT INTO items ({ITEM_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19) \
             RETURNING {ITEM_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(item.id)
            .bind(item.reported_by)
            .bind(item.item_type.as_str())
            .bind(&item.title)
            .bind(&item.description)
            .bind(item.category.as_str())
            .bind(&item.location.name)
            .bind(item.location.latitude)
            .bind(item.location.longitude)
            .bind(item.date_occurred)
            .bind(&item.images)
            .bind(item.contact_method.as_str())
            .bind(item.claimed_by)
            .bind(item.is_resolved)
            .bind(item.is_verified)
            .bind(item.views)
            .bind(item.is_deleted)
            .bind(item.created_at)
            .bind(item.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Item::try_from(row)
    }

    async fn find_item(&self, id: Uuid) -> Result<Option<Item>, StoreError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1");
        self.fetch_item(&sql, id, None).await
    }

    async fn view_item(&self, id: Uuid) -> Result<Option<Item>, StoreError> {
        let sql = format!(
            "UPDATE items SET views = views + 1 WHERE id = $1 AND is_deleted = FALSE RETURNING {ITEM_COLUMNS}"
        );
        self.fetch_item(&sql, id, None).await
    }

    async fn list_items(&self, filter: &ItemFilter, page: Page) -> Result<(Vec<Item>, u64), StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM items");
        push_item_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {ITEM_COLUMNS} FROM items"));
        push_item_filter(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(sql_bigint(page.limit))
            .push(" OFFSET ")
            .push_bind(sql_bigint(page.skip));
        let rows = select.build_query_as::<ItemRow>().fetch_all(&self.pool).await?;

        Ok((rows_to_items(rows)?, total.max(0) as u64))
    }

    async fn search_items(&self, query: &SearchQuery, limit: u64) -> Result<Vec<Item>, StoreError> {
        let pattern = like_pattern(&query.text);
        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {ITEM_COLUMNS} FROM items"));
        push_item_filter(
            &mut select,
            &ItemFilter {
                item_type: query.item_type,
                category: query.category,
                ..Default::default()
            },
        );
        select
            .push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR description ILIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\') ORDER BY created_at DESC LIMIT ")
            .push_bind(sql_bigint(limit));
        let rows = select.build_query_as::<ItemRow>().fetch_all(&self.pool).await?;
        rows_to_items(rows)
    }

    async fn items_by_reporter(&self, reporter: Uuid) -> Result<Vec<Item>, StoreError> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE reported_by = $1 AND is_deleted = FALSE ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, ItemRow>(&sql).bind(reporter).fetch_all(&self.pool).await?;
        rows_to_items(rows)
    }

    async fn update_item(&self, id: Uuid, reporter: Uuid, changes: ItemChanges) -> Result<Option<Item>, StoreError> {
        let (location_name, latitude, longitude, replace_location) = match changes.location {
            Some(location) => (Some(location.name), location.latitude, location.longitude, true),
            None => (None, None, None, false),
        };
        let sql = format!(
            "UPDATE items SET \
                title = COALESCE($3, title), \
                description = COALESCE($4, description), \
                category = COALESCE($5, category), \
                location_name = COALESCE($6, location_name), \
                latitude = CASE WHEN $9 THEN $7 ELSE latitude END, \
                longitude = CASE WHEN $9 THEN $8 ELSE longitude END, \
                contact_method = COALESCE($10, contact_method), \
                images = COALESCE($11, images), \
                updated_at = now() \
             WHERE id = $1 AND reported_by = $2 RETURNING {ITEM_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(id)
            .bind(reporter)
            .bind(changes.title)
            .bind(changes.description)
            .bind(changes.category.map(|c| c.as_str()))
            .bind(location_name)
            .bind(latitude)
            .bind(longitude)
            .bind(replace_location)
            .bind(changes.contact_method.map(|c| c.as_str()))
            .bind(changes.images)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Item::try_from).transpose()
    }

    async fn claim_item(&self, id: Uuid, claimant: Uuid) -> Result<Option<Item>, StoreError> {
        let sql = format!(
            "UPDATE items SET claimed_by = $2, updated_at = now() \
             WHERE id = $1 AND claimed_by IS NULL AND is_resolved = FALSE AND is_deleted = FALSE \
             RETURNING {ITEM_COLUMNS}"
        );
        self.fetch_item(&sql, id, Some(claimant)).await
    }

    async fn unclaim_item(&self, id: Uuid, claimant: Uuid) -> Result<Option<Item>, StoreError> {
        let sql = format!(
            "UPDATE items SET claimed_by = NULL, updated_at = now() \
             WHERE id = $1 AND claimed_by = $2 AND is_resolved = FALSE AND is_deleted = FALSE \
             RETURNING {ITEM_COLUMNS}"
        );
        self.fetch_item(&sql, id, Some(claimant)).await
    }

    async fn resolve_item(&self, id: Uuid, reporter: Uuid) -> Result<Option<Item>, StoreError> {
        let sql = format!(
            "UPDATE items SET is_resolved = TRUE, updated_at = now() \
             WHERE id = $1 AND reported_by = $2 AND claimed_by IS NOT NULL AND is_deleted = FALSE \
             RETURNING {ITEM_COLUMNS}"
        );
        self.fetch_item(&sql, id, Some(reporter)).await
    }

    async fn verify_item(&self, id: Uuid) -> Result<Option<Item>, StoreError> {
        let sql = format!(
            "UPDATE items SET is_verified = TRUE, updated_at = now() \
             WHERE id = $1 AND is_deleted = FALSE RETURNING {ITEM_COLUMNS}"
        );
        self.fetch_item(&sql, id, None).await
    }

    async fn soft_delete_item(&self, id: Uuid, reporter: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE items SET is_deleted = TRUE, updated_at = now() WHERE id = $1 AND reported_by = $2",
        )
        .bind(id)
        .bind(reporter)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("wallet"), "%wallet%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn oversized_offsets_clamp_to_bigint() {
        assert_eq!(sql_bigint(40), 40);
        assert_eq!(sql_bigint(u64::MAX), i64::MAX);
    }

    #[test]
    fn filter_sql_always_excludes_deleted() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM items");
        push_item_filter(
            &mut builder,
            &ItemFilter {
                item_type: Some(crate::database::models::ItemType::Found),
                is_resolved: Some(false),
                ..Default::default()
            },
        );
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM items WHERE is_deleted = FALSE AND item_type = $1 AND is_resolved = $2"
        );
    }
}
