use sqlx::PgPool;

use crate::error::AdminError;
use crate::types::{ContentKind, WebsiteContent};

/// About-us, privacy policy and terms pages.
pub struct ContentService {
    pool: PgPool,
}

impl ContentService {
    /// Creates a new instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The current text of a page.
    pub async fn get(&self, kind: ContentKind) -> Result<WebsiteContent, AdminError> {
        sqlx::query_as::<_, WebsiteContent>(
            "SELECT kind, text, updated_at FROM website_content WHERE kind = $1",
        )
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AdminError::ContentNotFound)
    }

    /// Creates or replaces a page.
    pub async fn put(&self, kind: ContentKind, text: &str) -> Result<WebsiteContent, AdminError> {
        let content = sqlx::query_as::<_, WebsiteContent>(
            r#"
            INSERT INTO website_content (kind, text) VALUES ($1, $2)
            ON CONFLICT (kind) DO UPDATE SET text = EXCLUDED.text, updated_at = NOW()
            RETURNING kind, text, updated_at
            "#,
        )
        .bind(kind.as_str())
        .bind(text)
        .fetch_one(&self.pool)
        .await?;

        log::info!("📝 Website page {} updated", kind.as_str());
        Ok(content)
    }

    /// Every page written so far.
    pub async fn all(&self) -> Result<Vec<WebsiteContent>, AdminError> {
        let pages = sqlx::query_as::<_, WebsiteContent>(
            "SELECT kind, text, updated_at FROM website_content ORDER BY kind",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(pages)
    }
}
