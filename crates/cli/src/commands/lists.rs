//! Mailing list management commands.
//!
//! # Usage
//!
//! ```bash
//! listkeeper-cli lists create -s newsletter -n "Newsletter" --default
//! ```

use sqlx::PgPool;

/// Errors that can occur while managing lists.
#[derive(Debug, thiserror::Error)]
pub enum ListsError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid slug: {0}")]
    InvalidSlug(String),

    #[error("Mailing list '{0}' already exists")]
    AlreadyExists(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Check a slug: lowercase alphanumerics and dashes, non-empty.
fn validate_slug(slug: &str) -> Result<(), ListsError> {
    let ok = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if ok {
        Ok(())
    } else {
        Err(ListsError::InvalidSlug(slug.to_owned()))
    }
}

/// Create a mailing list.
///
/// # Errors
///
/// Returns `ListsError` when the slug is malformed, already taken, or the
/// insert fails.
pub async fn create(
    slug: &str,
    name: &str,
    description: Option<&str>,
    is_default: bool,
) -> Result<(), ListsError> {
    dotenvy::dotenv().ok();
    validate_slug(slug)?;

    let database_url = std::env::var("LISTKEEPER_DATABASE_URL")
        .map_err(|_| ListsError::MissingEnvVar("LISTKEEPER_DATABASE_URL"))?;

    let pool = PgPool::connect(&database_url).await?;

    let inserted = sqlx::query(
        "INSERT INTO listkeeper.mailing_list (slug, name, description, is_default) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (slug) DO NOTHING",
    )
    .bind(slug)
    .bind(name)
    .bind(description)
    .bind(is_default)
    .execute(&pool)
    .await?
    .rows_affected();

    if inserted == 0 {
        return Err(ListsError::AlreadyExists(slug.to_owned()));
    }

    tracing::info!(slug, name, is_default, "Mailing list created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("newsletter").is_ok());
        assert!(validate_slug("product-updates-2").is_ok());

        assert!(validate_slug("").is_err());
        assert!(validate_slug("Newsletter").is_err());
        assert!(validate_slug("new letter").is_err());
        assert!(validate_slug("news_letter").is_err());
    }
}
