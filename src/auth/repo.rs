use sqlx::PgPool;
use tracing::warn;

use crate::auth::repo_types::{LoginAttempt, NewUser, ProfileUpdate, RegistrationRow, User};

const USER_COLUMNS: &str = "id, first_name, last_name, email, username, password_hash, \
     phone, address, city, state, zipcode, country, date_of_birth, gender, newsletter, \
     registered_at, last_login_at, created_at, updated_at";

impl User {
    /// Insert a new user row. A unique-constraint violation on the email
    /// or username index surfaces as `sqlx::Error::Database`; the caller
    /// classifies it. The initial password-history row is appended
    /// best-effort after the insert.
    pub async fn create(db: &PgPool, new: &NewUser) -> sqlx::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (
                first_name, last_name, email, username, password_hash,
                phone, address, city, state, zipcode, country,
                date_of_birth, gender, newsletter
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.email)
        .bind(&new.username)
        .bind(&new.password_hash)
        .bind(&new.phone)
        .bind(&new.address)
        .bind(&new.city)
        .bind(&new.state)
        .bind(&new.zipcode)
        .bind(&new.country)
        .bind(&new.date_of_birth)
        .bind(&new.gender)
        .bind(new.newsletter)
        .fetch_one(db)
        .await?;

        append_password_history(db, user.id, &new.password_hash).await;

        Ok(user)
    }

    /// Find a user by username or email, exact match as stored.
    pub async fn find_by_identity(db: &PgPool, identity: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE username = $1 OR email = $1
            LIMIT 1
            "#
        ))
        .bind(identity)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Set last-login and updated timestamps to now.
    pub async fn touch_last_login(db: &PgPool, id: i64) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET last_login_at = now(), updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Overwrite the stored digest and append to the password history.
    pub async fn set_password(db: &PgPool, id: i64, digest: &str) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, updated_at = now()
            WHERE id = $2
            "#,
        )
        .bind(digest)
        .bind(id)
        .execute(db)
        .await?;

        append_password_history(db, id, digest).await;

        Ok(())
    }

    /// Overwrite mutable profile fields; identity (username) and password
    /// are untouched. Returns the updated row, or None for an unknown id.
    pub async fn update_profile(
        db: &PgPool,
        id: i64,
        update: &ProfileUpdate,
    ) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET first_name = $1, last_name = $2, email = $3, phone = $4,
                address = $5, city = $6, state = $7, zipcode = $8, country = $9,
                updated_at = now()
            WHERE id = $10
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.email)
        .bind(&update.phone)
        .bind(&update.address)
        .bind(&update.city)
        .bind(&update.state)
        .bind(&update.zipcode)
        .bind(&update.country)
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// All users, newest registration first, digests excluded.
    pub async fn list_all(db: &PgPool) -> sqlx::Result<Vec<RegistrationRow>> {
        sqlx::query_as::<_, RegistrationRow>(
            r#"
            SELECT id, first_name, last_name, email, username,
                   phone, address, city, state, zipcode, country,
                   date_of_birth, gender, newsletter,
                   registered_at, last_login_at, created_at, updated_at
            FROM users
            ORDER BY registered_at DESC
            "#,
        )
        .fetch_all(db)
        .await
    }
}

impl LoginAttempt {
    /// Best-effort audit append: a failure here must never fail the
    /// login request itself.
    pub async fn record(
        db: &PgPool,
        user_id: Option<i64>,
        ip_address: &str,
        user_agent: Option<&str>,
        success: bool,
    ) {
        let result = sqlx::query(
            r#"
            INSERT INTO login_history (user_id, ip_address, user_agent, success)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user_id)
        .bind(ip_address)
        .bind(user_agent)
        .bind(success)
        .execute(db)
        .await;

        if let Err(e) = result {
            warn!(error = %e, ?user_id, "failed to record login attempt");
        }
    }

    pub async fn list_for_user(
        db: &PgPool,
        user_id: i64,
        limit: i64,
    ) -> sqlx::Result<Vec<LoginAttempt>> {
        sqlx::query_as::<_, LoginAttempt>(
            r#"
            SELECT id, user_id, attempted_at, ip_address, user_agent, success
            FROM login_history
            WHERE user_id = $1
            ORDER BY attempted_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(db)
        .await
    }
}

/// Append-only history insert; errors are logged, not propagated, so a
/// history failure cannot undo the credential write it follows.
async fn append_password_history(db: &PgPool, user_id: i64, digest: &str) {
    let result = sqlx::query(
        r#"
        INSERT INTO password_history (user_id, password_hash)
        VALUES ($1, $2)
        "#,
    )
    .bind(user_id)
    .bind(digest)
    .execute(db)
    .await;

    if let Err(e) = result {
        warn!(error = %e, user_id, "failed to append password history");
    }
}
