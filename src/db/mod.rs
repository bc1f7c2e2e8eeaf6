//! Database module for SQLite persistence using SeaORM

pub mod entities;

use std::path::Path;
use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

/// Open (or create) the database file and make sure every table exists
pub async fn init_database(db_path: &Path, max_connections: u32) -> Result<DatabaseConnection, DbErr> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
    tracing::info!("Connecting to database: {}", db_url);

    let mut options = ConnectOptions::new(db_url);
    options
        .max_connections(max_connections.max(1))
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    create_tables(&db).await?;

    Ok(db)
}

/// Private in-memory database with the full schema. A single pooled
/// connection keeps every query on the same memory database.
#[cfg(test)]
pub async fn connect_in_memory() -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(Duration::from_secs(3600))
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    create_tables(&db).await?;
    Ok(db)
}

/// Current Unix time in seconds
pub fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

async fn execute(db: &DatabaseConnection, sql: &str) -> Result<(), DbErr> {
    db.execute(Statement::from_string(db.get_database_backend(), sql.to_string()))
        .await
        .map(|_| ())
}

/// Create all tables if they don't exist
async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    // manager_id is self-referencing for admins and sales managers, so it
    // carries no foreign key: the row id is not known until after insert.
    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL,
            manager_id INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .await?;
    execute(db, r#"CREATE INDEX IF NOT EXISTS idx_users_manager ON users(manager_id)"#).await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            token_hash TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )
        "#,
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS client_categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT
        )
        "#,
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS client_companies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            industry TEXT NOT NULL,
            company_size TEXT NOT NULL,
            website TEXT,
            country TEXT NOT NULL,
            city TEXT NOT NULL,
            address TEXT NOT NULL,
            status TEXT NOT NULL,
            category_id INTEGER NOT NULL,
            sales_manager_id INTEGER NOT NULL,
            freelance_consultant_id INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (category_id) REFERENCES client_categories(id),
            FOREIGN KEY (sales_manager_id) REFERENCES users(id),
            FOREIGN KEY (freelance_consultant_id) REFERENCES users(id)
        )
        "#,
    )
    .await?;
    execute(
        db,
        r#"CREATE INDEX IF NOT EXISTS idx_companies_sm ON client_companies(sales_manager_id)"#,
    )
    .await?;
    execute(
        db,
        r#"CREATE INDEX IF NOT EXISTS idx_companies_fc ON client_companies(freelance_consultant_id)"#,
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS contacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT,
            phone TEXT,
            position TEXT,
            notes TEXT,
            client_company_id INTEGER NOT NULL,
            sales_manager_id INTEGER NOT NULL,
            freelance_consultant_id INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (client_company_id) REFERENCES client_companies(id),
            FOREIGN KEY (sales_manager_id) REFERENCES users(id),
            FOREIGN KEY (freelance_consultant_id) REFERENCES users(id)
        )
        "#,
    )
    .await?;
    execute(db, r#"CREATE INDEX IF NOT EXISTS idx_contacts_company ON contacts(client_company_id)"#).await?;
    execute(db, r#"CREATE INDEX IF NOT EXISTS idx_contacts_sm ON contacts(sales_manager_id)"#).await?;
    execute(db, r#"CREATE INDEX IF NOT EXISTS idx_contacts_fc ON contacts(freelance_consultant_id)"#).await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS opportunities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT,
            stage TEXT NOT NULL,
            status TEXT NOT NULL,
            estimated_value REAL NOT NULL,
            currency TEXT NOT NULL,
            probability REAL NOT NULL,
            expected_close_date INTEGER,
            contact_id INTEGER NOT NULL,
            client_company_id INTEGER,
            sales_manager_id INTEGER NOT NULL,
            freelance_consultant_id INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (contact_id) REFERENCES contacts(id),
            FOREIGN KEY (client_company_id) REFERENCES client_companies(id),
            FOREIGN KEY (sales_manager_id) REFERENCES users(id),
            FOREIGN KEY (freelance_consultant_id) REFERENCES users(id)
        )
        "#,
    )
    .await?;
    execute(db, r#"CREATE INDEX IF NOT EXISTS idx_opportunities_contact ON opportunities(contact_id)"#).await?;
    execute(db, r#"CREATE INDEX IF NOT EXISTS idx_opportunities_sm ON opportunities(sales_manager_id)"#).await?;
    execute(
        db,
        r#"CREATE INDEX IF NOT EXISTS idx_opportunities_fc ON opportunities(freelance_consultant_id)"#,
    )
    .await?;

    // Activity log (append-only)
    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS activities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id INTEGER NOT NULL,
            type TEXT NOT NULL,
            description TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id)
        )
        "#,
    )
    .await?;
    execute(db, r#"CREATE INDEX IF NOT EXISTS idx_activities_user ON activities(user_id)"#).await?;
    execute(
        db,
        r#"CREATE INDEX IF NOT EXISTS idx_activities_entity ON activities(entity_type, entity_id)"#,
    )
    .await?;

    tracing::info!("Database tables initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{EntityTrait, PaginatorTrait};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_database_creates_file_and_schema() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("crm.db");

        let db = init_database(&path, 2).await.unwrap();
        assert!(path.exists());

        let users = entities::user::Entity::find().count(&db).await.unwrap();
        assert_eq!(users, 0);

        // Re-running the schema setup is harmless
        drop(db);
        let db = init_database(&path, 2).await.unwrap();
        assert_eq!(entities::opportunity::Entity::find().count(&db).await.unwrap(), 0);
    }
}
