use rust_decimal::Decimal;
use sqlx::{migrate::Migrate, PgPool};
use uuid::Uuid;
use mentorhub_common::AppError;

use crate::models::UserRow;

pub const SAMPLE_SKILLS: &[&str] = &[
    "Python", "Django", "JavaScript", "React", "Node.js", "Vue.js",
    "HTML", "CSS", "SQL", "PostgreSQL", "MySQL", "MongoDB",
    "Git", "Docker", "AWS", "Linux", "API Development", "REST APIs",
    "GraphQL", "Machine Learning", "Data Science", "Web Scraping",
    "Testing", "CI/CD", "DevOps", "Frontend Development", "Backend Development",
    "Full Stack Development", "Mobile Development", "iOS", "Android",
    "Flutter", "React Native", "C++", "Java", "C#", "PHP", "Ruby",
    "Go", "Rust", "TypeScript", "Angular", "Express.js", "FastAPI",
    "Flask", "Spring Boot", "Laravel", "Rails", "Firebase", "Redis",
];

pub const DEMO_MENTOR_USERNAME: &str = "mentor_dave";

pub struct MigrationRunner {
    pool: PgPool,
}

impl MigrationRunner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_all_migrations(&self) -> Result<(), AppError> {
        tracing::info!("Starting database migrations...");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Migration failed: {}", e)))?;

        tracing::info!("All migrations completed successfully");
        Ok(())
    }

    pub async fn check_migration_status(&self) -> Result<MigrationStatus, AppError> {
        let migrator = sqlx::migrate!("./migrations");
        let mut conn = self.pool.acquire().await?;

        conn.ensure_migrations_table()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read migrations table: {}", e)))?;
        let applied = conn
            .list_applied_migrations()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read migrations table: {}", e)))?;

        let total_migrations = migrator.iter().count();
        let applied_count = applied.len();
        let pending_count = total_migrations.saturating_sub(applied_count);

        Ok(MigrationStatus {
            total: total_migrations,
            applied: applied_count,
            pending: pending_count,
            is_up_to_date: pending_count == 0,
        })
    }

    /// Get-or-create for every sample skill. Returns the names newly inserted.
    pub async fn seed_sample_skills(&self) -> Result<Vec<String>, AppError> {
        let mut created = Vec::new();

        for name in SAMPLE_SKILLS {
            let result = sqlx::query(
                "INSERT INTO skills (skill_id, name) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
            )
            .bind(Uuid::new_v4())
            .bind(name)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                tracing::info!(skill = name, "Created skill");
                created.push(name.to_string());
            } else {
                tracing::debug!(skill = name, "Skill already exists");
            }
        }

        Ok(created)
    }

    /// Creates the approved demo mentor (`mentor_dave`) with Python and
    /// Django skills. Returns false when the user already exists.
    pub async fn create_demo_mentor(&self, password: &str) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
            .bind(DEMO_MENTOR_USERNAME)
            .fetch_one(&self.pool)
            .await?;

        if exists {
            tracing::info!("Demo mentor already exists");
            return Ok(false);
        }

        let hashed_password = mentorhub_auth::PasswordService::hash_password(password)?;
        let user_id = Uuid::new_v4();
        let mentor_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (user_id, username, email, first_name, roles, hashed_password)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user_id)
        .bind(DEMO_MENTOR_USERNAME)
        .bind("dave@example.com")
        .bind("Dave")
        .bind(vec!["mentee", "mentor"])
        .bind(hashed_password)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO mentor_profiles (
                mentor_id, user_id, full_name, headline, bio, years_of_experience,
                hourly_rate, availability, session_duration, available_for, application_status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'approved')
            "#,
        )
        .bind(mentor_id)
        .bind(user_id)
        .bind("Dave The Mentor")
        .bind("Expert Django Backend Dev")
        .bind("I help you build things.")
        .bind(10)
        .bind(Decimal::new(5000, 2))
        .bind(serde_json::json!({ "mon": ["10:00", "15:00"], "wed": ["14:00"] }))
        .bind(60)
        .bind("Code Review, Debugging Help")
        .execute(&mut *tx)
        .await?;

        for skill in ["Python", "Django"] {
            sqlx::query(
                r#"
                WITH ensured AS (
                    INSERT INTO skills (skill_id, name) VALUES ($1, $2)
                    ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                    RETURNING skill_id
                )
                INSERT INTO mentor_skills (mentor_id, skill_id)
                SELECT $3, skill_id FROM ensured
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(skill)
            .bind(mentor_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(%user_id, %mentor_id, "Demo mentor created");
        Ok(true)
    }

    pub async fn users_without_email(&self) -> Result<Vec<UserRow>, AppError> {
        let users = sqlx::query_as::<_, UserRow>(
            "SELECT * FROM users WHERE email = '' ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}

#[derive(Debug)]
pub struct MigrationStatus {
    pub total: usize,
    pub applied: usize,
    pub pending: usize,
    pub is_up_to_date: bool,
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Migrations: {}/{} applied, {} pending",
            self.applied, self.total, self.pending
        )
    }
}
