use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use mentorhub_common::{Page, PageRequest};
use mentorhub_database::{
    is_any_unique_violation, is_unique_violation, MentorProfileRow, SessionRow, SkillRow,
    SESSION_SLOT_CONSTRAINT,
};

use crate::models::{
    AdminSessionSummary, DashboardCounts, MentorFilter, MentorProfile, MentorSearchScope,
    NewMentorProfile, NewSession, Session, SessionFilter, SessionTransition, Skill, UserContact,
};

use super::{MentorRepository, SessionRepository, StoreError};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn skills_for(&self, mentor_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Skill>>, StoreError> {
        let rows = sqlx::query_as::<_, MentorSkillRow>(
            r#"
            SELECT ms.mentor_id, k.skill_id, k.name, k.description, k.created_at
            FROM mentor_skills ms
            JOIN skills k ON k.skill_id = ms.skill_id
            WHERE ms.mentor_id = ANY($1)
            ORDER BY k.name
            "#,
        )
        .bind(mentor_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_mentor: HashMap<Uuid, Vec<Skill>> = HashMap::new();
        for row in rows {
            by_mentor.entry(row.mentor_id).or_default().push(row.skill.into());
        }
        Ok(by_mentor)
    }

    async fn hydrate(&self, rows: Vec<MentorProfileRow>) -> Result<Vec<MentorProfile>, StoreError> {
        let ids: Vec<Uuid> = rows.iter().map(|row| row.mentor_id).collect();
        let mut skills = self.skills_for(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let mentor_skills = skills.remove(&row.mentor_id).unwrap_or_default();
                MentorProfile::from_row(row, mentor_skills)
            })
            .collect()
    }

    async fn hydrate_one(&self, row: Option<MentorProfileRow>) -> Result<Option<MentorProfile>, StoreError> {
        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[derive(FromRow)]
struct MentorSkillRow {
    mentor_id: Uuid,
    #[sqlx(flatten)]
    skill: SkillRow,
}

#[derive(FromRow)]
struct AdminSessionRow {
    #[sqlx(flatten)]
    session: SessionRow,
    mentor_name: String,
    mentee_username: String,
    mentee_email: String,
    mentee_first_name: String,
}

#[derive(FromRow)]
struct ContactRow {
    user_id: Uuid,
    username: String,
    email: String,
    first_name: String,
}

impl From<ContactRow> for UserContact {
    fn from(row: ContactRow) -> Self {
        Self {
            user_id: row.user_id,
            username: row.username,
            email: row.email,
            first_name: row.first_name,
        }
    }
}

fn like_pattern(text: &str) -> String {
    format!("%{}%", text)
}

fn push_session_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &SessionFilter) {
    builder.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        builder.push(" AND s.status = ").push_bind(status.as_str());
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        builder
            .push(" AND (m.full_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.username ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.first_name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn push_mentor_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &MentorFilter) {
    builder.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        builder.push(" AND m.application_status = ").push_bind(status.as_str());
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        builder
            .push(" AND (m.full_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR m.headline ILIKE ")
            .push_bind(pattern.clone());
        match filter.scope {
            MentorSearchScope::Directory => {
                builder
                    .push(" OR m.bio ILIKE ")
                    .push_bind(pattern.clone())
                    .push(
                        " OR EXISTS (SELECT 1 FROM mentor_skills ms JOIN skills k ON k.skill_id = ms.skill_id \
                         WHERE ms.mentor_id = m.mentor_id AND k.name ILIKE ",
                    )
                    .push_bind(pattern)
                    .push(")");
            }
            MentorSearchScope::Admin => {
                builder.push(" OR u.username ILIKE ").push_bind(pattern);
            }
        }
        builder.push(")");
    }
    if let Some(skill) = &filter.skill {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM mentor_skills ms JOIN skills k ON k.skill_id = ms.skill_id \
                 WHERE ms.mentor_id = m.mentor_id AND k.name ILIKE ",
            )
            .push_bind(like_pattern(skill))
            .push(")");
    }
}

#[async_trait]
impl SessionRepository for PgStore {
    async fn insert_session(&self, new: NewSession) -> Result<Session, StoreError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO sessions (
                session_id, mentor_id, mentee_id, session_date, session_time,
                duration_minutes, status, payment_status, amount_paid, meeting_notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', 'pending', $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.mentor_id)
        .bind(new.mentee_id)
        .bind(new.session_date)
        .bind(new.session_time)
        .bind(new.duration_minutes)
        .bind(new.amount_paid)
        .bind(new.meeting_notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, SESSION_SLOT_CONSTRAINT) {
                StoreError::SlotTaken
            } else {
                StoreError::Database(e)
            }
        })?;

        Session::try_from(row)
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>, StoreError> {
        sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Session::try_from)
            .transpose()
    }

    async fn transition_session(&self, change: &SessionTransition) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE sessions
            SET status = $3,
                meeting_link = COALESCE($4, meeting_link),
                meeting_notes = COALESCE($5, meeting_notes),
                admin_provided_link = COALESCE($6, admin_provided_link),
                link_provided_at = CASE WHEN $6 IS NULL THEN link_provided_at ELSE $7 END,
                updated_at = $8
            WHERE session_id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(change.session_id)
        .bind(change.from.as_str())
        .bind(change.to.as_str())
        .bind(&change.meeting_link)
        .bind(&change.meeting_notes)
        .bind(&change.admin_provided_link)
        .bind(change.link_provided_at)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Session::try_from).transpose()
    }

    async fn complete_payment(&self, session_id: Uuid) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE sessions
            SET payment_status = 'completed', updated_at = NOW()
            WHERE session_id = $1 AND payment_status = 'pending'
            RETURNING *
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Session::try_from).transpose()
    }

    async fn slot_taken(&self, mentor_id: Uuid, date: NaiveDate, time: NaiveTime) -> Result<bool, StoreError> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sessions
                WHERE mentor_id = $1 AND session_date = $2 AND session_time = $3
                  AND status IN ('pending', 'confirmed')
            )
            "#,
        )
        .bind(mentor_id)
        .bind(date)
        .bind(time)
        .fetch_one(&self.pool)
        .await?;

        Ok(taken)
    }

    async fn booked_times(&self, mentor_id: Uuid, date: NaiveDate) -> Result<Vec<NaiveTime>, StoreError> {
        let times = sqlx::query_scalar::<_, NaiveTime>(
            r#"
            SELECT session_time FROM sessions
            WHERE mentor_id = $1 AND session_date = $2 AND status IN ('pending', 'confirmed')
            ORDER BY session_time
            "#,
        )
        .bind(mentor_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(times)
    }

    async fn sessions_for_mentee(&self, mentee_id: Uuid) -> Result<Vec<Session>, StoreError> {
        sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM sessions WHERE mentee_id = $1 ORDER BY session_date, session_time",
        )
        .bind(mentee_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Session::try_from)
        .collect()
    }

    async fn sessions_for_mentor(&self, mentor_id: Uuid) -> Result<Vec<Session>, StoreError> {
        sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM sessions WHERE mentor_id = $1 ORDER BY session_date, session_time",
        )
        .bind(mentor_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Session::try_from)
        .collect()
    }

    async fn search_sessions(
        &self,
        filter: &SessionFilter,
        page: PageRequest,
    ) -> Result<Page<AdminSessionSummary>, StoreError> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM sessions s \
             JOIN mentor_profiles m ON m.mentor_id = s.mentor_id \
             JOIN users u ON u.user_id = s.mentee_id",
        );
        push_session_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let resolved = page.resolve(total.max(0) as u64);

        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT s.*, m.full_name AS mentor_name, u.username AS mentee_username, \
             u.email AS mentee_email, u.first_name AS mentee_first_name \
             FROM sessions s \
             JOIN mentor_profiles m ON m.mentor_id = s.mentor_id \
             JOIN users u ON u.user_id = s.mentee_id",
        );
        push_session_filters(&mut query, filter);
        query
            .push(" ORDER BY s.session_date DESC, s.session_time DESC LIMIT ")
            .push_bind(resolved.limit())
            .push(" OFFSET ")
            .push_bind(resolved.offset());

        let rows = query
            .build_query_as::<AdminSessionRow>()
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .into_iter()
            .map(|row| {
                let mentee = UserContact {
                    user_id: row.session.mentee_id,
                    username: row.mentee_username,
                    email: row.mentee_email,
                    first_name: row.mentee_first_name,
                };
                Ok(AdminSessionSummary {
                    session: Session::try_from(row.session)?.into(),
                    mentor_name: row.mentor_name,
                    mentee,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(resolved.into_page(items))
    }

    async fn user_contact(&self, user_id: Uuid) -> Result<Option<UserContact>, StoreError> {
        let row = sqlx::query_as::<_, ContactRow>(
            "SELECT user_id, username, email, first_name FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserContact::from))
    }
}

#[async_trait]
impl MentorRepository for PgStore {
    async fn get_mentor(&self, mentor_id: Uuid) -> Result<Option<MentorProfile>, StoreError> {
        let row = sqlx::query_as::<_, MentorProfileRow>("SELECT * FROM mentor_profiles WHERE mentor_id = $1")
            .bind(mentor_id)
            .fetch_optional(&self.pool)
            .await?;

        self.hydrate_one(row).await
    }

    async fn mentor_for_user(&self, user_id: Uuid) -> Result<Option<MentorProfile>, StoreError> {
        let row = sqlx::query_as::<_, MentorProfileRow>("SELECT * FROM mentor_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        self.hydrate_one(row).await
    }

    async fn search_mentors(
        &self,
        filter: &MentorFilter,
        page: PageRequest,
    ) -> Result<Page<MentorProfile>, StoreError> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM mentor_profiles m LEFT JOIN users u ON u.user_id = m.user_id",
        );
        push_mentor_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let resolved = page.resolve(total.max(0) as u64);

        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT m.* FROM mentor_profiles m LEFT JOIN users u ON u.user_id = m.user_id",
        );
        push_mentor_filters(&mut query, filter);
        query
            .push(" ORDER BY m.created_at DESC LIMIT ")
            .push_bind(resolved.limit())
            .push(" OFFSET ")
            .push_bind(resolved.offset());

        let rows = query
            .build_query_as::<MentorProfileRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(resolved.into_page(self.hydrate(rows).await?))
    }

    async fn insert_mentor(&self, new: NewMentorProfile) -> Result<MentorProfile, StoreError> {
        let mentor_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO mentor_profiles (
                mentor_id, user_id, full_name, headline, bio, location, linkedin_url, github_url,
                years_of_experience, hourly_rate, availability, session_duration, available_for,
                application_status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(mentor_id)
        .bind(new.user_id)
        .bind(&new.full_name)
        .bind(&new.headline)
        .bind(&new.bio)
        .bind(&new.location)
        .bind(&new.linkedin_url)
        .bind(&new.github_url)
        .bind(new.years_of_experience)
        .bind(new.hourly_rate)
        .bind(new.availability.to_json())
        .bind(new.session_duration.minutes())
        .bind(&new.available_for)
        .bind(new.application_status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_any_unique_violation(&e) {
                StoreError::Duplicate("This user already has a mentor profile.".to_string())
            } else {
                StoreError::Database(e)
            }
        })?;

        for skill_id in &new.skill_ids {
            sqlx::query("INSERT INTO mentor_skills (mentor_id, skill_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(mentor_id)
                .bind(skill_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.get_mentor(mentor_id).await?.ok_or(StoreError::NotFound)
    }

    async fn update_mentor(&self, mentor: &MentorProfile) -> Result<MentorProfile, StoreError> {
        let row = sqlx::query_as::<_, MentorProfileRow>(
            r#"
            UPDATE mentor_profiles
            SET full_name = $2,
                headline = $3,
                bio = $4,
                location = $5,
                linkedin_url = $6,
                github_url = $7,
                years_of_experience = $8,
                hourly_rate = $9,
                availability = $10,
                session_duration = $11,
                available_for = $12,
                application_status = $13,
                admin_notes = $14,
                updated_at = NOW()
            WHERE mentor_id = $1
            RETURNING *
            "#,
        )
        .bind(mentor.id)
        .bind(&mentor.full_name)
        .bind(&mentor.headline)
        .bind(&mentor.bio)
        .bind(&mentor.location)
        .bind(&mentor.linkedin_url)
        .bind(&mentor.github_url)
        .bind(mentor.years_of_experience)
        .bind(mentor.hourly_rate)
        .bind(mentor.availability.to_json())
        .bind(mentor.session_duration.minutes())
        .bind(&mentor.available_for)
        .bind(mentor.application_status.as_str())
        .bind(&mentor.admin_notes)
        .fetch_optional(&self.pool)
        .await?;

        self.hydrate_one(row).await?.ok_or(StoreError::NotFound)
    }

    async fn set_mentor_skills(&self, mentor_id: Uuid, skill_ids: &[Uuid]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM mentor_skills WHERE mentor_id = $1")
            .bind(mentor_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO mentor_skills (mentor_id, skill_id)
            SELECT $1, skill_id FROM skills WHERE skill_id = ANY($2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(mentor_id)
        .bind(skill_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_mentor(&self, mentor_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM mentor_profiles WHERE mentor_id = $1")
            .bind(mentor_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_skills(&self) -> Result<Vec<Skill>, StoreError> {
        let rows = sqlx::query_as::<_, SkillRow>("SELECT * FROM skills ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Skill::from).collect())
    }

    async fn get_skill(&self, skill_id: Uuid) -> Result<Option<Skill>, StoreError> {
        let row = sqlx::query_as::<_, SkillRow>("SELECT * FROM skills WHERE skill_id = $1")
            .bind(skill_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Skill::from))
    }

    async fn get_or_create_skill(&self, name: &str) -> Result<Skill, StoreError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query_as::<_, SkillRow>(
            r#"
            INSERT INTO skills (skill_id, name) VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn update_skill(&self, skill: &Skill) -> Result<Skill, StoreError> {
        let row = sqlx::query_as::<_, SkillRow>(
            "UPDATE skills SET name = $2, description = $3 WHERE skill_id = $1 RETURNING *",
        )
        .bind(skill.id)
        .bind(&skill.name)
        .bind(&skill.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_any_unique_violation(&e) {
                StoreError::Duplicate("A skill with this name already exists.".to_string())
            } else {
                StoreError::Database(e)
            }
        })?
        .ok_or(StoreError::NotFound)?;

        Ok(row.into())
    }

    async fn delete_skill(&self, skill_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM skills WHERE skill_id = $1")
            .bind(skill_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn dashboard_counts(&self) -> Result<DashboardCounts, StoreError> {
        let (total_users, total_mentors, pending_mentors, approved_mentors, total_skills) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM users),
                    (SELECT COUNT(*) FROM mentor_profiles),
                    (SELECT COUNT(*) FROM mentor_profiles WHERE application_status = 'pending'),
                    (SELECT COUNT(*) FROM mentor_profiles WHERE application_status = 'approved'),
                    (SELECT COUNT(*) FROM skills)
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(DashboardCounts {
            total_users,
            total_mentors,
            pending_mentors,
            approved_mentors,
            total_skills,
        })
    }
}
