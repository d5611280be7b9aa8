//! SQLite-backed `DealRepository`.
//!
//! The database lives at `~/.dealboard/deals.db`. Timestamps are stored as
//! RFC 3339 text, action dates as `YYYY-MM-DD` text, so rows stay readable
//! with any SQLite tooling. Prospect rows cascade-delete with their deal.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

use crate::repo::{DealRepository, RepoError};
use crate::types::{Deal, DealPatch, DealType, Prospect};

/// Connection wrapper. Queries are short and the working set is one user's
/// pipeline, so a single mutex-guarded connection is enough; no await ever
/// happens while the lock is held.
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Open (or create) the database at `~/.dealboard/deals.db`.
    pub fn open() -> Result<Self, RepoError> {
        Self::open_at(Self::db_path()?)
    }

    /// Open a database at an explicit path. Useful for testing.
    pub fn open_at(path: PathBuf) -> Result<Self, RepoError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(RepoError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(include_str!("schema.sql"))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn db_path() -> Result<PathBuf, RepoError> {
        let home = dirs::home_dir().ok_or(RepoError::HomeDirNotFound)?;
        Ok(home.join(".dealboard").join("deals.db"))
    }
}

fn parse_timestamp(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn parse_date(raw: &str, idx: usize) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_deal_type(raw: &str, idx: usize) -> rusqlite::Result<DealType> {
    DealType::parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown deal type: {raw}").into(),
        )
    })
}

fn deal_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Deal> {
    let deal_type: String = row.get(4)?;
    let next_action_at: Option<String> = row.get(6)?;
    let last_activity_at: String = row.get(10)?;
    let created_at: String = row.get(11)?;

    Ok(Deal {
        id: row.get(0)?,
        owner: row.get(1)?,
        stage_id: row.get(2)?,
        organization: row.get(3)?,
        deal_type: parse_deal_type(&deal_type, 4)?,
        amount: row.get(5)?,
        next_action_at: next_action_at
            .map(|raw| parse_date(&raw, 6))
            .transpose()?,
        notes: row.get(7)?,
        company_url: row.get(8)?,
        contact_url: row.get(9)?,
        last_activity_at: parse_timestamp(&last_activity_at, 10)?,
        created_at: parse_timestamp(&created_at, 11)?,
        prospects: Vec::new(),
    })
}

#[async_trait]
impl DealRepository for SqliteRepository {
    async fn fetch_deals(&self, user_id: &str) -> Result<Vec<Deal>, RepoError> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT id, owner, stage_id, organization, deal_type, amount,
                    next_action_at, notes, company_url, contact_url,
                    last_activity_at, created_at
             FROM deals
             WHERE owner = ?1
             ORDER BY created_at DESC",
        )?;
        let mut deals: Vec<Deal> = stmt
            .query_map(params![user_id], deal_from_row)?
            .collect::<rusqlite::Result<_>>()?;

        let mut stmt = conn.prepare(
            "SELECT p.id, p.deal_id, p.name, p.notes
             FROM prospects p
             JOIN deals d ON d.id = p.deal_id
             WHERE d.owner = ?1",
        )?;
        let prospects: Vec<Prospect> = stmt
            .query_map(params![user_id], |row| {
                Ok(Prospect {
                    id: row.get(0)?,
                    deal_id: row.get(1)?,
                    name: row.get(2)?,
                    notes: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;

        for prospect in prospects {
            if let Some(deal) = deals.iter_mut().find(|d| d.id == prospect.deal_id) {
                deal.prospects.push(prospect);
            }
        }

        Ok(deals)
    }

    async fn insert_deal(&self, deal: &Deal) -> Result<(), RepoError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO deals (id, owner, stage_id, organization, deal_type, amount,
                                next_action_at, notes, company_url, contact_url,
                                last_activity_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                deal.id,
                deal.owner,
                deal.stage_id,
                deal.organization,
                deal.deal_type.as_str(),
                deal.amount,
                deal.next_action_at.map(|d| d.to_string()),
                deal.notes,
                deal.company_url,
                deal.contact_url,
                deal.last_activity_at.to_rfc3339(),
                deal.created_at.to_rfc3339(),
            ],
        )?;

        for prospect in &deal.prospects {
            tx.execute(
                "INSERT INTO prospects (id, deal_id, name, notes) VALUES (?1, ?2, ?3, ?4)",
                params![prospect.id, prospect.deal_id, prospect.name, prospect.notes],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    async fn update_deal(&self, id: &str, patch: &DealPatch) -> Result<(), RepoError> {
        let mut sets: Vec<&'static str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(org) = &patch.organization {
            sets.push("organization = ?");
            values.push(Value::Text(org.clone()));
        }
        if let Some(deal_type) = patch.deal_type {
            sets.push("deal_type = ?");
            values.push(Value::Text(deal_type.as_str().to_string()));
        }
        if let Some(stage_id) = &patch.stage_id {
            sets.push("stage_id = ?");
            values.push(Value::Text(stage_id.clone()));
        }
        if let Some(amount) = patch.amount {
            sets.push("amount = ?");
            values.push(amount.map_or(Value::Null, Value::Real));
        }
        if let Some(date) = patch.next_action_at {
            sets.push("next_action_at = ?");
            values.push(date.map_or(Value::Null, |d| Value::Text(d.to_string())));
        }
        if let Some(notes) = &patch.notes {
            sets.push("notes = ?");
            values.push(notes.clone().map_or(Value::Null, Value::Text));
        }
        if let Some(url) = &patch.company_url {
            sets.push("company_url = ?");
            values.push(url.clone().map_or(Value::Null, Value::Text));
        }
        if let Some(url) = &patch.contact_url {
            sets.push("contact_url = ?");
            values.push(url.clone().map_or(Value::Null, Value::Text));
        }
        if let Some(at) = patch.last_activity_at {
            sets.push("last_activity_at = ?");
            values.push(Value::Text(at.to_rfc3339()));
        }

        if sets.is_empty() {
            return Ok(());
        }
        values.push(Value::Text(id.to_string()));

        let sql = format!("UPDATE deals SET {} WHERE id = ?", sets.join(", "));
        let affected = self.conn.lock().execute(&sql, params_from_iter(values))?;
        if affected == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete_deal(&self, id: &str) -> Result<(), RepoError> {
        // Prospect rows go with the deal via ON DELETE CASCADE.
        let affected = self
            .conn
            .lock()
            .execute("DELETE FROM deals WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn insert_prospect(&self, prospect: &Prospect) -> Result<(), RepoError> {
        self.conn.lock().execute(
            "INSERT INTO prospects (id, deal_id, name, notes) VALUES (?1, ?2, ?3, ?4)",
            params![prospect.id, prospect.deal_id, prospect.name, prospect.notes],
        )?;
        Ok(())
    }

    async fn delete_prospect(&self, id: &str) -> Result<(), RepoError> {
        let affected = self
            .conn
            .lock()
            .execute("DELETE FROM prospects WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn repo() -> (TempDir, SqliteRepository) {
        let dir = TempDir::new().unwrap();
        let repo = SqliteRepository::open_at(dir.path().join("deals.db")).unwrap();
        (dir, repo)
    }

    fn deal(id: &str, created_day: u32) -> Deal {
        let at = Utc.with_ymd_and_hms(2024, 6, created_day, 9, 30, 0).unwrap();
        Deal {
            id: id.to_string(),
            owner: "u1".to_string(),
            stage_id: "lead".to_string(),
            organization: format!("Org {id}"),
            deal_type: DealType::Partner,
            amount: Some(750.5),
            next_action_at: NaiveDate::from_ymd_opt(2024, 7, 1),
            notes: Some("intro call done".to_string()),
            company_url: None,
            contact_url: None,
            last_activity_at: at,
            created_at: at,
            prospects: Vec::new(),
        }
    }

    #[tokio::test]
    async fn roundtrips_deals_most_recent_first() {
        let (_dir, repo) = repo();
        repo.insert_deal(&deal("old", 1)).await.unwrap();
        repo.insert_deal(&deal("new", 20)).await.unwrap();

        let deals = repo.fetch_deals("u1").await.unwrap();
        let ids: Vec<&str> = deals.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
        assert_eq!(deals[0], deal("new", 20));

        assert!(repo.fetch_deals("stranger").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_patch_sets_and_clears_fields() {
        let (_dir, repo) = repo();
        repo.insert_deal(&deal("d1", 1)).await.unwrap();

        let at = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let patch = DealPatch {
            stage_id: Some("proposal".to_string()),
            amount: Some(None),
            last_activity_at: Some(at),
            ..DealPatch::default()
        };
        repo.update_deal("d1", &patch).await.unwrap();

        let fetched = &repo.fetch_deals("u1").await.unwrap()[0];
        assert_eq!(fetched.stage_id, "proposal");
        assert_eq!(fetched.amount, None);
        assert_eq!(fetched.last_activity_at, at);
        // Untouched fields survive.
        assert_eq!(fetched.notes.as_deref(), Some("intro call done"));

        let missing = repo.update_deal("ghost", &patch).await.unwrap_err();
        assert!(matches!(missing, RepoError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleting_a_deal_cascades_to_prospects() {
        let (_dir, repo) = repo();
        repo.insert_deal(&deal("d1", 1)).await.unwrap();
        let prospect = Prospect {
            id: "p1".to_string(),
            deal_id: "d1".to_string(),
            name: "Jordan".to_string(),
            notes: None,
        };
        repo.insert_prospect(&prospect).await.unwrap();

        let fetched = repo.fetch_deals("u1").await.unwrap();
        assert_eq!(fetched[0].prospects, vec![prospect]);

        repo.delete_deal("d1").await.unwrap();
        assert!(repo.fetch_deals("u1").await.unwrap().is_empty());
        // The prospect row went with the deal.
        let gone = repo.delete_prospect("p1").await.unwrap_err();
        assert!(matches!(gone, RepoError::NotFound(_)));
    }

    #[tokio::test]
    async fn empty_patch_is_a_noop() {
        let (_dir, repo) = repo();
        repo.insert_deal(&deal("d1", 1)).await.unwrap();
        repo.update_deal("d1", &DealPatch::default()).await.unwrap();
        assert_eq!(repo.fetch_deals("u1").await.unwrap()[0], deal("d1", 1));
    }
}
