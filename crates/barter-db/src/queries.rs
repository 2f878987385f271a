use std::str::FromStr;

use anyhow::Result;
use barter_types::models::{Condition, ProposalStatus};
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, Row, params, params_from_iter};

use crate::Database;
use crate::models::{AdFields, AdRow, ProposalRow, SessionRow, UserRow};

const AD_SELECT: &str = "SELECT a.id, a.user_id, u.username, a.title, a.description, a.image_url,
        a.category, a.condition, a.created_at
     FROM ads a
     JOIN users u ON u.id = a.user_id";

const PROPOSAL_SELECT: &str = "SELECT p.id,
        s.id, s.user_id, su.username, s.title, s.description, s.image_url,
        s.category, s.condition, s.created_at,
        p.ad_receiver_id, r.user_id, r.title, ru.username,
        p.comment, p.status, p.created_at
     FROM exchange_proposals p
     JOIN ads s ON s.id = p.ad_sender_id
     JOIN users su ON su.id = s.user_id
     JOIN ads r ON r.id = p.ad_receiver_id
     JOIN users ru ON ru.id = r.user_id";

/// A LIMIT/OFFSET window over a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub limit: u32,
    pub offset: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdOrder {
    /// Insertion order.
    #[default]
    Oldest,
    Newest,
}

#[derive(Debug, Clone, Default)]
pub struct AdFilter {
    pub category: Option<String>,
    pub condition: Option<Condition>,
    pub owner_id: Option<i64>,
    /// Every term must appear, case-insensitively, in the title or the description.
    pub terms: Vec<String>,
    pub order: AdOrder,
}

#[derive(Debug, Clone, Default)]
pub struct ProposalFilter {
    pub status: Option<ProposalStatus>,
    pub ad_sender: Option<i64>,
    pub ad_receiver: Option<i64>,
    /// Every term must appear, case-insensitively, in the comment.
    pub terms: Vec<String>,
    /// Proposals where this user owns the sender or the receiver ad.
    pub involving_user: Option<i64>,
    pub newest_first: bool,
}

/// Accumulates WHERE clauses with their positional parameters.
#[derive(Default)]
struct Conditions {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Conditions {
    fn push(&mut self, clause: impl Into<String>, params: impl IntoIterator<Item = Value>) {
        self.clauses.push(clause.into());
        self.params.extend(params);
    }

    fn search(&mut self, columns: &[&str], terms: &[String]) {
        for term in terms {
            let needle = term.to_lowercase();
            let any_column: Vec<String> = columns
                .iter()
                .map(|c| format!("instr(casefold({}), ?) > 0", c))
                .collect();
            self.push(
                format!("({})", any_column.join(" OR ")),
                columns.iter().map(|_| Value::Text(needle.clone())),
            );
        }
    }

    fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

impl AdFilter {
    fn conditions(&self) -> Conditions {
        let mut c = Conditions::default();
        if let Some(category) = &self.category {
            c.push("a.category = ?", [Value::Text(category.clone())]);
        }
        if let Some(condition) = self.condition {
            c.push("a.condition = ?", [Value::Text(condition.as_str().to_string())]);
        }
        if let Some(owner_id) = self.owner_id {
            c.push("a.user_id = ?", [Value::Integer(owner_id)]);
        }
        c.search(&["a.title", "a.description"], &self.terms);
        c
    }

    fn order_sql(&self) -> &'static str {
        match self.order {
            AdOrder::Oldest => " ORDER BY a.id ASC",
            AdOrder::Newest => " ORDER BY a.created_at DESC, a.id DESC",
        }
    }
}

impl ProposalFilter {
    fn conditions(&self) -> Conditions {
        let mut c = Conditions::default();
        if let Some(status) = self.status {
            c.push("p.status = ?", [Value::Text(status.as_str().to_string())]);
        }
        if let Some(sender) = self.ad_sender {
            c.push("p.ad_sender_id = ?", [Value::Integer(sender)]);
        }
        if let Some(receiver) = self.ad_receiver {
            c.push("p.ad_receiver_id = ?", [Value::Integer(receiver)]);
        }
        if let Some(user_id) = self.involving_user {
            // One row per proposal: the joins never fan out, so no DISTINCT needed.
            c.push(
                "(s.user_id = ? OR r.user_id = ?)",
                [Value::Integer(user_id), Value::Integer(user_id)],
            );
        }
        c.search(&["p.comment"], &self.terms);
        c
    }

    fn order_sql(&self) -> &'static str {
        if self.newest_first {
            " ORDER BY p.created_at DESC, p.id DESC"
        } else {
            " ORDER BY p.id ASC"
        }
    }
}

fn slice_sql(slice: Option<Slice>) -> String {
    match slice {
        Some(s) => format!(" LIMIT {} OFFSET {}", s.limit, s.offset),
        None => String::new(),
    }
}

impl Database {
    // -- Users --

    /// Insert a user. `None` when the username is already taken.
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<Option<i64>> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO users (username, password, created_at) VALUES (?1, ?2, ?3)",
                params![username, password_hash, Utc::now()],
            )?;
            Ok((inserted == 1).then(|| conn.last_insert_rowid()))
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(conn, "SELECT id, username, password, created_at FROM users WHERE username = ?1", username)
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(conn, "SELECT id, username, password, created_at FROM users WHERE id = ?1", id)
        })
    }

    pub fn list_users(&self, slice: Option<Slice>) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, username, password, created_at FROM users ORDER BY id ASC{}",
                slice_sql(slice)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_users(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            Ok(n as u64)
        })
    }

    /// Removes a user; their ads, proposals touching those ads, and sessions go with it.
    pub fn delete_user(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    // -- Ads --

    pub fn create_ad(&self, user_id: i64, fields: &AdFields) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO ads (user_id, title, description, image_url, category, condition, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user_id,
                    fields.title,
                    fields.description,
                    fields.image_url,
                    fields.category,
                    fields.condition.as_str(),
                    Utc::now(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_ad(&self, id: i64) -> Result<Option<AdRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE a.id = ?1", AD_SELECT);
            conn.query_row(&sql, [id], |row| map_ad(row, 0)).optional()
        })
    }

    pub fn list_ads(&self, filter: &AdFilter, slice: Option<Slice>) -> Result<Vec<AdRow>> {
        self.with_conn(|conn| {
            let cond = filter.conditions();
            let sql = format!("{}{}{}{}", AD_SELECT, cond.sql(), filter.order_sql(), slice_sql(slice));
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(cond.params.iter()), |row| map_ad(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_ads(&self, filter: &AdFilter) -> Result<u64> {
        self.with_conn(|conn| {
            let cond = filter.conditions();
            let sql = format!(
                "SELECT COUNT(*) FROM ads a JOIN users u ON u.id = a.user_id{}",
                cond.sql()
            );
            let n: i64 = conn.query_row(&sql, params_from_iter(cond.params.iter()), |r| r.get(0))?;
            Ok(n as u64)
        })
    }

    /// Overwrites the mutable fields. Owner and creation time never change.
    pub fn update_ad(&self, id: i64, fields: &AdFields) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE ads SET title = ?1, description = ?2, image_url = ?3, category = ?4, condition = ?5
                 WHERE id = ?6",
                params![
                    fields.title,
                    fields.description,
                    fields.image_url,
                    fields.category,
                    fields.condition.as_str(),
                    id,
                ],
            )?;
            Ok(n > 0)
        })
    }

    pub fn delete_ad(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM ads WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    // -- Exchange proposals --

    pub fn create_proposal(&self, ad_sender_id: i64, ad_receiver_id: i64, comment: &str) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO exchange_proposals (ad_sender_id, ad_receiver_id, comment, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    ad_sender_id,
                    ad_receiver_id,
                    comment,
                    ProposalStatus::Pending.as_str(),
                    Utc::now(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_proposal(&self, id: i64) -> Result<Option<ProposalRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE p.id = ?1", PROPOSAL_SELECT);
            conn.query_row(&sql, [id], map_proposal).optional()
        })
    }

    pub fn list_proposals(&self, filter: &ProposalFilter, slice: Option<Slice>) -> Result<Vec<ProposalRow>> {
        self.with_conn(|conn| {
            let cond = filter.conditions();
            let sql = format!(
                "{}{}{}{}",
                PROPOSAL_SELECT,
                cond.sql(),
                filter.order_sql(),
                slice_sql(slice)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(cond.params.iter()), map_proposal)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_proposals(&self, filter: &ProposalFilter) -> Result<u64> {
        self.with_conn(|conn| {
            let cond = filter.conditions();
            let sql = format!(
                "SELECT COUNT(*) FROM exchange_proposals p
                 JOIN ads s ON s.id = p.ad_sender_id
                 JOIN ads r ON r.id = p.ad_receiver_id{}",
                cond.sql()
            );
            let n: i64 = conn.query_row(&sql, params_from_iter(cond.params.iter()), |r| r.get(0))?;
            Ok(n as u64)
        })
    }

    /// Rewrites the editable parts of a proposal. Status is left alone.
    pub fn update_proposal(
        &self,
        id: i64,
        ad_sender_id: i64,
        ad_receiver_id: i64,
        comment: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE exchange_proposals SET ad_sender_id = ?1, ad_receiver_id = ?2, comment = ?3
                 WHERE id = ?4",
                params![ad_sender_id, ad_receiver_id, comment, id],
            )?;
            Ok(n > 0)
        })
    }

    /// Unconditional status write: last writer wins, terminal states included.
    pub fn set_proposal_status(&self, id: i64, status: ProposalStatus) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE exchange_proposals SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )?;
            Ok(n > 0)
        })
    }

    pub fn delete_proposal(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM exchange_proposals WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    // -- Sessions --

    pub fn create_session(&self, id: &str, user_id: i64, expires_at: DateTime<Utc>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, expires_at) VALUES (?1, ?2, ?3)",
                params![id, user_id, expires_at],
            )?;
            Ok(())
        })
    }

    /// Returns a live session. Expired sessions are removed and reported as absent.
    pub fn get_session(&self, id: &str) -> Result<Option<SessionRow>> {
        self.with_conn_mut(|conn| {
            let session = conn
                .query_row(
                    "SELECT id, user_id, flash, expires_at FROM sessions WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(SessionRow {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            flash: row.get(2)?,
                            expires_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;

            match session {
                Some(s) if s.expires_at <= Utc::now() => {
                    conn.execute("DELETE FROM sessions WHERE id = ?1", [id])?;
                    Ok(None)
                }
                other => Ok(other),
            }
        })
    }

    pub fn set_session_flash(&self, id: &str, flash: Option<&str>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE sessions SET flash = ?1 WHERE id = ?2",
                params![flash, id],
            )?;
            Ok(())
        })
    }

    pub fn delete_session(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    pub fn purge_expired_sessions(&self) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [Utc::now()])?;
            Ok(n)
        })
    }
}

fn query_user<P: rusqlite::ToSql>(conn: &Connection, sql: &str, key: P) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(sql)?;
    stmt.query_row([key], map_user).optional()
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Maps the nine ad columns starting at `at`.
fn map_ad(row: &Row<'_>, at: usize) -> rusqlite::Result<AdRow> {
    Ok(AdRow {
        id: row.get(at)?,
        user_id: row.get(at + 1)?,
        username: row.get(at + 2)?,
        title: row.get(at + 3)?,
        description: row.get(at + 4)?,
        image_url: row.get(at + 5)?,
        category: row.get(at + 6)?,
        condition: parse_column(row, at + 7)?,
        created_at: row.get(at + 8)?,
    })
}

fn map_proposal(row: &Row<'_>) -> rusqlite::Result<ProposalRow> {
    Ok(ProposalRow {
        id: row.get(0)?,
        sender: map_ad(row, 1)?,
        ad_receiver_id: row.get(10)?,
        receiver_owner_id: row.get(11)?,
        receiver_title: row.get(12)?,
        receiver_owner_username: row.get(13)?,
        comment: row.get(14)?,
        status: parse_column(row, 15)?,
        created_at: row.get(16)?,
    })
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fields(title: &str, description: &str, category: &str, condition: Condition) -> AdFields {
        AdFields {
            title: title.to_string(),
            description: description.to_string(),
            image_url: None,
            category: category.to_string(),
            condition,
        }
    }

    struct Fixture {
        db: Database,
        batman: i64,
        genji: i64,
        shirt: i64,
        book: i64,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let batman = db.create_user("batman", "hash").unwrap().unwrap();
        let genji = db.create_user("genji", "hash").unwrap().unwrap();
        let shirt = db
            .create_ad(batman, &fields("Футболка", "Черная, M", "одежда", Condition::Used))
            .unwrap();
        let book = db
            .create_ad(genji, &fields("Книга", "Фантастика", "книги", Condition::New))
            .unwrap();
        Fixture { db, batman, genji, shirt, book }
    }

    #[test]
    fn ad_roundtrip_keeps_owner_and_fields() {
        let f = fixture();
        let ad = f.db.get_ad(f.shirt).unwrap().unwrap();
        assert_eq!(ad.user_id, f.batman);
        assert_eq!(ad.username, "batman");
        assert_eq!(ad.title, "Футболка");
        assert_eq!(ad.condition, Condition::Used);
        assert!(f.db.get_ad(9999).unwrap().is_none());
    }

    #[test]
    fn search_is_case_insensitive_for_cyrillic() {
        let f = fixture();
        let filter = AdFilter {
            terms: vec!["ФУТБОЛ".to_string()],
            ..Default::default()
        };
        let ads = f.db.list_ads(&filter, None).unwrap();
        assert_eq!(ads.len(), 1);
        assert_eq!(ads[0].id, f.shirt);
        assert_eq!(f.db.count_ads(&filter).unwrap(), 1);
    }

    #[test]
    fn search_terms_must_all_match() {
        let f = fixture();
        let filter = AdFilter {
            terms: vec!["черная".to_string(), "книга".to_string()],
            ..Default::default()
        };
        assert_eq!(f.db.count_ads(&filter).unwrap(), 0);
    }

    #[test]
    fn filters_combine() {
        let f = fixture();
        let filter = AdFilter {
            category: Some("книги".to_string()),
            condition: Some(Condition::New),
            ..Default::default()
        };
        let ads = f.db.list_ads(&filter, None).unwrap();
        assert_eq!(ads.iter().map(|a| a.id).collect::<Vec<_>>(), vec![f.book]);

        let mine = AdFilter {
            owner_id: Some(f.batman),
            ..Default::default()
        };
        assert_eq!(f.db.count_ads(&mine).unwrap(), 1);
    }

    #[test]
    fn slices_and_orders_ads() {
        let f = fixture();
        let newest = AdFilter {
            order: AdOrder::Newest,
            ..Default::default()
        };
        let first = f
            .db
            .list_ads(&newest, Some(Slice { limit: 1, offset: 0 }))
            .unwrap();
        assert_eq!(first[0].id, f.book);

        let second = f
            .db
            .list_ads(&AdFilter::default(), Some(Slice { limit: 1, offset: 1 }))
            .unwrap();
        assert_eq!(second[0].id, f.book);
    }

    #[test]
    fn involving_user_lists_each_proposal_once() {
        let f = fixture();
        let other = f.db.create_ad(f.batman, &fields("Стул", "Дерево", "мебель", Condition::Used)).unwrap();
        // batman owns both sides of this one
        let both = f.db.create_proposal(f.shirt, other, "self trade").unwrap();
        let sent = f.db.create_proposal(f.shirt, f.book, "обмен").unwrap();
        let received = f.db.create_proposal(f.book, other, "обмен").unwrap();

        let filter = ProposalFilter {
            involving_user: Some(f.batman),
            ..Default::default()
        };
        let ids: Vec<i64> = f.db.list_proposals(&filter, None).unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![both, sent, received]);
        assert_eq!(f.db.count_proposals(&filter).unwrap(), 3);

        let genji = ProposalFilter {
            involving_user: Some(f.genji),
            ..Default::default()
        };
        let ids: Vec<i64> = f.db.list_proposals(&genji, None).unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![sent, received]);
    }

    #[test]
    fn proposal_resolves_receiver_owner() {
        let f = fixture();
        let id = f.db.create_proposal(f.shirt, f.book, "Обмен на книгу").unwrap();
        let p = f.db.get_proposal(id).unwrap().unwrap();
        assert_eq!(p.sender.id, f.shirt);
        assert_eq!(p.sender.user_id, f.batman);
        assert_eq!(p.ad_receiver_id, f.book);
        assert_eq!(p.receiver_owner_id, f.genji);
        assert_eq!(p.status, ProposalStatus::Pending);
    }

    #[test]
    fn status_writes_are_last_writer_wins() {
        let f = fixture();
        let id = f.db.create_proposal(f.shirt, f.book, "x").unwrap();
        assert!(f.db.set_proposal_status(id, ProposalStatus::Accepted).unwrap());
        assert!(f.db.set_proposal_status(id, ProposalStatus::Declined).unwrap());
        let p = f.db.get_proposal(id).unwrap().unwrap();
        assert_eq!(p.status, ProposalStatus::Declined);
        assert!(!f.db.set_proposal_status(9999, ProposalStatus::Accepted).unwrap());
    }

    #[test]
    fn proposal_filters_by_status_and_comment() {
        let f = fixture();
        let a = f.db.create_proposal(f.shirt, f.book, "Обменяю стул на стол").unwrap();
        let b = f.db.create_proposal(f.book, f.shirt, "maybe").unwrap();
        f.db.set_proposal_status(b, ProposalStatus::Accepted).unwrap();

        let accepted = ProposalFilter {
            status: Some(ProposalStatus::Accepted),
            ..Default::default()
        };
        assert_eq!(f.db.list_proposals(&accepted, None).unwrap()[0].id, b);

        let search = ProposalFilter {
            terms: vec!["СТУЛ".to_string()],
            ..Default::default()
        };
        assert_eq!(f.db.list_proposals(&search, None).unwrap()[0].id, a);

        let by_receiver = ProposalFilter {
            ad_receiver: Some(f.shirt),
            ..Default::default()
        };
        assert_eq!(f.db.count_proposals(&by_receiver).unwrap(), 1);
    }

    #[test]
    fn deleting_user_cascades_to_ads_and_proposals() {
        let f = fixture();
        let id = f.db.create_proposal(f.shirt, f.book, "x").unwrap();
        assert!(f.db.delete_user(f.genji).unwrap());

        assert!(f.db.get_ad(f.book).unwrap().is_none());
        assert!(f.db.get_proposal(id).unwrap().is_none());
        assert!(f.db.get_ad(f.shirt).unwrap().is_some());
    }

    #[test]
    fn deleting_ad_cascades_to_proposals() {
        let f = fixture();
        let id = f.db.create_proposal(f.shirt, f.book, "x").unwrap();
        assert!(f.db.delete_ad(f.shirt).unwrap());
        assert!(f.db.get_proposal(id).unwrap().is_none());
    }

    #[test]
    fn update_ad_leaves_owner_alone() {
        let f = fixture();
        let mut changes = AdFields::from(&f.db.get_ad(f.shirt).unwrap().unwrap());
        changes.title = "Рубашка".to_string();
        changes.image_url = Some("https://example.com/a.png".to_string());
        assert!(f.db.update_ad(f.shirt, &changes).unwrap());

        let ad = f.db.get_ad(f.shirt).unwrap().unwrap();
        assert_eq!(ad.title, "Рубашка");
        assert_eq!(ad.user_id, f.batman);
        assert_eq!(AdFields::from(&ad), changes);
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let f = fixture();
        assert_eq!(f.db.create_user("batman", "other").unwrap(), None);
        assert!(f.db.get_user_by_username("batman").unwrap().is_some_and(|u| u.password == "hash"));
        assert_eq!(f.db.count_users().unwrap(), 2);
    }

    #[test]
    fn expired_sessions_disappear() {
        let f = fixture();
        f.db
            .create_session("live", f.batman, Utc::now() + Duration::days(1))
            .unwrap();
        f.db
            .create_session("stale", f.batman, Utc::now() - Duration::seconds(1))
            .unwrap();

        assert!(f.db.get_session("live").unwrap().is_some());
        assert!(f.db.get_session("stale").unwrap().is_none());

        f.db.set_session_flash("live", Some("[]")).unwrap();
        assert_eq!(f.db.get_session("live").unwrap().unwrap().flash.as_deref(), Some("[]"));

        f.db.delete_session("live").unwrap();
        assert!(f.db.get_session("live").unwrap().is_none());
        assert_eq!(f.db.purge_expired_sessions().unwrap(), 0);
    }
}
