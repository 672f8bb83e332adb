use anyhow::Result;
use chrono::SecondsFormat;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::engine::geo::{GeoPoint, SearchArea};

pub struct Db {
    conn: Mutex<Connection>,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub photo_url: Option<String>,
    pub age: Option<i64>,
    pub bio: Option<String>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub metro_station: Option<String>,
    pub search_lat: Option<f64>,
    pub search_lon: Option<f64>,
    /// Meters.
    pub search_radius: Option<i64>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn center(&self) -> Option<GeoPoint> {
        GeoPoint::new(self.search_lat?, self.search_lon?)
    }

    /// Center plus radius; `None` unless both are set.
    pub fn search_area(&self) -> Option<SearchArea> {
        Some(SearchArea::new(self.center()?, self.search_radius? as f64))
    }

    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            self.username.clone().unwrap_or_else(|| "User".into())
        } else {
            parts.join(" ")
        }
    }
}

/// Identity fields copied from validated Telegram init data.
pub struct TelegramIdentity<'a> {
    pub telegram_id: i64,
    pub username: Option<&'a str>,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub photo_url: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    pub address: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub rooms: Option<i64>,
    pub area: Option<f64>,
    pub floor: Option<i64>,
    pub total_floors: Option<i64>,
    pub metro_station: Option<String>,
    pub metro_distance: Option<i64>,
    pub photos: Vec<String>,
    pub is_active: bool,
    pub created_at: String,
}

impl Listing {
    pub fn location(&self) -> GeoPoint {
        GeoPoint { lat: self.lat, lon: self.lon }
    }
}

#[derive(Default)]
pub struct NewListing {
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    pub address: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub rooms: Option<i64>,
    pub area: Option<f64>,
    pub floor: Option<i64>,
    pub total_floors: Option<i64>,
    pub metro_station: Option<String>,
    pub metro_distance: Option<i64>,
    pub photos: Vec<String>,
}

pub struct MatchRecord {
    pub id: String,
    pub created_at: String,
    pub other: User,
}

#[derive(Debug, PartialEq, Eq)]
pub enum LikeOutcome {
    AlreadyLiked,
    Liked { mutual: bool, new_match: bool },
}

const USER_COLUMNS: &str = "u.id, u.telegram_id, u.username, u.first_name, u.last_name, u.photo_url,
     u.age, u.bio, u.price_min, u.price_max, u.metro_station, u.search_lat, u.search_lon,
     u.search_radius, u.is_active, u.created_at, u.updated_at";

const LISTING_COLUMNS: &str = "l.id, l.title, l.description, l.price, l.address, l.lat, l.lon,
     l.rooms, l.area, l.floor, l.total_floors, l.metro_station, l.metro_distance, l.photos,
     l.is_active, l.created_at";

fn user_from_row(row: &Row, o: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(o)?,
        telegram_id: row.get(o + 1)?,
        username: row.get(o + 2)?,
        first_name: row.get(o + 3)?,
        last_name: row.get(o + 4)?,
        photo_url: row.get(o + 5)?,
        age: row.get(o + 6)?,
        bio: row.get(o + 7)?,
        price_min: row.get(o + 8)?,
        price_max: row.get(o + 9)?,
        metro_station: row.get(o + 10)?,
        search_lat: row.get(o + 11)?,
        search_lon: row.get(o + 12)?,
        search_radius: row.get(o + 13)?,
        is_active: row.get::<_, i32>(o + 14)? != 0,
        created_at: row.get(o + 15)?,
        updated_at: row.get(o + 16)?,
    })
}

fn listing_from_row(row: &Row) -> rusqlite::Result<Listing> {
    let photos: String = row.get(13)?;
    Ok(Listing {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        address: row.get(4)?,
        lat: row.get(5)?,
        lon: row.get(6)?,
        rooms: row.get(7)?,
        area: row.get(8)?,
        floor: row.get(9)?,
        total_floors: row.get(10)?,
        metro_station: row.get(11)?,
        metro_distance: row.get(12)?,
        photos: serde_json::from_str(&photos).unwrap_or_default(),
        is_active: row.get::<_, i32>(14)? != 0,
        created_at: row.get(15)?,
    })
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Canonical order of a match pair: smaller id first.
pub fn ordered_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn get_user_in(conn: &Connection, id: &str) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id=?1"),
        params![id],
        |row| user_from_row(row, 0),
    )
    .optional()
    .map_err(Into::into)
}

fn user_by_telegram_id_in(conn: &Connection, telegram_id: i64) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.telegram_id=?1"),
        params![telegram_id],
        |row| user_from_row(row, 0),
    )
    .optional()
    .map_err(Into::into)
}

fn upsert_identity_in(conn: &Connection, identity: &TelegramIdentity) -> Result<User> {
    let ts = now();
    conn.execute(
        "INSERT INTO users (id, telegram_id, username, first_name, last_name, photo_url,
                            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
         ON CONFLICT(telegram_id) DO UPDATE SET
            username=excluded.username, first_name=excluded.first_name,
            last_name=excluded.last_name, photo_url=excluded.photo_url,
            updated_at=excluded.updated_at",
        params![
            new_id(),
            identity.telegram_id,
            identity.username,
            identity.first_name,
            identity.last_name,
            identity.photo_url,
            ts
        ],
    )?;
    user_by_telegram_id_in(conn, identity.telegram_id)?
        .ok_or_else(|| anyhow::anyhow!("user {} vanished after upsert", identity.telegram_id))
}

fn save_profile_in(conn: &Connection, user: &User) -> Result<User> {
    conn.execute(
        "UPDATE users SET age=?1, bio=?2, price_min=?3, price_max=?4, metro_station=?5,
            search_lat=?6, search_lon=?7, search_radius=?8, updated_at=?9
         WHERE id=?10",
        params![
            user.age,
            user.bio,
            user.price_min,
            user.price_max,
            user.metro_station,
            user.search_lat,
            user.search_lon,
            user.search_radius,
            now(),
            user.id
        ],
    )?;
    get_user_in(conn, &user.id)?.ok_or_else(|| anyhow::anyhow!("user {} not found", user.id))
}

impl Db {
    pub fn new(path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000; PRAGMA foreign_keys=ON;",
        )?;
        conn.execute_batch(include_str!("../../migrations/001_init.sql"))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ping(&self) -> Result<()> {
        self.conn().query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    // ── Users ──

    /// Create the user on first sight, otherwise refresh the Telegram fields.
    pub fn upsert_identity(&self, identity: &TelegramIdentity) -> Result<User> {
        let conn = self.conn();
        upsert_identity_in(&conn, identity)
    }

    /// Upsert the identity, let `edit` change the profile, and save it, all in
    /// one transaction. Nothing is written if `edit` fails.
    pub fn upsert_profile<E>(
        &self,
        identity: &TelegramIdentity,
        edit: impl FnOnce(&mut User) -> std::result::Result<(), E>,
    ) -> std::result::Result<User, E>
    where
        E: From<anyhow::Error>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction().map_err(anyhow::Error::from)?;
        let mut user = upsert_identity_in(&tx, identity)?;
        edit(&mut user)?;
        let saved = save_profile_in(&tx, &user)?;
        tx.commit().map_err(anyhow::Error::from)?;
        Ok(saved)
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        get_user_in(&conn, id)
    }

    pub fn get_user_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>> {
        let conn = self.conn();
        user_by_telegram_id_in(&conn, telegram_id)
    }

    /// Persist the editable profile fields of `user`.
    pub fn save_profile(&self, user: &User) -> Result<User> {
        let conn = self.conn();
        save_profile_in(&conn, user)
    }

    #[cfg(test)]
    pub fn set_active(&self, user_id: &str, active: bool) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE users SET is_active=?1, updated_at=?2 WHERE id=?3",
            params![active as i32, now(), user_id],
        )?;
        Ok(())
    }

    /// Active users with a full search area, excluding `user_id` and
    /// everyone `user_id` already liked.
    pub fn match_candidates(&self, user_id: &str) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users u
             WHERE u.id != ?1 AND u.is_active=1
               AND u.search_lat IS NOT NULL AND u.search_lon IS NOT NULL
               AND u.search_radius IS NOT NULL
               AND u.id NOT IN (SELECT liked_id FROM user_likes WHERE liker_id=?1)"
        ))?;
        let users = stmt
            .query_map(params![user_id], |row| user_from_row(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    pub fn active_users(&self) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.is_active=1 ORDER BY u.created_at, u.rowid"
        ))?;
        let users = stmt
            .query_map([], |row| user_from_row(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    pub fn count_users(&self) -> Result<i64> {
        let conn = self.conn();
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }

    // ── Likes & matches ──

    /// Record a directed like. If the reverse like exists the pair becomes a
    /// match. Both writes share one transaction.
    pub fn like_user(&self, liker_id: &str, liked_id: &str) -> Result<LikeOutcome> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM user_likes WHERE liker_id=?1 AND liked_id=?2)",
            params![liker_id, liked_id],
            |row| row.get(0),
        )?;
        if exists {
            return Ok(LikeOutcome::AlreadyLiked);
        }

        let ts = now();
        tx.execute(
            "INSERT INTO user_likes (id, liker_id, liked_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![new_id(), liker_id, liked_id, ts],
        )?;

        let mutual: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM user_likes WHERE liker_id=?1 AND liked_id=?2)",
            params![liked_id, liker_id],
            |row| row.get(0),
        )?;

        let mut new_match = false;
        if mutual {
            let (user1, user2) = ordered_pair(liker_id, liked_id);
            new_match = tx.execute(
                "INSERT OR IGNORE INTO user_matches (id, user1_id, user2_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![new_id(), user1, user2, ts],
            )? > 0;
        }

        tx.commit()?;
        Ok(LikeOutcome::Liked { mutual, new_match })
    }

    pub fn matches_for(&self, user_id: &str) -> Result<Vec<MatchRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT m.id, m.created_at, {USER_COLUMNS}
             FROM user_matches m
             JOIN users u ON u.id = CASE WHEN m.user1_id=?1 THEN m.user2_id ELSE m.user1_id END
             WHERE m.user1_id=?1 OR m.user2_id=?1
             ORDER BY m.created_at DESC, m.rowid DESC"
        ))?;
        let matches = stmt
            .query_map(params![user_id], |row| {
                Ok(MatchRecord {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    other: user_from_row(row, 2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(matches)
    }

    pub fn are_matched(&self, a: &str, b: &str) -> Result<bool> {
        let (user1, user2) = ordered_pair(a, b);
        let conn = self.conn();
        Ok(conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM user_matches WHERE user1_id=?1 AND user2_id=?2)",
            params![user1, user2],
            |row| row.get(0),
        )?)
    }

    // ── Listings ──

    pub fn insert_listing(&self, listing: &NewListing) -> Result<String> {
        let conn = self.conn();
        let id = new_id();
        conn.execute(
            "INSERT INTO listings (id, title, description, price, address, lat, lon, rooms, area,
                                   floor, total_floors, metro_station, metro_distance, photos,
                                   created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                id,
                listing.title,
                listing.description,
                listing.price,
                listing.address,
                listing.lat,
                listing.lon,
                listing.rooms,
                listing.area,
                listing.floor,
                listing.total_floors,
                listing.metro_station,
                listing.metro_distance,
                serde_json::to_string(&listing.photos)?,
                now()
            ],
        )?;
        Ok(id)
    }

    pub fn get_listing(&self, id: &str) -> Result<Option<Listing>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {LISTING_COLUMNS} FROM listings l WHERE l.id=?1"),
            params![id],
            listing_from_row,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Active listings within the optional price bounds, newest first.
    pub fn active_listings(&self, price_min: Option<i64>, price_max: Option<i64>) -> Result<Vec<Listing>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings l
             WHERE l.is_active=1
               AND (?1 IS NULL OR l.price >= ?1)
               AND (?2 IS NULL OR l.price <= ?2)
             ORDER BY l.created_at DESC, l.rowid DESC"
        ))?;
        let listings = stmt
            .query_map(params![price_min, price_max], listing_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(listings)
    }

    #[cfg(test)]
    pub fn set_listing_active(&self, id: &str, active: bool) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE listings SET is_active=?1 WHERE id=?2",
            params![active as i32, id],
        )?;
        Ok(())
    }

    pub fn count_listings(&self) -> Result<i64> {
        let conn = self.conn();
        Ok(conn.query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?)
    }

    /// Returns `false` if the like already existed.
    pub fn like_listing(&self, user_id: &str, listing_id: &str) -> Result<bool> {
        let conn = self.conn();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO listing_likes (id, user_id, listing_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![new_id(), user_id, listing_id, now()],
        )?;
        Ok(inserted > 0)
    }

    /// Active listings liked by `user_id`, most recent like first.
    pub fn liked_listings(&self, user_id: &str) -> Result<Vec<Listing>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings l
             JOIN listing_likes ll ON ll.listing_id = l.id
             WHERE ll.user_id=?1 AND l.is_active=1
             ORDER BY ll.created_at DESC, ll.rowid DESC"
        ))?;
        let listings = stmt
            .query_map(params![user_id], listing_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(listings)
    }

    pub fn liked_listing_ids(&self, user_id: &str) -> Result<HashSet<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT listing_id FROM listing_likes WHERE user_id=?1")?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<Result<HashSet<String>, _>>()?;
        Ok(ids)
    }
}
