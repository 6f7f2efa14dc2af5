use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::{Connection, params};

use crate::models::{
    DailyLog, DailyLogDelta, GoalOverrides, MealItem, NewNutrient, NewUser, Nutrient, User,
    WeightEntry,
};

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    gender TEXT,
                    feet INTEGER,
                    inches INTEGER,
                    weight REAL,
                    birth_year INTEGER,
                    birth_month INTEGER,
                    birth_day INTEGER,
                    diet_type TEXT,
                    goal TEXT,
                    target_weight REAL,
                    weight_speed TEXT,
                    workouts_per_week TEXT,
                    custom_calorie_goal INTEGER,
                    custom_protein_goal INTEGER,
                    custom_carbs_goal INTEGER,
                    custom_fat_goal INTEGER,
                    push_token TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS daily_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    date TEXT NOT NULL,
                    calories REAL NOT NULL DEFAULT 0,
                    protein REAL NOT NULL DEFAULT 0,
                    carbs REAL NOT NULL DEFAULT 0,
                    fat REAL NOT NULL DEFAULT 0,
                    water REAL NOT NULL DEFAULT 0,
                    meals TEXT NOT NULL DEFAULT '[]',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS weight_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    date TEXT NOT NULL,
                    weight REAL NOT NULL,
                    notes TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS nutrients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    calories_per_g REAL NOT NULL,
                    protein_per_g REAL NOT NULL,
                    carbs_per_g REAL NOT NULL,
                    fat_per_g REAL NOT NULL
                );

                CREATE UNIQUE INDEX IF NOT EXISTS idx_daily_logs_user_date
                    ON daily_logs(user_id, date);
                CREATE INDEX IF NOT EXISTS idx_weight_entries_user_date
                    ON weight_entries(user_id, date);

                PRAGMA user_version = 1;",
            )?;
        }
        Ok(())
    }

    fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            password_hash: row.get(2)?,
            gender: row.get(3)?,
            feet: row.get(4)?,
            inches: row.get(5)?,
            weight: row.get(6)?,
            birth_year: row.get(7)?,
            birth_month: row.get(8)?,
            birth_day: row.get(9)?,
            diet_type: row.get(10)?,
            goal: row.get(11)?,
            target_weight: row.get(12)?,
            weight_speed: row.get(13)?,
            workouts_per_week: row.get(14)?,
            custom_calorie_goal: row.get(15)?,
            custom_protein_goal: row.get(16)?,
            custom_carbs_goal: row.get(17)?,
            custom_fat_goal: row.get(18)?,
            push_token: row.get(19)?,
            created_at: row.get(20)?,
            updated_at: row.get(21)?,
        })
    }

    fn daily_log_from_row(row: &rusqlite::Row) -> rusqlite::Result<DailyLog> {
        let meals_json: String = row.get(8)?;
        let meals: Vec<MealItem> = serde_json::from_str(&meals_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(DailyLog {
            id: row.get(0)?,
            user_id: row.get(1)?,
            date: row.get(2)?,
            calories: row.get(3)?,
            protein: row.get(4)?,
            carbs: row.get(5)?,
            fat: row.get(6)?,
            water: row.get(7)?,
            meals,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn weight_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<WeightEntry> {
        Ok(WeightEntry {
            id: row.get(0)?,
            user_id: row.get(1)?,
            date: row.get(2)?,
            weight: row.get(3)?,
            notes: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn nutrient_from_row(row: &rusqlite::Row) -> rusqlite::Result<Nutrient> {
        Ok(Nutrient {
            id: row.get(0)?,
            name: row.get(1)?,
            calories_per_g: row.get(2)?,
            protein_per_g: row.get(3)?,
            carbs_per_g: row.get(4)?,
            fat_per_g: row.get(5)?,
        })
    }

    // --- Users ---

    pub fn insert_user(&self, user: &NewUser) -> Result<User> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO users (email, password_hash, gender, feet, inches, weight,
                birth_year, birth_month, birth_day, diet_type, goal, target_weight,
                weight_speed, workouts_per_week, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
            params![
                user.email,
                user.password_hash,
                user.gender,
                user.feet,
                user.inches,
                user.weight,
                user.birth_year,
                user.birth_month,
                user.birth_day,
                user.diet_type,
                user.goal,
                user.target_weight,
                user.weight_speed,
                user.workouts_per_week,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_user_by_id(id)
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<User> {
        self.conn
            .query_row(
                "SELECT * FROM users WHERE id = ?1",
                params![id],
                Self::user_from_row,
            )
            .context("User not found")
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut stmt = self.conn.prepare("SELECT * FROM users WHERE email = ?1")?;
        let mut rows = stmt.query(params![email])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::user_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    fn touch_user(&self, id: i64) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "UPDATE users SET updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        Ok(())
    }

    pub fn set_height(&self, id: i64, feet: i64, inches: i64) -> Result<User> {
        self.conn.execute(
            "UPDATE users SET feet = ?1, inches = ?2 WHERE id = ?3",
            params![feet, inches, id],
        )?;
        self.touch_user(id)?;
        self.get_user_by_id(id)
    }

    pub fn set_dob(&self, id: i64, year: i32, month: u32, day: u32) -> Result<User> {
        self.conn.execute(
            "UPDATE users SET birth_year = ?1, birth_month = ?2, birth_day = ?3 WHERE id = ?4",
            params![year, month, day, id],
        )?;
        self.touch_user(id)?;
        self.get_user_by_id(id)
    }

    pub fn set_gender(&self, id: i64, gender: &str) -> Result<User> {
        self.conn.execute(
            "UPDATE users SET gender = ?1 WHERE id = ?2",
            params![gender, id],
        )?;
        self.touch_user(id)?;
        self.get_user_by_id(id)
    }

    pub fn set_push_token(&self, id: i64, token: &str) -> Result<User> {
        self.conn.execute(
            "UPDATE users SET push_token = ?1 WHERE id = ?2",
            params![token, id],
        )?;
        self.touch_user(id)?;
        self.get_user_by_id(id)
    }

    pub fn update_weight(&self, id: i64, weight: f64) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET weight = ?1 WHERE id = ?2",
            params![weight, id],
        )?;
        self.touch_user(id)
    }

    pub fn update_target_weight(&self, id: i64, target: f64) -> Result<User> {
        self.conn.execute(
            "UPDATE users SET target_weight = ?1 WHERE id = ?2",
            params![target, id],
        )?;
        self.touch_user(id)?;
        self.get_user_by_id(id)
    }

    /// Store goal overrides. Fields that are absent or non-positive leave the
    /// existing override untouched.
    pub fn set_custom_goals(&self, id: i64, goals: &GoalOverrides) -> Result<User> {
        let updates = [
            ("custom_calorie_goal", goals.daily_calorie_goal),
            ("custom_protein_goal", goals.protein_goal),
            ("custom_carbs_goal", goals.carbs_goal),
            ("custom_fat_goal", goals.fat_goal),
        ];
        for (column, value) in updates {
            if let Some(v) = value.filter(|v| *v > 0) {
                self.conn.execute(
                    &format!("UPDATE users SET {column} = ?1 WHERE id = ?2"),
                    params![v, id],
                )?;
            }
        }
        self.touch_user(id)?;
        self.get_user_by_id(id)
    }

    pub fn users_with_push_tokens(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM users WHERE push_token IS NOT NULL AND push_token != ''")?;
        let users = stmt
            .query_map([], Self::user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    // --- Daily logs ---

    /// Add a delta onto the log for `date`, creating the row if missing.
    ///
    /// The unique (user_id, date) index plus the ON CONFLICT increment keep
    /// concurrent submissions from splitting one day across two rows.
    pub fn upsert_daily_log(
        &self,
        user_id: i64,
        date: &str,
        delta: &DailyLogDelta,
    ) -> Result<DailyLog> {
        let mut meals = match self.get_daily_log(user_id, date)? {
            Some(existing) => existing.meals,
            None => Vec::new(),
        };
        meals.extend(delta.meals.iter().cloned());
        let meals_json = serde_json::to_string(&meals)?;

        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO daily_logs (user_id, date, calories, protein, carbs, fat, water, meals, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
             ON CONFLICT(user_id, date) DO UPDATE SET
                calories = daily_logs.calories + excluded.calories,
                protein = daily_logs.protein + excluded.protein,
                carbs = daily_logs.carbs + excluded.carbs,
                fat = daily_logs.fat + excluded.fat,
                water = daily_logs.water + excluded.water,
                meals = excluded.meals,
                updated_at = excluded.updated_at",
            params![
                user_id,
                date,
                delta.calories,
                delta.protein,
                delta.carbs,
                delta.fat,
                delta.water,
                meals_json,
                now,
            ],
        )?;
        self.get_daily_log(user_id, date)?
            .context("Daily log not found after upsert")
    }

    pub fn get_daily_log(&self, user_id: i64, date: &str) -> Result<Option<DailyLog>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM daily_logs WHERE user_id = ?1 AND date = ?2")?;
        let mut rows = stmt.query(params![user_id, date])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::daily_log_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn list_daily_logs(&self, user_id: i64) -> Result<Vec<DailyLog>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM daily_logs WHERE user_id = ?1 ORDER BY date DESC")?;
        let logs = stmt
            .query_map(params![user_id], Self::daily_log_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    /// Logs with `start <= date <= end`, ascending.
    pub fn get_logs_between(&self, user_id: i64, start: &str, end: &str) -> Result<Vec<DailyLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM daily_logs
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date ASC",
        )?;
        let logs = stmt
            .query_map(params![user_id, start, end], Self::daily_log_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    // --- Weight entries ---

    pub fn insert_weight_entry(
        &self,
        user_id: i64,
        weight: f64,
        notes: Option<&str>,
    ) -> Result<WeightEntry> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO weight_entries (user_id, date, weight, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?2)",
            params![user_id, now, weight, notes],
        )?;
        let id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                "SELECT * FROM weight_entries WHERE id = ?1",
                params![id],
                Self::weight_entry_from_row,
            )
            .context("Weight entry not found")
    }

    /// Entries on or after `since` (RFC 3339 or plain date prefix), ascending.
    pub fn weight_entries_since(&self, user_id: i64, since: &str) -> Result<Vec<WeightEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM weight_entries
             WHERE user_id = ?1 AND date >= ?2
             ORDER BY date ASC",
        )?;
        let entries = stmt
            .query_map(params![user_id, since], Self::weight_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn latest_weight_entry(&self, user_id: i64) -> Result<Option<WeightEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM weight_entries WHERE user_id = ?1 ORDER BY date DESC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![user_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::weight_entry_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    // --- Nutrients ---

    pub fn insert_nutrient(&self, nutrient: &NewNutrient) -> Result<Nutrient> {
        self.conn.execute(
            "INSERT INTO nutrients (name, calories_per_g, protein_per_g, carbs_per_g, fat_per_g)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                nutrient.name,
                nutrient.calories_per_g,
                nutrient.protein_per_g,
                nutrient.carbs_per_g,
                nutrient.fat_per_g,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                "SELECT * FROM nutrients WHERE id = ?1",
                params![id],
                Self::nutrient_from_row,
            )
            .context("Nutrient not found")
    }

    /// Exact name match first, then a case-insensitive partial match.
    pub fn find_nutrient(&self, name: &str) -> Result<Option<Nutrient>> {
        let mut stmt = self.conn.prepare("SELECT * FROM nutrients WHERE name = ?1")?;
        let mut rows = stmt.query(params![name])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(Self::nutrient_from_row(row)?));
        }

        let escaped = name
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{escaped}%");
        let mut stmt = self.conn.prepare(
            "SELECT * FROM nutrients WHERE name LIKE ?1 ESCAPE '\\' ORDER BY name LIMIT 1",
        )?;
        let mut rows = stmt.query(params![pattern])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::nutrient_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn list_nutrients(&self) -> Result<Vec<Nutrient>> {
        let mut stmt = self.conn.prepare("SELECT * FROM nutrients ORDER BY name")?;
        let nutrients = stmt
            .query_map([], Self::nutrient_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(nutrients)
    }
}
