use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;

use crate::db::Database;
use crate::metrics::{self, Goals};
use crate::models::{
    DailyLog, DailyLogDelta, GoalOverrides, NewNutrient, NewUser, Nutrient, NutritionInfo, User,
    WeightEntry,
};
use crate::progress::{self, ProgressPeriod, WeightProgress};
use crate::stats::{self, NutritionStats, StatsPeriod};

pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).context("Failed to hash password")
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(password, hash).context("Failed to verify password")
}

/// Application facade over the database plus the pure metric, stats and
/// progress layers. One instance per process, shared behind a mutex.
pub struct IntakeService {
    db: Database,
}

impl IntakeService {
    pub fn new(db_path: &Path) -> Result<Self> {
        Ok(IntakeService {
            db: Database::open(db_path)?,
        })
    }

    pub fn new_in_memory() -> Result<Self> {
        Ok(IntakeService {
            db: Database::open_in_memory()?,
        })
    }

    // --- Accounts ---

    pub fn create_user(&self, user: &NewUser) -> Result<User> {
        self.db.insert_user(user)
    }

    pub fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.db.get_user_by_email(email)
    }

    pub fn user_by_id(&self, id: i64) -> Result<User> {
        self.db.get_user_by_id(id)
    }

    /// Check credentials. `None` covers both an unknown email and a wrong
    /// password so the response can't be used to probe for accounts.
    pub fn verify_login(&self, email: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.db.get_user_by_email(email)? else {
            return Ok(None);
        };
        if verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    pub fn set_height(&self, user_id: i64, feet: i64, inches: i64) -> Result<User> {
        self.db.set_height(user_id, feet, inches)
    }

    pub fn set_dob(&self, user_id: i64, year: i32, month: u32, day: u32) -> Result<User> {
        self.db.set_dob(user_id, year, month, day)
    }

    pub fn set_gender(&self, user_id: i64, gender: &str) -> Result<User> {
        self.db.set_gender(user_id, gender)
    }

    pub fn set_push_token(&self, user_id: i64, token: &str) -> Result<User> {
        self.db.set_push_token(user_id, token)
    }

    pub fn set_custom_goals(&self, user_id: i64, goals: &GoalOverrides) -> Result<User> {
        self.db.set_custom_goals(user_id, goals)
    }

    pub fn update_target_weight(&self, user_id: i64, target: f64) -> Result<User> {
        self.db.update_target_weight(user_id, target)
    }

    /// Resolved goals for a user, overrides winning where set and positive.
    pub fn resolved_goals(&self, user_id: i64) -> Result<Goals> {
        let user = self.db.get_user_by_id(user_id)?;
        Ok(metrics::resolve_goals(&user, Local::now().date_naive()))
    }

    pub fn users_with_push_tokens(&self) -> Result<Vec<User>> {
        self.db.users_with_push_tokens()
    }

    // --- Daily logs ---

    /// Fold a submission into today's log, summing macros and appending
    /// meals.
    pub fn upsert_today_log(&self, user_id: i64, delta: &DailyLogDelta) -> Result<DailyLog> {
        let today = Local::now().format("%Y-%m-%d").to_string();
        self.db.upsert_daily_log(user_id, &today, delta)
    }

    pub fn daily_log(&self, user_id: i64, date: &str) -> Result<Option<DailyLog>> {
        self.db.get_daily_log(user_id, date)
    }

    pub fn list_daily_logs(&self, user_id: i64) -> Result<Vec<DailyLog>> {
        self.db.list_daily_logs(user_id)
    }

    pub fn nutrition_stats(&self, user_id: i64, period: StatsPeriod) -> Result<NutritionStats> {
        let today = Local::now().date_naive();
        let window = stats::windows(period, today);
        let fmt = |d: chrono::NaiveDate| d.format("%Y-%m-%d").to_string();
        let current =
            self.db
                .get_logs_between(user_id, &fmt(window.start), &fmt(window.end))?;
        let previous =
            self.db
                .get_logs_between(user_id, &fmt(window.prev_start), &fmt(window.prev_end))?;
        Ok(stats::build_nutrition_stats(
            period, &window, &current, &previous,
        ))
    }

    // --- Weight ---

    /// Record a weight measurement and sync it onto the user row.
    pub fn log_weight(
        &self,
        user_id: i64,
        weight: f64,
        notes: Option<&str>,
    ) -> Result<WeightEntry> {
        let entry = self.db.insert_weight_entry(user_id, weight, notes)?;
        self.db.update_weight(user_id, weight)?;
        Ok(entry)
    }

    pub fn latest_weight_entry(&self, user_id: i64) -> Result<Option<WeightEntry>> {
        self.db.latest_weight_entry(user_id)
    }

    pub fn weight_progress(&self, user_id: i64, period: ProgressPeriod) -> Result<WeightProgress> {
        let user = self.db.get_user_by_id(user_id)?;
        let start = period.start(Local::now().date_naive());
        let since = start.format("%Y-%m-%d").to_string();
        let entries = self.db.weight_entries_since(user_id, &since)?;
        Ok(progress::build_weight_progress(
            period,
            &entries,
            user.weight,
            user.target_weight,
            user.goal.as_deref(),
        ))
    }

    // --- Nutrients ---

    pub fn add_nutrient(&self, nutrient: &NewNutrient) -> Result<Nutrient> {
        self.db.insert_nutrient(nutrient)
    }

    pub fn list_nutrients(&self) -> Result<Vec<Nutrient>> {
        self.db.list_nutrients()
    }

    /// Macros for `quantity_g` grams of a reference food, rounded to whole
    /// units. Exact name match first, then a case-insensitive partial match.
    pub fn custom_nutrition(&self, name: &str, quantity_g: f64) -> Result<Option<NutritionInfo>> {
        let Some(nutrient) = self.db.find_nutrient(name)? else {
            return Ok(None);
        };
        Ok(Some(NutritionInfo {
            calories: (nutrient.calories_per_g * quantity_g).round() as i64,
            protein: (nutrient.protein_per_g * quantity_g).round() as i64,
            carbohydrates: (nutrient.carbs_per_g * quantity_g).round() as i64,
            fat: (nutrient.fat_per_g * quantity_g).round() as i64,
        }))
    }
}
