use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const MEAL_TYPES: &[&str] = &["breakfast", "lunch", "dinner", "snack"];
pub const GENDERS: &[&str] = &["Male", "Female", "Other"];
pub const GOALS: &[&str] = &["gain", "lose", "maintain"];
pub const WEIGHT_SPEEDS: &[&str] = &["slow", "moderate", "fast"];
pub const WORKOUT_BUCKETS: &[&str] = &["0", "1-2", "3-5", "6-7"];

/// A stored account. Weight fields are pounds, height is feet plus inches.
///
/// Derived values (age, BMI, BMR, nutrition goals) are never stored — see
/// `metrics` — so reads always reflect the current attributes.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub gender: Option<String>,
    pub feet: Option<i64>,
    pub inches: Option<i64>,
    pub weight: Option<f64>,
    pub birth_year: Option<i32>,
    pub birth_month: Option<u32>,
    pub birth_day: Option<u32>,
    pub diet_type: Option<String>,
    pub goal: Option<String>,
    pub target_weight: Option<f64>,
    pub weight_speed: Option<String>,
    pub workouts_per_week: Option<String>,
    pub custom_calorie_goal: Option<i64>,
    pub custom_protein_goal: Option<i64>,
    pub custom_carbs_goal: Option<i64>,
    pub custom_fat_goal: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub gender: Option<String>,
    pub feet: Option<i64>,
    pub inches: Option<i64>,
    pub weight: Option<f64>,
    pub birth_year: Option<i32>,
    pub birth_month: Option<u32>,
    pub birth_day: Option<u32>,
    pub diet_type: Option<String>,
    pub goal: Option<String>,
    pub target_weight: Option<f64>,
    pub weight_speed: Option<String>,
    pub workouts_per_week: Option<String>,
}

/// One meal inside a daily log. Stored as part of the log's JSON meal list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealItem {
    #[serde(rename = "type")]
    pub meal_type: String,
    pub name: Option<String>,
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub fat: f64,
}

/// One calendar day of nutrition totals for one user.
#[derive(Debug, Clone, Serialize)]
pub struct DailyLog {
    pub id: i64,
    pub user_id: i64,
    pub date: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub water: f64,
    pub meals: Vec<MealItem>,
    pub created_at: String,
    pub updated_at: String,
}

/// Partial goal override update. Only fields that arrive with a positive
/// value are stored; the rest keep their current override.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct GoalOverrides {
    pub daily_calorie_goal: Option<i64>,
    pub protein_goal: Option<i64>,
    pub carbs_goal: Option<i64>,
    pub fat_goal: Option<i64>,
}

/// Additive update applied to today's log. Missing fields count as zero.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DailyLogDelta {
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub fat: f64,
    #[serde(default)]
    pub water: f64,
    #[serde(default)]
    pub meals: Vec<MealItem>,
}

/// Append-only weight measurement, pounds, RFC 3339 timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct WeightEntry {
    pub id: i64,
    pub user_id: i64,
    pub date: String,
    pub weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: String,
}

/// Reference food with per-gram macro values.
#[derive(Debug, Clone, Serialize)]
pub struct Nutrient {
    pub id: i64,
    pub name: String,
    pub calories_per_g: f64,
    pub protein_per_g: f64,
    pub carbs_per_g: f64,
    pub fat_per_g: f64,
}

#[derive(Debug, Clone)]
pub struct NewNutrient {
    pub name: String,
    pub calories_per_g: f64,
    pub protein_per_g: f64,
    pub carbs_per_g: f64,
    pub fat_per_g: f64,
}

/// Nutrition facts for a requested quantity of a reference food.
#[derive(Debug, Clone, Serialize)]
pub struct NutritionInfo {
    pub calories: i64,
    pub protein: i64,
    pub carbohydrates: i64,
    pub fat: i64,
}

pub fn validate_meal_type(meal: &str) -> Result<String> {
    let lower = meal.to_lowercase();
    if MEAL_TYPES.contains(&lower.as_str()) {
        Ok(lower)
    } else {
        anyhow::bail!(
            "Invalid meal type '{meal}'. Must be one of: {}",
            MEAL_TYPES.join(", ")
        )
    }
}

pub fn validate_gender(gender: &str) -> Result<()> {
    if GENDERS.contains(&gender) {
        Ok(())
    } else {
        anyhow::bail!(
            "Invalid gender '{gender}'. Must be one of: {}",
            GENDERS.join(", ")
        )
    }
}

pub fn validate_goal(goal: &str) -> Result<()> {
    if GOALS.contains(&goal) {
        Ok(())
    } else {
        anyhow::bail!("Invalid goal '{goal}'. Must be one of: {}", GOALS.join(", "))
    }
}

/// Validate a date-of-birth triple. Day bounds are calendar-loose (1-31);
/// the metrics layer works off year/month/day ordering only.
pub fn validate_dob(year: i32, month: u32, day: u32) -> Result<()> {
    if !(1900..=2100).contains(&year) {
        anyhow::bail!("Invalid birth year {year}");
    }
    if !(1..=12).contains(&month) {
        anyhow::bail!("Invalid birth month {month}");
    }
    if !(1..=31).contains(&day) {
        anyhow::bail!("Invalid birth day {day}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_meal_types() {
        assert_eq!(validate_meal_type("breakfast").unwrap(), "breakfast");
        assert_eq!(validate_meal_type("lunch").unwrap(), "lunch");
        assert_eq!(validate_meal_type("dinner").unwrap(), "dinner");
        assert_eq!(validate_meal_type("snack").unwrap(), "snack");
    }

    #[test]
    fn test_invalid_meal_type() {
        assert!(validate_meal_type("brunch").is_err());
        assert!(validate_meal_type("").is_err());
    }

    #[test]
    fn test_meal_type_case_insensitive() {
        assert_eq!(validate_meal_type("Lunch").unwrap(), "lunch");
        assert_eq!(validate_meal_type("BREAKFAST").unwrap(), "breakfast");
    }

    #[test]
    fn test_validate_gender() {
        assert!(validate_gender("Male").is_ok());
        assert!(validate_gender("Female").is_ok());
        assert!(validate_gender("Other").is_ok());
        assert!(validate_gender("male").is_err());
        assert!(validate_gender("").is_err());
    }

    #[test]
    fn test_validate_goal() {
        assert!(validate_goal("gain").is_ok());
        assert!(validate_goal("lose").is_ok());
        assert!(validate_goal("maintain").is_ok());
        assert!(validate_goal("bulk").is_err());
    }

    #[test]
    fn test_validate_dob_bounds() {
        assert!(validate_dob(1990, 6, 15).is_ok());
        assert!(validate_dob(1899, 6, 15).is_err());
        assert!(validate_dob(1990, 13, 15).is_err());
        assert!(validate_dob(1990, 0, 15).is_err());
        assert!(validate_dob(1990, 6, 32).is_err());
    }

    #[test]
    fn test_meal_item_type_field_name() {
        let meal: MealItem = serde_json::from_str(
            r#"{"type": "lunch", "name": "Oats", "calories": 300, "protein": 10}"#,
        )
        .unwrap();
        assert_eq!(meal.meal_type, "lunch");
        assert_eq!(meal.name.as_deref(), Some("Oats"));
        assert!((meal.calories - 300.0).abs() < f64::EPSILON);
        // Omitted macros default to zero
        assert!((meal.carbs - 0.0).abs() < f64::EPSILON);

        let json = serde_json::to_value(&meal).unwrap();
        assert_eq!(json["type"], "lunch");
    }

    #[test]
    fn test_daily_log_delta_defaults() {
        let delta: DailyLogDelta = serde_json::from_str(r#"{"calories": 500}"#).unwrap();
        assert!((delta.calories - 500.0).abs() < f64::EPSILON);
        assert!((delta.water - 0.0).abs() < f64::EPSILON);
        assert!(delta.meals.is_empty());
    }

    #[test]
    fn test_user_serialization_hides_password_hash() {
        let user = User {
            id: 1,
            email: "a@b.com".to_string(),
            password_hash: "$2b$12$secret".to_string(),
            gender: None,
            feet: None,
            inches: None,
            weight: None,
            birth_year: None,
            birth_month: None,
            birth_day: None,
            diet_type: None,
            goal: None,
            target_weight: None,
            weight_speed: None,
            workouts_per_week: None,
            custom_calorie_goal: None,
            custom_protein_goal: None,
            custom_carbs_goal: None,
            custom_fat_goal: None,
            push_token: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("secret"));
    }
}
