//! Derived-metric formulas over a user's stored attributes.
//!
//! Everything here is a pure function of a [`User`] row plus the current
//! date. Any missing required input yields `None`, never a default guess.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::User;

pub const LB_TO_KG: f64 = 0.453_592;
const IN_TO_M: f64 = 0.0254;
const IN_TO_CM: f64 = 2.54;

/// Resolved nutrition goals: the stored override when present and positive,
/// otherwise the computed value.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Goals {
    pub daily_calorie_goal: Option<i64>,
    pub protein_goal: Option<i64>,
    pub carbs_goal: Option<i64>,
    pub fat_goal: Option<i64>,
}

/// Age in whole years on `today`. Birth month/day default to January 1st.
pub fn age_on(user: &User, today: NaiveDate) -> Option<i64> {
    let year = user.birth_year?;
    let month = user.birth_month.unwrap_or(1);
    let day = user.birth_day.unwrap_or(1);
    let mut age = i64::from(today.year()) - i64::from(year);
    if (today.month(), today.day()) < (month, day) {
        age -= 1;
    }
    Some(age)
}

#[allow(clippy::cast_precision_loss)]
fn height_inches(user: &User) -> Option<f64> {
    let feet = user.feet?;
    let inches = user.inches?;
    Some((feet * 12 + inches) as f64)
}

/// Body mass index, kg/m², one decimal place.
pub fn bmi(user: &User) -> Option<f64> {
    let weight = user.weight?;
    let meters = height_inches(user)? * IN_TO_M;
    if meters <= 0.0 {
        return None;
    }
    let kg = weight * LB_TO_KG;
    Some((kg / (meters * meters) * 10.0).round() / 10.0)
}

/// Basal metabolic rate per the Harris-Benedict equation, rounded.
///
/// The age term is calendar-year difference, not birthday-adjusted age.
pub fn bmr(user: &User, today: NaiveDate) -> Option<i64> {
    let weight = user.weight?;
    let gender = user.gender.as_deref()?;
    let year = user.birth_year?;
    let cm = height_inches(user)? * IN_TO_CM;
    let kg = weight * LB_TO_KG;
    let age = f64::from(today.year() - year);
    let bmr = if gender == "Male" {
        88.362 + 13.397 * kg + 4.799 * cm - 5.677 * age
    } else {
        447.593 + 9.247 * kg + 3.098 * cm - 4.330 * age
    };
    Some(bmr.round() as i64)
}

/// TDEE (BMR × activity multiplier) shifted by the goal-speed offset.
#[allow(clippy::cast_precision_loss)]
pub fn daily_calorie_goal(user: &User, today: NaiveDate) -> Option<i64> {
    let bmr = bmr(user, today)? as f64;
    let goal = user.goal.as_deref()?;
    let workouts = user.workouts_per_week.as_deref()?;

    let multiplier = match workouts {
        "1-2" => 1.375,
        "3-5" => 1.55,
        "6-7" => 1.725,
        _ => 1.2, // sedentary
    };
    let tdee = bmr * multiplier;

    // Missing or unrecognized speed falls through to the largest offset.
    let offset = match user.weight_speed.as_deref() {
        Some("slow") => 250.0,
        Some("moderate") => 500.0,
        _ => 750.0,
    };

    let adjusted = match goal {
        "lose" => tdee - offset,
        "gain" => tdee + offset,
        _ => tdee,
    };
    Some(adjusted.round() as i64)
}

/// Grams of protein per day: 1.0 g/lb gaining, 1.2 losing, 0.8 maintaining.
pub fn protein_goal(user: &User) -> Option<i64> {
    let weight = user.weight?;
    let factor = match user.goal.as_deref()? {
        "gain" => 1.0,
        "lose" => 1.2,
        _ => 0.8,
    };
    Some((weight * factor).round() as i64)
}

/// Grams of carbs per day: calories left after protein and a fixed 25% fat
/// allocation, divided by 4 kcal/g. Requires a diet type to be set.
#[allow(clippy::cast_precision_loss)]
pub fn carbs_goal(user: &User, today: NaiveDate) -> Option<i64> {
    let calorie_goal = daily_calorie_goal(user, today)? as f64;
    let protein = protein_goal(user)? as f64;
    user.diet_type.as_deref()?;

    let remaining = calorie_goal - protein * 4.0 - calorie_goal * 0.25;
    Some((remaining / 4.0).round() as i64)
}

/// Grams of fat per day: 25% of the calorie goal at 9 kcal/g.
#[allow(clippy::cast_precision_loss)]
pub fn fat_goal(user: &User, today: NaiveDate) -> Option<i64> {
    let goal = daily_calorie_goal(user, today)?;
    Some((goal as f64 * 0.25 / 9.0).round() as i64)
}

fn override_or(custom: Option<i64>, computed: Option<i64>) -> Option<i64> {
    match custom {
        Some(v) if v > 0 => Some(v),
        _ => computed,
    }
}

/// Resolve all four goals, letting positive stored overrides win.
pub fn resolve_goals(user: &User, today: NaiveDate) -> Goals {
    Goals {
        daily_calorie_goal: override_or(user.custom_calorie_goal, daily_calorie_goal(user, today)),
        protein_goal: override_or(user.custom_protein_goal, protein_goal(user)),
        carbs_goal: override_or(user.custom_carbs_goal, carbs_goal(user, today)),
        fat_goal: override_or(user.custom_fat_goal, fat_goal(user, today)),
    }
}
