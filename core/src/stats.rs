//! Period-over-period nutrition statistics.
//!
//! Pure aggregation over daily logs already fetched for the two windows;
//! the service layer owns the queries.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{DailyLog, MEAL_TYPES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsPeriod {
    Week,
    TwoWeeks,
    ThreeWeeks,
}

impl StatsPeriod {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "week" => Some(Self::Week),
            "twoWeeks" => Some(Self::TwoWeeks),
            "threeWeeks" => Some(Self::ThreeWeeks),
            _ => None,
        }
    }

    #[must_use]
    pub fn days(self) -> u64 {
        match self {
            Self::Week => 7,
            Self::TwoWeeks => 14,
            Self::ThreeWeeks => 21,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::TwoWeeks => "twoWeeks",
            Self::ThreeWeeks => "threeWeeks",
        }
    }
}

/// Current window runs `[start, end]` inclusive; the previous window is the
/// equally long stretch immediately before it, `[prev_start, prev_end]`.
#[derive(Debug, Clone, Copy)]
pub struct StatsWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub prev_start: NaiveDate,
    pub prev_end: NaiveDate,
}

#[must_use]
pub fn windows(period: StatsPeriod, today: NaiveDate) -> StatsWindow {
    let days = chrono::Days::new(period.days());
    let start = today - days;
    StatsWindow {
        start,
        end: today,
        prev_start: start - days,
        prev_end: start - chrono::Days::new(1),
    }
}

/// Percent change from `previous` to `current`, one decimal place.
/// Defined as 0 whenever the baseline is not positive.
#[must_use]
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous > 0.0 {
        round1((current - previous) / previous * 100.0)
    } else {
        0.0
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MacroTotals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub water: f64,
}

impl MacroTotals {
    fn add(&mut self, log: &DailyLog) {
        self.calories += log.calories;
        self.protein += log.protein;
        self.carbs += log.carbs;
        self.fat += log.fat;
        self.water += log.water;
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MacroChanges {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub water: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MealTypeTotals {
    pub count: i64,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MealTypeBreakdown {
    pub breakfast: MealTypeTotals,
    pub lunch: MealTypeTotals,
    pub dinner: MealTypeTotals,
    pub snack: MealTypeTotals,
}

impl MealTypeBreakdown {
    fn get_mut(&mut self, meal_type: &str) -> Option<&mut MealTypeTotals> {
        match meal_type {
            "breakfast" => Some(&mut self.breakfast),
            "lunch" => Some(&mut self.lunch),
            "dinner" => Some(&mut self.dinner),
            "snack" => Some(&mut self.snack),
            _ => None,
        }
    }

    fn get(&self, meal_type: &str) -> Option<MealTypeTotals> {
        match meal_type {
            "breakfast" => Some(self.breakfast),
            "lunch" => Some(self.lunch),
            "dinner" => Some(self.dinner),
            "snack" => Some(self.snack),
            _ => None,
        }
    }

    fn absorb(&mut self, log: &DailyLog) {
        for meal in &log.meals {
            if let Some(totals) = self.get_mut(&meal.meal_type) {
                totals.count += 1;
                totals.calories += meal.calories;
                totals.protein += meal.protein;
                totals.carbs += meal.carbs;
                totals.fat += meal.fat;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MealTypeChange {
    pub count_change: f64,
    pub calories_change: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MealTypeChanges {
    pub breakfast: MealTypeChange,
    pub lunch: MealTypeChange,
    pub dinner: MealTypeChange,
    pub snack: MealTypeChange,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopMeal {
    pub name: String,
    pub count: i64,
}

/// Chart-ready label/value series.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesChart {
    pub labels: Vec<String>,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NutritionStats {
    pub period: String,
    pub daily_calories: SeriesChart,
    pub meal_distribution: SeriesChart,
    pub totals: MacroTotals,
    pub previous_totals: MacroTotals,
    pub average_calories: f64,
    pub changes: MacroChanges,
    pub meal_types: MealTypeBreakdown,
    pub meal_type_changes: MealTypeChanges,
    pub top_meals: Vec<TopMeal>,
}

#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn build_nutrition_stats(
    period: StatsPeriod,
    window: &StatsWindow,
    current: &[DailyLog],
    previous: &[DailyLog],
) -> NutritionStats {
    let mut totals = MacroTotals::default();
    let mut meal_types = MealTypeBreakdown::default();
    // name -> (count, first-seen order), so ranking ties stay stable
    let mut frequency: HashMap<String, (i64, usize)> = HashMap::new();
    let mut next_seen = 0usize;
    let mut calories_by_date: HashMap<&str, f64> = HashMap::new();

    for log in current {
        calories_by_date.insert(log.date.as_str(), log.calories);
        totals.add(log);
        meal_types.absorb(log);
        for meal in &log.meals {
            if let Some(name) = &meal.name {
                let entry = frequency.entry(name.clone()).or_insert_with(|| {
                    let seen = next_seen;
                    next_seen += 1;
                    (0, seen)
                });
                entry.0 += 1;
            }
        }
    }

    let mut prev_totals = MacroTotals::default();
    let mut prev_meal_types = MealTypeBreakdown::default();
    for log in previous {
        prev_totals.add(log);
        prev_meal_types.absorb(log);
    }

    // Zero-filled per-day calorie series over the full current window.
    let mut labels = Vec::new();
    let mut data = Vec::new();
    let mut day = window.start;
    while day <= window.end {
        let key = day.format("%Y-%m-%d").to_string();
        data.push(calories_by_date.get(key.as_str()).copied().unwrap_or(0.0));
        labels.push(key);
        let Some(next) = day.succ_opt() else { break };
        day = next;
    }

    let distribution_data = MEAL_TYPES
        .iter()
        .map(|t| meal_types.get(t).unwrap_or_default().calories)
        .collect();

    let changes = MacroChanges {
        calories: percent_change(totals.calories, prev_totals.calories),
        protein: percent_change(totals.protein, prev_totals.protein),
        carbs: percent_change(totals.carbs, prev_totals.carbs),
        fat: percent_change(totals.fat, prev_totals.fat),
        water: percent_change(totals.water, prev_totals.water),
    };

    let type_change = |meal_type: &str| {
        let cur = meal_types.get(meal_type).unwrap_or_default();
        let prev = prev_meal_types.get(meal_type).unwrap_or_default();
        MealTypeChange {
            count_change: percent_change(cur.count as f64, prev.count as f64),
            calories_change: percent_change(cur.calories, prev.calories),
        }
    };
    let meal_type_changes = MealTypeChanges {
        breakfast: type_change("breakfast"),
        lunch: type_change("lunch"),
        dinner: type_change("dinner"),
        snack: type_change("snack"),
    };

    let mut ranked: Vec<(String, i64, usize)> = frequency
        .into_iter()
        .map(|(name, (count, seen))| (name, count, seen))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    let top_meals = ranked
        .into_iter()
        .take(5)
        .map(|(name, count, _)| TopMeal { name, count })
        .collect();

    // Average over days actually logged, never the window length.
    let logged_days = current.len().max(1);
    let average_calories = round1(totals.calories / logged_days as f64);

    NutritionStats {
        period: period.as_str().to_string(),
        daily_calories: SeriesChart { labels, data },
        meal_distribution: SeriesChart {
            labels: MEAL_TYPES.iter().map(ToString::to_string).collect(),
            data: distribution_data,
        },
        totals,
        previous_totals: prev_totals,
        average_calories,
        changes,
        meal_types,
        meal_type_changes,
        top_meals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MealItem;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn meal(meal_type: &str, name: &str, calories: f64) -> MealItem {
        MealItem {
            meal_type: meal_type.to_string(),
            name: Some(name.to_string()),
            calories,
            protein: 0.0,
            carbs: 0.0,
            fat: 0.0,
        }
    }

    fn log(day: &str, calories: f64, meals: Vec<MealItem>) -> DailyLog {
        DailyLog {
            id: 0,
            user_id: 1,
            date: day.to_string(),
            calories,
            protein: 10.0,
            carbs: 20.0,
            fat: 5.0,
            water: 1.0,
            meals,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_period_parse() {
        assert_eq!(StatsPeriod::parse("week"), Some(StatsPeriod::Week));
        assert_eq!(StatsPeriod::parse("twoWeeks"), Some(StatsPeriod::TwoWeeks));
        assert_eq!(
            StatsPeriod::parse("threeWeeks"),
            Some(StatsPeriod::ThreeWeeks)
        );
        assert_eq!(StatsPeriod::parse("month"), None);
    }

    #[test]
    fn test_windows_for_week() {
        let w = windows(StatsPeriod::Week, date("2026-06-15"));
        assert_eq!(w.start, date("2026-06-08"));
        assert_eq!(w.end, date("2026-06-15"));
        assert_eq!(w.prev_start, date("2026-06-01"));
        assert_eq!(w.prev_end, date("2026-06-07"));
    }

    #[test]
    fn test_percent_change_zero_baseline() {
        assert!((percent_change(100.0, 0.0) - 0.0).abs() < f64::EPSILON);
        assert!((percent_change(0.0, 0.0) - 0.0).abs() < f64::EPSILON);
        assert!((percent_change(100.0, -5.0) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_percent_change_rounding() {
        assert!((percent_change(150.0, 100.0) - 50.0).abs() < f64::EPSILON);
        assert!((percent_change(100.0, 300.0) - (-66.7)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_series_is_zero_filled_over_full_window() {
        let w = windows(StatsPeriod::Week, date("2026-06-15"));
        let current = vec![log("2026-06-10", 1800.0, vec![])];
        let stats = build_nutrition_stats(StatsPeriod::Week, &w, &current, &[]);

        // Inclusive of both endpoints
        assert_eq!(stats.daily_calories.labels.len(), 8);
        assert_eq!(stats.daily_calories.labels[0], "2026-06-08");
        assert_eq!(stats.daily_calories.labels[7], "2026-06-15");
        assert!((stats.daily_calories.data[2] - 1800.0).abs() < f64::EPSILON);
        assert!((stats.daily_calories.data[0] - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_totals_and_changes() {
        let w = windows(StatsPeriod::Week, date("2026-06-15"));
        let current = vec![
            log("2026-06-10", 1800.0, vec![]),
            log("2026-06-11", 2200.0, vec![]),
        ];
        let previous = vec![log("2026-06-03", 2000.0, vec![])];
        let stats = build_nutrition_stats(StatsPeriod::Week, &w, &current, &previous);

        assert!((stats.totals.calories - 4000.0).abs() < f64::EPSILON);
        assert!((stats.previous_totals.calories - 2000.0).abs() < f64::EPSILON);
        assert!((stats.changes.calories - 100.0).abs() < f64::EPSILON);
        // two logged days
        assert!((stats.average_calories - 2000.0).abs() < f64::EPSILON);
        // previous water 1.0 -> current 2.0
        assert!((stats.changes.water - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_changes_zero_when_no_previous_window() {
        let w = windows(StatsPeriod::Week, date("2026-06-15"));
        let current = vec![log("2026-06-10", 1800.0, vec![])];
        let stats = build_nutrition_stats(StatsPeriod::Week, &w, &current, &[]);
        assert!((stats.changes.calories - 0.0).abs() < f64::EPSILON);
        assert!((stats.changes.protein - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_meal_type_breakdown() {
        let w = windows(StatsPeriod::Week, date("2026-06-15"));
        let current = vec![log(
            "2026-06-10",
            1000.0,
            vec![
                meal("breakfast", "Oats", 300.0),
                meal("breakfast", "Eggs", 200.0),
                meal("dinner", "Curry", 500.0),
            ],
        )];
        let stats = build_nutrition_stats(StatsPeriod::Week, &w, &current, &[]);

        assert_eq!(stats.meal_types.breakfast.count, 2);
        assert!((stats.meal_types.breakfast.calories - 500.0).abs() < f64::EPSILON);
        assert_eq!(stats.meal_types.dinner.count, 1);
        assert_eq!(stats.meal_types.lunch.count, 0);

        // distribution follows the breakfast/lunch/dinner/snack order
        assert_eq!(
            stats.meal_distribution.labels,
            vec!["breakfast", "lunch", "dinner", "snack"]
        );
        assert!((stats.meal_distribution.data[0] - 500.0).abs() < f64::EPSILON);
        assert!((stats.meal_distribution.data[2] - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unknown_meal_type_counts_name_only() {
        let w = windows(StatsPeriod::Week, date("2026-06-15"));
        let current = vec![log(
            "2026-06-10",
            400.0,
            vec![meal("brunch", "Pancakes", 400.0)],
        )];
        let stats = build_nutrition_stats(StatsPeriod::Week, &w, &current, &[]);

        assert_eq!(stats.meal_types.breakfast.count, 0);
        assert_eq!(stats.top_meals.len(), 1);
        assert_eq!(stats.top_meals[0].name, "Pancakes");
    }

    #[test]
    fn test_top_meals_ranking_and_tie_break() {
        let w = windows(StatsPeriod::Week, date("2026-06-15"));
        let current = vec![
            log(
                "2026-06-09",
                0.0,
                vec![
                    meal("lunch", "Rice", 100.0),
                    meal("lunch", "Beans", 100.0),
                    meal("dinner", "Rice", 100.0),
                ],
            ),
            log(
                "2026-06-10",
                0.0,
                vec![
                    meal("lunch", "Toast", 100.0),
                    meal("dinner", "Beans", 100.0),
                    meal("snack", "Apple", 100.0),
                    meal("snack", "Pear", 100.0),
                    meal("snack", "Plum", 100.0),
                ],
            ),
        ];
        let stats = build_nutrition_stats(StatsPeriod::Week, &w, &current, &[]);

        assert_eq!(stats.top_meals.len(), 5);
        // Rice and Beans both count 2; Rice was seen first
        assert_eq!(stats.top_meals[0].name, "Rice");
        assert_eq!(stats.top_meals[0].count, 2);
        assert_eq!(stats.top_meals[1].name, "Beans");
        // Singles keep first-encountered order
        assert_eq!(stats.top_meals[2].name, "Toast");
        assert_eq!(stats.top_meals[3].name, "Apple");
        assert_eq!(stats.top_meals[4].name, "Pear");
    }

    #[test]
    fn test_meal_type_changes_against_previous_window() {
        let w = windows(StatsPeriod::Week, date("2026-06-15"));
        let current = vec![log(
            "2026-06-10",
            600.0,
            vec![
                meal("lunch", "Rice", 300.0),
                meal("lunch", "Beans", 300.0),
            ],
        )];
        let previous = vec![log(
            "2026-06-03",
            200.0,
            vec![meal("lunch", "Rice", 200.0)],
        )];
        let stats = build_nutrition_stats(StatsPeriod::Week, &w, &current, &previous);

        assert!((stats.meal_type_changes.lunch.count_change - 100.0).abs() < f64::EPSILON);
        assert!((stats.meal_type_changes.lunch.calories_change - 200.0).abs() < f64::EPSILON);
        assert!((stats.meal_type_changes.dinner.count_change - 0.0).abs() < f64::EPSILON);
    }
}
