use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::{
    Extension, Json, Router,
    extract::{Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::limit::RequestBodyLimitLayer;

use crate::auth::{self, JwtKeys};
use intake_core::metrics::{self, Goals};
use intake_core::models::{
    DailyLogDelta, GoalOverrides, NewUser, User, validate_dob, validate_gender, validate_goal,
    validate_meal_type,
};
use intake_core::progress::ProgressPeriod;
use intake_core::service::{self, IntakeService};
use intake_core::stats::StatsPeriod;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
pub struct AppState {
    pub svc: Arc<Mutex<IntakeService>>,
    pub keys: Arc<JwtKeys>,
}

/// Identity extracted from a verified token by `require_auth`.
#[derive(Clone, Copy)]
struct AuthenticatedUser {
    id: i64,
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct SignupRequest {
    email: String,
    password: String,
    gender: Option<String>,
    feet: Option<i64>,
    inches: Option<i64>,
    weight: Option<f64>,
    birth_year: Option<i32>,
    birth_month: Option<u32>,
    birth_day: Option<u32>,
    diet_type: Option<String>,
    goal: Option<String>,
    target_weight: Option<f64>,
    weight_speed: Option<String>,
    workouts_per_week: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct FoodLogRequest {
    log: DailyLogDelta,
}

#[derive(Deserialize)]
struct DateQuery {
    date: Option<String>,
}

#[derive(Deserialize)]
struct PeriodQuery {
    period: Option<String>,
}

#[derive(Deserialize)]
struct LogWeightRequest {
    weight: f64,
    notes: Option<String>,
}

#[derive(Deserialize)]
struct TargetWeightRequest {
    target_weight: f64,
}

#[derive(Deserialize)]
struct HeightRequest {
    feet: i64,
    inches: i64,
}

#[derive(Deserialize)]
struct DobRequest {
    year: i32,
    month: u32,
    day: u32,
}

#[derive(Deserialize)]
struct GenderRequest {
    gender: String,
}

#[derive(Deserialize)]
struct PushTokenRequest {
    push_token: String,
}

#[derive(Deserialize)]
struct CustomNutritionRequest {
    food_name: String,
    quantity: f64,
}

/// Stored profile plus everything derived from it on the fly.
#[derive(Serialize)]
struct ProfileResponse {
    #[serde(flatten)]
    user: User,
    age: Option<i64>,
    bmi: Option<f64>,
    bmr: Option<i64>,
    #[serde(flatten)]
    goals: Goals,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::Internal(err) => {
                eprintln!("Internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let claims = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| auth::decode_token(&state.keys, token));

    let Some(claims) = claims else {
        return ApiError::Unauthorized("Invalid or missing token".to_string()).into_response();
    };

    request.extensions_mut().insert(AuthenticatedUser {
        id: claims.user_id,
    });
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

fn lock_service(state: &AppState) -> std::sync::MutexGuard<'_, IntakeService> {
    state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

// --- Handlers: accounts ---

async fn ping() -> Json<serde_json::Value> {
    Json(json!({"message": "Server is alive!"}))
}

async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }
    if let Some(gender) = &req.gender {
        validate_gender(gender).map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    }
    if let Some(goal) = &req.goal {
        validate_goal(goal).map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    }

    let password_hash = service::hash_password(&req.password).context("password hashing")?;

    let svc = lock_service(&state);
    if svc
        .user_by_email(&req.email)
        .context("database error")?
        .is_some()
    {
        return Err(ApiError::Conflict("User already exists".to_string()));
    }

    let user = svc
        .create_user(&NewUser {
            email: req.email,
            password_hash,
            gender: req.gender,
            feet: req.feet,
            inches: req.inches,
            weight: req.weight,
            birth_year: req.birth_year,
            birth_month: req.birth_month,
            birth_day: req.birth_day,
            diet_type: req.diet_type,
            goal: req.goal,
            target_weight: req.target_weight,
            weight_speed: req.weight_speed,
            workouts_per_week: req.workouts_per_week,
        })
        .context("failed to create user")?;

    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = {
        let svc = lock_service(&state);
        svc.verify_login(&req.email, &req.password)
            .context("login check failed")?
    };
    // One message for unknown email and wrong password alike
    let user = user.ok_or_else(|| ApiError::BadRequest("Invalid credentials".to_string()))?;

    let token = auth::issue_token(&state.keys, user.id).context("token signing failed")?;
    Ok(Json(json!({"token": token, "user": user})))
}

async fn get_me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let svc = lock_service(&state);
    let user = svc
        .user_by_id(auth_user.id)
        .map_err(|_| ApiError::NotFound("User not found".to_string()))?;

    let today = Local::now().date_naive();
    Ok(Json(ProfileResponse {
        age: metrics::age_on(&user, today),
        bmi: metrics::bmi(&user),
        bmr: metrics::bmr(&user, today),
        goals: metrics::resolve_goals(&user, today),
        user,
    }))
}

// --- Handlers: daily logs ---

async fn food_log(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Json(req): Json<FoodLogRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut delta = req.log;
    for meal in &mut delta.meals {
        meal.meal_type = validate_meal_type(&meal.meal_type)
            .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    }

    let svc = lock_service(&state);
    let log = svc
        .upsert_today_log(auth_user.id, &delta)
        .context("failed to update daily log")?;
    Ok(Json(json!({"message": "Daily log updated", "log": log})))
}

async fn get_daily_logs(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Query(query): Query<DateQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let svc = lock_service(&state);
    if let Some(date) = query.date {
        NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|_| ApiError::BadRequest(format!("Invalid date '{date}'. Use YYYY-MM-DD")))?;
        let log = svc
            .daily_log(auth_user.id, &date)
            .context("database error")?;
        let value = serde_json::to_value(log).context("failed to serialize log")?;
        return Ok(Json(value));
    }

    let logs = svc.list_daily_logs(auth_user.id).context("database error")?;
    let value = serde_json::to_value(logs).context("failed to serialize logs")?;
    Ok(Json(value))
}

async fn nutrition_stats(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let period = query.period.as_deref().unwrap_or("week");
    let period = StatsPeriod::parse(period).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "Invalid period '{period}'. Use week, twoWeeks or threeWeeks"
        ))
    })?;

    let svc = lock_service(&state);
    let stats = svc
        .nutrition_stats(auth_user.id, period)
        .context("failed to compute stats")?;
    let value = serde_json::to_value(stats).context("failed to serialize stats")?;
    Ok(Json(value))
}

// --- Handlers: weight ---

async fn log_weight(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Json(req): Json<LogWeightRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if req.weight <= 0.0 {
        return Err(ApiError::BadRequest(
            "weight must be greater than 0".to_string(),
        ));
    }

    let svc = lock_service(&state);
    let entry = svc
        .log_weight(auth_user.id, req.weight, req.notes.as_deref())
        .context("failed to log weight")?;
    let value = serde_json::to_value(entry).context("failed to serialize entry")?;
    Ok((StatusCode::CREATED, Json(value)))
}

async fn latest_weight(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let svc = lock_service(&state);
    let entry = svc
        .latest_weight_entry(auth_user.id)
        .context("database error")?;
    let value = serde_json::to_value(entry).context("failed to serialize entry")?;
    Ok(Json(value))
}

async fn update_target_weight(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Json(req): Json<TargetWeightRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.target_weight <= 0.0 {
        return Err(ApiError::BadRequest(
            "target_weight must be greater than 0".to_string(),
        ));
    }

    let svc = lock_service(&state);
    let user = svc
        .update_target_weight(auth_user.id, req.target_weight)
        .context("failed to update target weight")?;
    Ok(Json(
        json!({"message": "Target weight updated", "user": user}),
    ))
}

async fn weight_progress(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let period = query.period.as_deref().unwrap_or("30d");
    let period = ProgressPeriod::parse(period).ok_or_else(|| {
        ApiError::BadRequest(format!("Invalid period '{period}'. Use 30d, 90d, 6m or 1y"))
    })?;

    let svc = lock_service(&state);
    let progress = svc
        .weight_progress(auth_user.id, period)
        .context("failed to compute progress")?;
    let value = serde_json::to_value(progress).context("failed to serialize progress")?;
    Ok(Json(value))
}

// --- Handlers: profile attributes ---

async fn get_goals(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<Json<Goals>, ApiError> {
    let svc = lock_service(&state);
    let goals = svc
        .resolved_goals(auth_user.id)
        .context("failed to resolve goals")?;
    Ok(Json(goals))
}

async fn put_goals(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Json(req): Json<GoalOverrides>,
) -> Result<Json<Goals>, ApiError> {
    let svc = lock_service(&state);
    svc.set_custom_goals(auth_user.id, &req)
        .context("failed to store goals")?;
    let goals = svc
        .resolved_goals(auth_user.id)
        .context("failed to resolve goals")?;
    Ok(Json(goals))
}

async fn get_height(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let svc = lock_service(&state);
    let user = svc.user_by_id(auth_user.id).context("database error")?;
    Ok(Json(json!({"feet": user.feet, "inches": user.inches})))
}

async fn put_height(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Json(req): Json<HeightRequest>,
) -> Result<Json<User>, ApiError> {
    if req.feet < 0 || !(0..=11).contains(&req.inches) {
        return Err(ApiError::BadRequest(
            "feet must be non-negative and inches between 0 and 11".to_string(),
        ));
    }

    let svc = lock_service(&state);
    let user = svc
        .set_height(auth_user.id, req.feet, req.inches)
        .context("failed to update height")?;
    Ok(Json(user))
}

async fn put_dob(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Json(req): Json<DobRequest>,
) -> Result<Json<User>, ApiError> {
    validate_dob(req.year, req.month, req.day)
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;

    let svc = lock_service(&state);
    let user = svc
        .set_dob(auth_user.id, req.year, req.month, req.day)
        .context("failed to update date of birth")?;
    Ok(Json(user))
}

async fn put_gender(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Json(req): Json<GenderRequest>,
) -> Result<Json<User>, ApiError> {
    validate_gender(&req.gender).map_err(|e| ApiError::BadRequest(format!("{e}")))?;

    let svc = lock_service(&state);
    let user = svc
        .set_gender(auth_user.id, &req.gender)
        .context("failed to update gender")?;
    Ok(Json(user))
}

async fn update_push_token(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Json(req): Json<PushTokenRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let svc = lock_service(&state);
    svc.set_push_token(auth_user.id, &req.push_token)
        .context("failed to store push token")?;
    Ok(Json(json!({"message": "Push token updated"})))
}

// --- Handlers: nutrients ---

async fn custom_nutrition(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthenticatedUser>,
    Json(req): Json<CustomNutritionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.quantity <= 0.0 {
        return Err(ApiError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let info = {
        let svc = lock_service(&state);
        svc.custom_nutrition(&req.food_name, req.quantity)
            .context("nutrient lookup failed")?
    };
    let info = info.ok_or_else(|| {
        ApiError::NotFound(format!(
            "Food item \"{}\" not found in database",
            req.food_name
        ))
    })?;
    let value = serde_json::to_value(info).context("failed to serialize nutrition")?;
    Ok(Json(value))
}

// --- Router builder ---

pub fn build_router(state: AppState) -> Router {
    let authed = Router::new()
        .route("/users/me", get(get_me))
        .route("/users/daily-log", post(food_log))
        .route("/users/daily-logs", get(get_daily_logs))
        .route("/users/stats", get(nutrition_stats))
        .route("/users/log", post(log_weight))
        .route("/users/latest", get(latest_weight))
        .route("/users/update-target-weight", post(update_target_weight))
        .route("/users/progress", get(weight_progress))
        .route("/users/goals", get(get_goals).put(put_goals))
        .route("/users/height", get(get_height).put(put_height))
        .route("/users/dob", put(put_dob))
        .route("/users/gender", put(put_gender))
        .route("/users/update-token", post(update_push_token))
        .route("/users/custom-nutrition", post(custom_nutrition))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/users/ping", get(ping))
        .route("/users/signup", post(signup))
        .route("/users/login", post(login))
        .merge(authed)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    svc: IntakeService,
    port: u16,
    bind: &str,
    keys: JwtKeys,
    notifications: bool,
) -> anyhow::Result<()> {
    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
        keys: Arc::new(keys),
    };

    if notifications {
        crate::notify::spawn_scheduler(Arc::clone(&state.svc));
    }

    let app = build_router(state);

    if bind != "127.0.0.1" && bind != "localhost" {
        eprintln!("Warning: Listening on {bind}. Any device on your network can reach this API.");
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
