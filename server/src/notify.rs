//! Daily push-notification sweep over the Expo push HTTP API.
//!
//! Users whose resolved calorie goal is suspiciously low get a nudge to fix
//! their plan. Everything here logs and carries on; a failed sweep must
//! never take the scheduler down.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use intake_core::service::IntakeService;

const EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";
const EXPO_RECEIPTS_URL: &str = "https://exp.host/--/api/v2/push/getReceipts";
const CHUNK_SIZE: usize = 100;
const LOW_CALORIE_LIMIT: i64 = 100;
const SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct ExpoPushClient {
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct PushMessage {
    to: String,
    sound: &'static str,
    title: &'static str,
    body: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TicketResponse {
    data: Vec<PushTicket>,
}

#[derive(Debug, Deserialize)]
struct PushTicket {
    status: String,
    id: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReceiptResponse {
    data: HashMap<String, PushReceipt>,
}

#[derive(Debug, Deserialize)]
struct PushReceipt {
    status: String,
    message: Option<String>,
}

impl ExpoPushClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("intake/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("failed to build HTTP client");
        ExpoPushClient { client }
    }

    async fn send_chunk(&self, messages: &[PushMessage]) -> anyhow::Result<Vec<PushTicket>> {
        let response = self
            .client
            .post(EXPO_PUSH_URL)
            .json(messages)
            .send()
            .await?
            .error_for_status()?;
        let tickets: TicketResponse = response.json().await?;
        Ok(tickets.data)
    }

    async fn fetch_receipts(&self, ids: &[String]) -> anyhow::Result<HashMap<String, PushReceipt>> {
        let response = self
            .client
            .post(EXPO_RECEIPTS_URL)
            .json(&serde_json::json!({"ids": ids}))
            .send()
            .await?
            .error_for_status()?;
        let receipts: ReceiptResponse = response.json().await?;
        Ok(receipts.data)
    }
}

fn is_expo_push_token(token: &str) -> bool {
    (token.starts_with("ExponentPushToken[") || token.starts_with("ExpoPushToken["))
        && token.ends_with(']')
}

/// One message per user with a valid token and a resolved calorie goal in
/// (0, 100). Collected synchronously so the service lock is never held
/// across an await.
fn collect_messages(svc: &Mutex<IntakeService>) -> Vec<PushMessage> {
    let svc = svc.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let users = match svc.users_with_push_tokens() {
        Ok(users) => users,
        Err(e) => {
            eprintln!("Notification sweep: failed to load users: {e:#}");
            return Vec::new();
        }
    };

    let mut messages = Vec::new();
    for user in users {
        let Some(token) = user.push_token.clone() else {
            continue;
        };
        if !is_expo_push_token(&token) {
            eprintln!("Skipping malformed push token for {}", user.email);
            continue;
        }
        let goals = match svc.resolved_goals(user.id) {
            Ok(goals) => goals,
            Err(e) => {
                eprintln!("Notification sweep: goals for {} failed: {e:#}", user.email);
                continue;
            }
        };
        let Some(calories) = goals.daily_calorie_goal else {
            continue;
        };
        if calories > 0 && calories < LOW_CALORIE_LIMIT {
            messages.push(PushMessage {
                to: token,
                sound: "default",
                title: "Calorie Alert",
                body: format!(
                    "Your daily calorie goal is low ({calories} kcal). Consider adjusting your plan!"
                ),
                data: serde_json::json!({"type": "calorie_alert", "calories": calories}),
            });
        }
    }
    messages
}

pub async fn run_sweep(client: &ExpoPushClient, svc: &Mutex<IntakeService>) {
    let messages = collect_messages(svc);
    if messages.is_empty() {
        return;
    }
    eprintln!("Notification sweep: sending {} alert(s)", messages.len());

    let mut ticket_ids = Vec::new();
    for chunk in messages.chunks(CHUNK_SIZE) {
        match client.send_chunk(chunk).await {
            Ok(tickets) => {
                for ticket in tickets {
                    if ticket.status == "ok" {
                        if let Some(id) = ticket.id {
                            ticket_ids.push(id);
                        }
                    } else {
                        eprintln!(
                            "Push ticket error: {}",
                            ticket.message.unwrap_or_else(|| ticket.status.clone())
                        );
                    }
                }
            }
            Err(e) => eprintln!("Failed to send push chunk: {e:#}"),
        }
    }

    if ticket_ids.is_empty() {
        return;
    }
    match client.fetch_receipts(&ticket_ids).await {
        Ok(receipts) => {
            for (id, receipt) in receipts {
                if receipt.status != "ok" {
                    eprintln!(
                        "Push receipt {id} error: {}",
                        receipt.message.unwrap_or_else(|| receipt.status.clone())
                    );
                }
            }
        }
        Err(e) => eprintln!("Failed to fetch push receipts: {e:#}"),
    }
}

/// Run a sweep at boot and then once every 24 hours.
pub fn spawn_scheduler(svc: Arc<Mutex<IntakeService>>) {
    tokio::spawn(async move {
        let client = ExpoPushClient::new();
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            run_sweep(&client, &svc).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::models::{GoalOverrides, NewUser};
    use intake_core::service::hash_password;

    #[test]
    fn test_token_format_check() {
        assert!(is_expo_push_token("ExponentPushToken[abc123]"));
        assert!(is_expo_push_token("ExpoPushToken[abc123]"));
        assert!(!is_expo_push_token("ExponentPushToken[abc123"));
        assert!(!is_expo_push_token("abc123"));
        assert!(!is_expo_push_token(""));
    }

    fn user_with_token(svc: &IntakeService, email: &str, token: &str, calorie_goal: i64) -> i64 {
        let user = svc
            .create_user(&NewUser {
                email: email.to_string(),
                password_hash: hash_password("pw").unwrap(),
                ..NewUser::default()
            })
            .unwrap();
        svc.set_push_token(user.id, token).unwrap();
        svc.set_custom_goals(
            user.id,
            &GoalOverrides {
                daily_calorie_goal: Some(calorie_goal),
                ..GoalOverrides::default()
            },
        )
        .unwrap();
        user.id
    }

    #[test]
    fn test_collect_targets_only_low_goals_with_valid_tokens() {
        let svc = IntakeService::new_in_memory().unwrap();
        user_with_token(&svc, "low@b.com", "ExponentPushToken[low]", 50);
        user_with_token(&svc, "fine@b.com", "ExponentPushToken[fine]", 2200);
        user_with_token(&svc, "bad@b.com", "not-a-token", 50);

        let svc = Mutex::new(svc);
        let messages = collect_messages(&svc);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].to, "ExponentPushToken[low]");
        assert_eq!(messages[0].title, "Calorie Alert");
        assert!(messages[0].body.contains("50 kcal"));
        // Clients route on the payload discriminator
        assert_eq!(messages[0].data["type"], "calorie_alert");
        assert_eq!(messages[0].data["calories"], 50);
    }

    #[test]
    fn test_collect_skips_users_without_goal() {
        let svc = IntakeService::new_in_memory().unwrap();
        let user = svc
            .create_user(&NewUser {
                email: "nogoal@b.com".to_string(),
                password_hash: hash_password("pw").unwrap(),
                ..NewUser::default()
            })
            .unwrap();
        svc.set_push_token(user.id, "ExponentPushToken[x]").unwrap();

        let svc = Mutex::new(svc);
        assert!(collect_messages(&svc).is_empty());
    }
}
