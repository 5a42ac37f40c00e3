use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Online,
    RecentlyActive,
    ActiveToday,
    ActiveThisWeek,
    Inactive,
}

#[derive(Debug, Clone, Serialize)]
pub struct Activity {
    pub status: ActivityStatus,
    pub label: String,
    pub last_active: Option<DateTime<Utc>>,
}

/// Buckets a user's presence. `online_window` bounds how long an `is_online`
/// flag is trusted without a fresh heartbeat.
pub fn activity_status(
    is_online: bool,
    last_active: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    online_window: Duration,
) -> Activity {
    let Some(last) = last_active else {
        return Activity {
            status: if is_online { ActivityStatus::Online } else { ActivityStatus::Inactive },
            label: if is_online { "Active now" } else { "Inactive" }.to_string(),
            last_active: None,
        };
    };

    let idle = (now - last).max(Duration::zero());

    let status = if is_online && idle <= online_window {
        ActivityStatus::Online
    } else if idle < Duration::hours(1) {
        ActivityStatus::RecentlyActive
    } else if idle < Duration::hours(24) {
        ActivityStatus::ActiveToday
    } else if idle < Duration::days(7) {
        ActivityStatus::ActiveThisWeek
    } else {
        ActivityStatus::Inactive
    };

    let label = match status {
        ActivityStatus::Online => "Active now".to_string(),
        ActivityStatus::RecentlyActive => {
            let minutes = idle.num_minutes();
            if minutes < 1 {
                "Active just now".to_string()
            } else {
                format!("Active {minutes}m ago")
            }
        }
        ActivityStatus::ActiveToday => format!("Active {}h ago", idle.num_hours()),
        ActivityStatus::ActiveThisWeek => "Active this week".to_string(),
        ActivityStatus::Inactive => "Inactive".to_string(),
    };

    Activity {
        status,
        label,
        last_active: Some(last),
    }
}
