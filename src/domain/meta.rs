use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Fields shared by every rule kind.
///
/// Flattened into the rule object on the wire, so a flow rule reads as
/// `{"id":1,"app":"demo","resource":"foo",...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMeta {
    /// Assigned by the repository on first save
    #[serde(default)]
    pub id: Option<i64>,

    /// Application the rule governs
    #[serde(default)]
    pub app: Option<String>,

    /// Machine scoping (optional)
    #[serde(default)]
    pub ip: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub gmt_create: Option<DateTime<Utc>>,

    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub gmt_modified: Option<DateTime<Utc>>,
}

impl RuleMeta {
    /// Meta for a new, unsaved rule of `app`.
    pub fn for_app(app: impl Into<String>) -> Self {
        RuleMeta {
            app: Some(app.into()),
            ..Default::default()
        }
    }

    /// App name, or an empty string when unset.
    pub fn app_name(&self) -> &str {
        self.app.as_deref().unwrap_or("")
    }

    /// Returns true when the app is missing or blank.
    pub fn app_is_blank(&self) -> bool {
        is_blank(self.app.as_deref())
    }

    /// Prepare for a first save: clear the id and stamp both timestamps.
    pub fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.id = None;
        self.app = self.app.as_ref().map(|a| a.trim().to_string());
        self.gmt_create = Some(now);
        self.gmt_modified = Some(now);
    }

    /// Prepare for an update of `old`.
    ///
    /// The machine and app binding come from the stored record, never from
    /// the request body. `gmt_modified` is kept strictly after the previous
    /// value even if the wall clock did not move.
    pub fn stamp_updated(&mut self, id: i64, old: &RuleMeta, now: DateTime<Utc>) {
        self.id = Some(id);
        self.app = old.app.clone();
        self.ip = old.ip.clone();
        self.port = old.port;
        self.gmt_create = old.gmt_create;

        let floor = old
            .gmt_modified
            .map(|prev| prev + Duration::milliseconds(1));
        self.gmt_modified = Some(match floor {
            Some(floor) if floor > now => floor,
            _ => now,
        });
    }
}

/// Current time truncated to millisecond precision.
///
/// Timestamps travel as epoch milliseconds, so anything finer would not
/// survive a round trip through the rule source.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Returns true for a missing, empty or whitespace-only string.
pub fn is_blank(s: Option<&str>) -> bool {
    s.map(|s| s.trim().is_empty()).unwrap_or(true)
}

/// Trim an optional string in place.
pub fn trim_in_place(s: &mut Option<String>) {
    if let Some(value) = s.as_mut() {
        let trimmed = value.trim();
        if trimmed.len() != value.len() {
            *value = trimmed.to_string();
        }
    }
}
