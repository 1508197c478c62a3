use std::time::Duration;

/// Shown as a mood's reaction whenever the partner has nothing for its emoji.
pub const DEFAULT_REACTION_URL: &str = "https://firebasestorage.googleapis.com/v0/b/mood-tracker-d7fc3.firebasestorage.app/o/reactions%2Fcoming-soon.jpg?alt=media&token=8be0eadc-a4c2-494d-b6b4-19683bf0f651";

/// The emojis a mood can be posted with.
pub const DEFAULT_PALETTE: [&str; 5] = ["😊", "😂", "😴", "😔", "😡"];

pub const DEFAULT_LATEST_LIMIT: usize = 3;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Size of the bounded "latest" views for self and partner.
    pub latest_limit: usize,
    /// Applied to every remote call.
    pub request_timeout: Duration,
    pub palette: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            latest_limit: DEFAULT_LATEST_LIMIT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            palette: DEFAULT_PALETTE.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl SyncConfig {
    pub fn in_palette(&self, emoji: &str) -> bool {
        self.palette.iter().any(|e| e == emoji)
    }
}
