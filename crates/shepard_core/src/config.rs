use std::time::Duration;

use shared::protocol::CreateDropletRequest;

pub const DEFAULT_GROUP_NAME: &str = "cloud-shepard";
pub const DEFAULT_REGION: &str = "lon1";
pub const DEFAULT_SIZE: &str = "512mb";
pub const DEFAULT_IMAGE: &str = "ubuntu-15-10-x64";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Everything a creation request carries besides the group name and key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropletTemplate {
    pub region: String,
    pub size: String,
    pub image: String,
    pub backups: bool,
    pub ipv6: bool,
    pub user_data: Option<String>,
    pub private_networking: Option<bool>,
}

impl Default for DropletTemplate {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.into(),
            size: DEFAULT_SIZE.into(),
            image: DEFAULT_IMAGE.into(),
            backups: false,
            ipv6: false,
            user_data: None,
            private_networking: None,
        }
    }
}

impl DropletTemplate {
    pub fn request(&self, group_name: &str, key_fingerprint: &str) -> CreateDropletRequest {
        CreateDropletRequest {
            name: group_name.to_string(),
            region: self.region.clone(),
            size: self.size.clone(),
            image: self.image.clone(),
            ssh_keys: vec![key_fingerprint.to_string()],
            backups: self.backups,
            ipv6: self.ipv6,
            user_data: self.user_data.clone(),
            private_networking: self.private_networking,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// `None` polls until convergence, however long that takes.
    pub timeout: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}

/// Built once at startup and handed to [`crate::Shepard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShepardConfig {
    pub group_name: String,
    pub template: DropletTemplate,
    pub poll: PollSettings,
}

impl ShepardConfig {
    pub fn new(group_name: impl Into<String>) -> Self {
        Self {
            group_name: group_name.into(),
            template: DropletTemplate::default(),
            poll: PollSettings::default(),
        }
    }
}

impl Default for ShepardConfig {
    fn default() -> Self {
        Self::new(DEFAULT_GROUP_NAME)
    }
}
