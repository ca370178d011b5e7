use serde::{Deserialize, Serialize};

use crate::domain::Droplet;

/// Body of `POST /droplets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDropletRequest {
    pub name: String,
    pub region: String,
    pub size: String,
    pub image: String,
    pub ssh_keys: Vec<String>,
    pub backups: bool,
    pub ipv6: bool,
    pub user_data: Option<String>,
    pub private_networking: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DropletEnvelope {
    pub droplet: Droplet,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Pages {
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub last: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Links {
    #[serde(default)]
    pub pages: Option<Pages>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Meta {
    #[serde(default)]
    pub total: Option<u64>,
}

/// One page of `GET /droplets`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DropletPage {
    #[serde(default)]
    pub droplets: Vec<Droplet>,
    #[serde(default)]
    pub links: Links,
    #[serde(default)]
    pub meta: Meta,
}

impl DropletPage {
    pub fn next_page(&self) -> Option<&str> {
        self.links
            .pages
            .as_ref()
            .and_then(|pages| pages.next.as_deref())
    }
}
