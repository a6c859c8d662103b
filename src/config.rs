use rocket::serde::Deserialize;

/// Application settings, extracted once from the Rocket figment at ignite and
/// handed to handlers as managed state.
#[derive(Debug, Clone, Deserialize)]
#[serde(crate = "rocket::serde", default)]
pub struct PagesConfig {
    /// Pages that may be chosen as a section parent (`PAGE_PARENT_IDS`).
    pub page_parent_ids: Vec<i32>,
    /// Mounts the JSON editing routes under `/admin`. Only enable this behind
    /// an authenticating proxy.
    pub admin_api: bool,
    /// Scheme and host prefixed to feed links, e.g. `https://example.com`.
    pub site_url: String,
    pub site_title: String,
}

impl Default for PagesConfig {
    fn default() -> Self {
        PagesConfig {
            page_parent_ids: Vec::new(),
            admin_api: false,
            site_url: String::new(),
            site_title: "Pages".to_owned(),
        }
    }
}

impl PagesConfig {
    pub fn is_allowed_parent(&self, parent_id: i32) -> bool {
        self.page_parent_ids.contains(&parent_id)
    }
}
