use core::time::Duration;
use std::env;

use anyhow::Context as _;
use anyhow::ensure;
use url::Url;

pub const DEFAULT_ACTION: &str = "ne_mlp_check_new_requests";
const REQUESTS_PAGE: &str = "admin.php?page=ne-mlp-order-requests";

pub struct EndpointConfig {
    pub url: Url,
    pub action: String,
    pub nonce: String,
    pub cookie: Option<String>,
    /// Deep link shown in the visual alert.
    pub requests_page: Url,
}

impl EndpointConfig {
    pub fn new(
        ajax_url: &str,
        action: &str,
        nonce: Option<String>,
        cookie: Option<String>,
        requests_page: Option<&str>,
    ) -> anyhow::Result<Self> {
        let mut url = Url::parse(ajax_url).context("Invalid URL")?;
        let scheme = url.scheme().to_lowercase();

        ensure!(
            scheme == "http" || scheme == "https",
            "Invalid scheme: expected http or https, got {}",
            scheme
        );
        ensure!(url.host_str().is_some(), "Invalid URL: missing host");

        if !url.username().is_empty() || url.password().is_some() {
            log::warn!("Ignoring the credentials embedded in the endpoint URL");
            let _ = url.set_password(None);
            let _ = url.set_username("");
        }

        let nonce = if let Some(nonce) = nonce {
            log::warn!("It isn't safe to provide the nonce in the command line!");
            nonce
        } else if let Ok(nonce) = env::var("NE_MLP_NONCE") {
            nonce
        } else {
            log::info!("Note: Nonce can be provided with env NE_MLP_NONCE");
            rpassword::prompt_password("Nonce: ").context("Failed to read nonce")?
        };

        ensure!(!nonce.trim().is_empty(), "Nonce must not be empty");

        let cookie = cookie.or_else(|| env::var("NE_MLP_COOKIE").ok());

        let requests_page = match requests_page {
            Some(page) => Url::parse(page).context("Invalid requests page URL")?,
            None => url
                .join(REQUESTS_PAGE)
                .context("Failed to derive the requests page URL")?,
        };

        Ok(Self {
            url,
            action: action.to_owned(),
            nonce: nonce.trim().to_owned(),
            cookie,
            requests_page,
        })
    }
}

/// Timing of the poll loop and its alerts.
#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub interval: Duration,
    pub retry_delay: Duration,
    pub startup_delay: Duration,
    /// Minimum spacing between two visual alerts.
    pub modal_throttle: Duration,
    /// Render the request list and ask the endpoint for rows.
    pub show_requests: bool,
    pub title: String,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            retry_delay: Duration::from_secs(30),
            startup_delay: Duration::from_secs(1),
            modal_throttle: Duration::from_secs(3),
            show_requests: false,
            title: "Order Requests".to_owned(),
        }
    }
}
