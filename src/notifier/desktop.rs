use async_trait::async_trait;

use crate::notifier::Notifier;

/// Desktop popup standing in for the request modal.
pub struct DesktopNotifier {
    timeout_ms: u32,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self { timeout_ms: 20000 }
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(&self, title: &str, body: &str) {
        let shown = notify_rust::Notification::new()
            .appname("ne-mlp-notify")
            .summary(title)
            .body(body)
            .timeout(notify_rust::Timeout::Milliseconds(self.timeout_ms))
            .show();

        if let Err(e) = shown {
            log::error!("Failed to show desktop notification: {e}");
        }
    }
}
