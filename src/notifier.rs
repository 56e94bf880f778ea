pub mod desktop;
pub mod xmpp;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future;

/// A channel for the visual order-request alert.
#[async_trait]
pub trait Notifier {
    async fn notify(&self, title: &str, body: &str);

    async fn run(&self, _shutdown: Arc<tokio::sync::Notify>) -> anyhow::Result<()> {
        Ok(())
    }
}

pub type DynNotifier = dyn Notifier + Send + Sync;

pub struct CompositeNotifier {
    notifiers: Vec<Box<DynNotifier>>,
}

impl CompositeNotifier {
    pub fn new(notifiers: Vec<Box<DynNotifier>>) -> Self {
        Self { notifiers }
    }
}

#[async_trait]
impl Notifier for CompositeNotifier {
    async fn notify(&self, title: &str, body: &str) {
        future::join_all(self.notifiers.iter().map(|x| x.notify(title, body))).await;
    }

    async fn run(&self, shutdown: Arc<tokio::sync::Notify>) -> anyhow::Result<()> {
        let results =
            future::join_all(self.notifiers.iter().map(|x| x.run(Arc::clone(&shutdown)))).await;

        for result in results {
            if let Err(e) = result {
                log::error!("{e:#}");
            }
        }

        Ok(())
    }
}

/// Text of the visual alert for `pending` waiting requests.
pub fn alert_message(pending: u64, link: &str) -> (String, String) {
    let title = "New order request".to_owned();
    let body = match pending {
        0 | 1 => format!("A new medication order request is waiting.\n{link}"),
        n => format!("{n} order requests are waiting.\n{link}"),
    };
    (title, body)
}

pub use desktop::DesktopNotifier;
pub use xmpp::XMPPNotifier;
