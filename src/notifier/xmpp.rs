use core::str::FromStr as _;
use std::fs;
use std::sync::Arc;

use anyhow::Context as _;
use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use xmpp::jid::BareJid;
use xmpp::{ClientBuilder, ClientType, Event};
use xmpp_parsers::message::MessageType;

use crate::notifier::Notifier;

/// Relays order-request alerts to staff over XMPP.
pub struct XMPPNotifier {
    jid: BareJid,
    password: String,
    recipients: Vec<BareJid>,
    sender: UnboundedSender<String>,
    receiver: Mutex<UnboundedReceiver<String>>,
}

impl XMPPNotifier {
    pub fn new(jid: &str, password: &str, recipients: &[String]) -> anyhow::Result<Self> {
        let jid = BareJid::from_str(jid).with_context(|| format!("Failed to parse JID '{jid}'"))?;

        let recipients = recipients
            .iter()
            .map(|x| {
                BareJid::from_str(x).with_context(|| format!("Failed to parse recipient JID '{x}'"))
            })
            .collect::<anyhow::Result<_>>()?;

        let (sender, receiver) = mpsc::unbounded_channel();

        Ok(Self {
            jid,
            password: password.to_owned(),
            recipients,
            sender,
            receiver: Mutex::new(receiver),
        })
    }

    /// Reads a sendxmpp-style credentials file (`jid password`).
    pub fn from_credentials_file(recipients: &[String], filepath: &str) -> anyhow::Result<Self> {
        let path = shellexpand::tilde(filepath).to_string();
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read credentials file '{path}'"))?;

        let (jid, password) =
            parse_credentials(&content).with_context(|| format!("In '{path}'"))?;

        Self::new(jid, password, recipients)
    }
}

fn parse_credentials(content: &str) -> anyhow::Result<(&str, &str)> {
    let mut parts = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .unwrap_or_default()
        .split_whitespace();

    let jid = parts.next().ok_or_else(|| anyhow!("Missing jid"))?;
    let password = parts.next().ok_or_else(|| anyhow!("Missing password"))?;

    Ok((jid, password))
}

#[async_trait]
impl Notifier for XMPPNotifier {
    async fn notify(&self, title: &str, body: &str) {
        if let Err(e) = self.sender.send(format!("{title}\n{body}")) {
            log::error!("Failed to queue XMPP alert: {e}");
        }
    }

    async fn run(&self, shutdown: Arc<tokio::sync::Notify>) -> anyhow::Result<()> {
        let mut agent = ClientBuilder::new(self.jid.clone(), &self.password)
            .set_client(ClientType::Bot, "ne-mlp-notify")
            .build();

        loop {
            tokio::select! {
                () = shutdown.notified() => break,
                msg = async { self.receiver.lock().await.recv().await } => {
                    let Some(msg) = msg else { break };

                    for recipient in &self.recipients {
                        agent.send_message(
                            recipient.clone().into(),
                            MessageType::Chat,
                            "",
                            &msg,
                        ).await;
                    }
                }
                events = agent.wait_for_events() => {
                    for event in events.unwrap_or_default() {
                        if matches!(event, Event::Online) {
                            match agent.bound_jid() {
                                Some(bound_jid) => log::info!("XMPP relay online as {bound_jid}"),
                                None => log::warn!("XMPP relay online without JID"),
                            }
                        }
                    }
                }
            }
        }

        agent
            .disconnect()
            .await
            .context("Error during XMPP disconnect")
    }
}
