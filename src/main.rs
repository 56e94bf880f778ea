#![warn(clippy::pedantic)]
#![warn(clippy::std_instead_of_core)]
#![warn(clippy::str_to_string)]
#![warn(clippy::unused_trait_names)]

use core::error::Error;
use core::time::Duration;
use std::io::Write as _;
use std::sync::Arc;

use clap::Parser as _;
use futures::future;
use rustls::crypto;
use tokio::io::BufReader;

use ne_mlp_notify::ajax::{AjaxClient, DynPendingSource};
use ne_mlp_notify::audio::output::{DeviceSound, DeviceTone};
use ne_mlp_notify::audio::{AudioAlert, DynSoundDevice, DynToneOutput};
use ne_mlp_notify::config::{DEFAULT_ACTION, EndpointConfig, PollerSettings};
use ne_mlp_notify::notifier::{
    CompositeNotifier, DesktopNotifier, DynNotifier, Notifier as _, XMPPNotifier,
};
use ne_mlp_notify::poller::Poller;
use ne_mlp_notify::surface::{DynSurface, TerminalSurface};
use ne_mlp_notify::{control, signals};

#[derive(clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WordPress AJAX URL (http[s]://host/wp-admin/admin-ajax.php)
    ajax_url: String,

    /// Security nonce for the check (else env NE_MLP_NONCE, else prompted)
    #[arg(long)]
    nonce: Option<String>,

    /// Session cookie header for the staff login (else env NE_MLP_COOKIE)
    #[arg(long)]
    cookie: Option<String>,

    /// AJAX action answering the pending check
    #[arg(long, default_value = DEFAULT_ACTION)]
    action: String,

    /// Ask for request details and list new requests
    #[arg(long)]
    show_requests: bool,

    /// Title the alert counter is prefixed to
    #[arg(long, default_value = "Order Requests")]
    title: String,

    /// Page linked from the visual alert
    #[arg(long, value_name = "URL")]
    requests_page: Option<String>,

    /// Seconds between checks
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    interval: u64,

    /// HTTP timeout of a single check in seconds
    #[arg(long, value_name = "SECS", default_value_t = 15)]
    timeout: u64,

    /// Alert sound file
    #[arg(
        long,
        value_name = "FILE",
        default_value = "~/.local/share/ne-mlp-notify/notification.wav"
    )]
    sound: String,

    /// Only use the synthesized tone
    #[arg(long)]
    no_sound: bool,

    /// No audio at all
    #[arg(long)]
    mute: bool,

    /// Enable desktop notifications
    #[arg(long)]
    desktop: bool,

    /// Relay alerts over XMPP (can be specified multiple times)
    #[arg(long, value_name = "RECIPIENT")]
    xmpp: Vec<String>,

    /// Path to the XMPP credentials file
    #[arg(long, value_name = "FILE", default_value = "~/.sendxmpprc")]
    xmpp_credentials: String,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info,xmpp::disco=warn"),
    )
    .format(|buf, record| {
        if record.level() == log::Level::Info {
            writeln!(buf, "{}", record.args())
        } else {
            writeln!(buf, "[{}] {}", record.level(), record.args())
        }
    })
    .init();

    if crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        log::warn!("A crypto provider was already installed");
    }

    let code = match run(Args::parse()).await {
        Ok(()) => 0,
        Err(e) => {
            log::error!("{e}");
            1
        }
    };

    // The stdin reader may still sit in a blocking read the runtime would
    // wait for on drop.
    std::process::exit(code);
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let endpoint = EndpointConfig::new(
        &args.ajax_url,
        &args.action,
        args.nonce.clone(),
        args.cookie.clone(),
        args.requests_page.as_deref(),
    )?;

    let settings = PollerSettings {
        interval: Duration::from_secs(args.interval.max(1)),
        show_requests: args.show_requests,
        title: args.title.clone(),
        ..PollerSettings::default()
    };

    let source: Arc<DynPendingSource> =
        Arc::new(AjaxClient::new(&endpoint, Duration::from_secs(args.timeout))?);

    let audio = Arc::new(audio_alert(&args));

    let mut notifiers: Vec<Box<DynNotifier>> = Vec::new();

    if args.desktop {
        notifiers.push(Box::new(DesktopNotifier::new()));
    }

    if !args.xmpp.is_empty() {
        let notifier = XMPPNotifier::from_credentials_file(&args.xmpp, &args.xmpp_credentials)
            .map_err(|e| format!("XMPP error: {e:#}"))?;
        notifiers.push(Box::new(notifier));
    }

    if notifiers.is_empty() {
        log::warn!("No visual alerts enabled (--desktop, --xmpp)");
    }

    let shutdown = Arc::new(tokio::sync::Notify::new());
    let composite = Arc::new(CompositeNotifier::new(notifiers));
    let notifier: Arc<DynNotifier> = Arc::clone(&composite) as Arc<DynNotifier>;
    let surface: Arc<DynSurface> = Arc::new(TerminalSurface::new(50));

    let poller = Poller::new(
        settings,
        source,
        audio,
        surface,
        notifier,
        endpoint.requests_page.clone(),
    )
    .start();

    log::info!("Watching {} (Enter: seen, c: check, p: play, u: unlock, q: quit)", endpoint.url);

    let mut signal_stream = signal_hook_tokio::Signals::new(signals::HANDLED)?;

    let relay = tokio::spawn({
        let composite = Arc::clone(&composite);
        let shutdown = Arc::clone(&shutdown);
        async move { composite.run(shutdown).await }
    });

    let stdin = BufReader::new(tokio::io::stdin());

    let controls = async {
        if control::run(stdin, &poller).await {
            log::info!("Shutting down...");
        } else {
            // No terminal attached: run until signalled.
            future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = controls => {}
        () = signals::wait_for_shutdown(&mut signal_stream, &poller) => {}
    }

    let teardown = async {
        shutdown.notify_waiters();
        poller.stop().await;

        if let Ok(Err(e)) = relay.await {
            log::error!("{e:#}");
        }
    };

    tokio::select! {
        () = teardown => Ok(()),
        result = signals::abort_on_interrupt(&mut signal_stream) => Ok(result?),
    }
}

fn audio_alert(args: &Args) -> AudioAlert {
    if args.mute {
        return AudioAlert::muted();
    }

    let device: Option<Box<DynSoundDevice>> = if args.no_sound {
        None
    } else {
        Some(Box::new(DeviceSound::new(&args.sound)))
    };
    let tone: Box<DynToneOutput> = Box::new(DeviceTone);

    AudioAlert::new(device, Some(tone))
}
