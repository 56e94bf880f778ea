//! The running poll loop against a mocked endpoint.

use core::time::Duration;
use std::sync::{Arc, Mutex};

use ne_mlp_notify::ajax::{AjaxClient, DynPendingSource, PendingRequest};
use ne_mlp_notify::audio::AudioAlert;
use ne_mlp_notify::config::{DEFAULT_ACTION, EndpointConfig, PollerSettings};
use ne_mlp_notify::notifier::{CompositeNotifier, DynNotifier};
use ne_mlp_notify::poller::{Poller, PollerControl as _, PollerHandle, PollerStatus};
use ne_mlp_notify::surface::{DynSurface, Surface, TerminalSurface};
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pending(total: u64, timestamp: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "success": true,
        "data": { "count": 0, "timestamp": timestamp, "total_pending": total }
    }))
}

async fn mount_sequence(server: &MockServer, totals: &[u64]) {
    let last = totals.len() - 1;

    for (i, &total) in totals.iter().enumerate() {
        let mock = Mock::given(method("POST")).respond_with(pending(total, 1_700_000_000 + i as i64));
        let mock = if i == last { mock } else { mock.up_to_n_times(1) };
        mock.mount(server).await;
    }
}

fn settings() -> PollerSettings {
    PollerSettings {
        interval: Duration::from_millis(50),
        startup_delay: Duration::from_millis(10),
        ..PollerSettings::default()
    }
}

fn start(server: &MockServer) -> PollerHandle {
    start_with(server, settings(), Arc::new(TerminalSurface::new(10)))
}

fn start_with(server: &MockServer, settings: PollerSettings, surface: Arc<DynSurface>) -> PollerHandle {
    let url = format!("{}/wp-admin/admin-ajax.php", server.uri());
    let config =
        EndpointConfig::new(&url, DEFAULT_ACTION, Some("n0nce".to_owned()), None, None).unwrap();
    let source: Arc<DynPendingSource> =
        Arc::new(AjaxClient::new(&config, Duration::from_secs(5)).unwrap());

    let notifier: Arc<DynNotifier> = Arc::new(CompositeNotifier::new(Vec::new()));

    Poller::new(
        settings,
        source,
        Arc::new(AudioAlert::muted()),
        surface,
        notifier,
        config.requests_page,
    )
    .start()
}

/// Keeps the ids of every row handed to the list view.
#[derive(Default)]
struct RecordingSurface {
    rows: Mutex<Vec<u64>>,
}

impl Surface for RecordingSurface {
    fn set_title(&self, _title: &str) {}

    fn prepend_requests(&self, rows: &[PendingRequest]) {
        self.rows.lock().unwrap().extend(rows.iter().map(|r| r.id));
    }

    fn sound_prompt(&self, _visible: bool) {}
}

async fn wait_until(handle: &PollerHandle, f: impl FnMut(&PollerStatus) -> bool) -> PollerStatus {
    let mut status = handle.subscribe();
    let seen = tokio::time::timeout(Duration::from_secs(5), status.wait_for(f))
        .await
        .expect("poller did not reach the expected state")
        .expect("poller stopped");
    *seen
}

#[tokio::test]
async fn test_alerts_once_for_plateau_then_increase() {
    let server = MockServer::start().await;
    mount_sequence(&server, &[5, 5, 7]).await;

    let handle = start(&server);

    let status = wait_until(&handle, |s| s.checks_completed >= 5).await;
    assert_eq!(status.notification_count, 1);
    assert_eq!(status.last_total_pending, Some(7));
    assert!(status.last_check_time >= 1_700_000_002);

    handle.stop().await;
}

#[tokio::test]
async fn test_focus_rearms_without_alert() {
    let server = MockServer::start().await;
    mount_sequence(&server, &[1, 2]).await;

    let handle = start(&server);

    let status = wait_until(&handle, |s| s.notification_count == 1).await;
    assert_eq!(status.last_total_pending, Some(2));

    handle.focus();
    let status = wait_until(&handle, |s| s.notification_count == 0).await;
    let checks_at_focus = status.checks_completed;

    handle.focus();
    let status = wait_until(&handle, |s| {
        s.has_baseline && s.checks_completed >= checks_at_focus + 3
    })
    .await;
    assert_eq!(status.notification_count, 0);
    assert_eq!(status.last_total_pending, Some(2));

    handle.stop().await;
}

#[tokio::test]
async fn test_rejected_checks_never_set_baseline() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "data": "Permission denied"
        })))
        .mount(&server)
        .await;

    let handle = start(&server);

    let status = wait_until(&handle, |s| s.checks_completed >= 3).await;
    assert!(!status.has_baseline);
    assert_eq!(status.notification_count, 0);
    assert_eq!(status.last_total_pending, None);

    handle.stop().await;
}

#[tokio::test]
async fn test_keeps_polling_through_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(pending(4, 1_700_000_100))
        .mount(&server)
        .await;

    let handle = start(&server);

    let status = wait_until(&handle, |s| s.has_baseline).await;
    assert_eq!(status.last_total_pending, Some(4));
    assert!(status.checks_completed >= 3);

    handle.check_now();
    handle.stop().await;
}

#[tokio::test]
async fn test_detail_rows_reach_list_past_a_bad_row() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("is_background_check=false"))
        .respond_with(pending(3, 1_700_000_000))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("is_background_check=false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": {
                "count": 1,
                "timestamp": 1_700_000_030,
                "total_pending": 4,
                "requests": [
                    { "id": 41, "patient_name": "Jane Doe", "created_at": null },
                    { "id": "not-a-number", "created_at": "2024-05-01 09:31:00" }
                ]
            }
        })))
        .mount(&server)
        .await;

    let surface = Arc::new(RecordingSurface::default());
    let settings = PollerSettings {
        show_requests: true,
        ..settings()
    };
    let handle = start_with(&server, settings, Arc::clone(&surface) as Arc<DynSurface>);

    let status = wait_until(&handle, |s| s.notification_count == 1).await;
    assert_eq!(status.last_total_pending, Some(4));
    assert_eq!(*surface.rows.lock().unwrap(), [41]);

    let checks = status.checks_completed;
    let status = wait_until(&handle, |s| s.checks_completed >= checks + 2).await;
    assert_eq!(status.notification_count, 1);

    handle.stop().await;
}

#[tokio::test]
async fn test_incomplete_success_body_is_ignored() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": { "count": 1 }
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(pending(6, 1_700_000_200))
        .mount(&server)
        .await;

    let handle = start(&server);

    let status = wait_until(&handle, |s| s.has_baseline).await;
    assert!(status.checks_completed >= 3);
    assert_eq!(status.notification_count, 0);
    assert_eq!(status.last_total_pending, Some(6));
    assert_eq!(status.last_check_time, 1_700_000_200);

    handle.stop().await;
}
