// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! End-to-end scenarios against a mock CalDAV server.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use olsync_caldav::{CalDavClient, CalDavConfig};
use olsync_core::{
    build_uid, CancelToken, Config, ExpansionWindow, FetchWindow, RawAppointment, UidClassifier,
    ZonePair,
};
use olsync_engine::{
    encode_event, materialize, EncodeOptions, LifecycleLog, MaterializeParams, Milestone,
    ReconcileTuning, Reconciler, StatusSink, SyncError, SyncService, Tuning,
};
use olsync_outlook::{AutomationHost, BridgeError, BridgeTiming, CalendarSession};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

fn berlin_zones() -> ZonePair {
    let tz: Tz = "Europe/Berlin".parse().unwrap();
    ZonePair {
        source: tz,
        target: tz,
    }
}

fn params() -> MaterializeParams {
    MaterializeParams {
        zones: berlin_zones(),
        source_id: "ACME".to_string(),
        window: FetchWindow {
            from: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            to: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
        },
        expansion: ExpansionWindow {
            from: Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap(),
            to: Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap(),
        },
    }
}

fn caldav_client(server: &MockServer) -> CalDavClient {
    CalDavClient::new(CalDavConfig {
        base_url: server.uri(),
        principal_id: "123456".to_string(),
        calendar_id: "work".to_string(),
        username: "user".to_string(),
        password: "pass".to_string(),
        retry_delay_secs: 0,
        ..CalDavConfig::default()
    })
    .expect("failed to create client")
}

fn reconciler(server: &MockServer) -> Reconciler {
    Reconciler::new(
        caldav_client(server),
        UidClassifier::new("ACME"),
        EncodeOptions {
            tag: String::new(),
            include_second_reminder: true,
        },
        Arc::new(RecordingStatus::default()),
        ReconcileTuning {
            wipe_pacing: StdDuration::ZERO,
            wipe_error_backoff: StdDuration::ZERO,
            ..ReconcileTuning::default()
        },
    )
}

fn event_path(uid: &str) -> String {
    format!("/123456/calendars/work/{uid}.ics")
}

fn multistatus_with(uids: &[&str]) -> String {
    let mut doc = String::from(
        "<?xml version=\"1.0\" encoding=\"utf-8\" ?>\n\
         <D:multistatus xmlns:D=\"DAV:\" xmlns:CS=\"http://calendarserver.org/ns/\">\n\
           <D:response>\n\
             <D:href>/123456/calendars/work/</D:href>\n\
             <D:propstat>\n\
               <D:prop><CS:getctag>ctag</CS:getctag></D:prop>\n\
               <D:status>HTTP/1.1 200 OK</D:status>\n\
             </D:propstat>\n\
           </D:response>\n",
    );
    for uid in uids {
        doc.push_str(&format!(
            "  <D:response>\n\
               <D:href>/123456/calendars/work/{uid}.ics</D:href>\n\
               <D:propstat>\n\
                 <D:prop><D:getetag>\"etag-{uid}\"</D:getetag></D:prop>\n\
                 <D:status>HTTP/1.1 200 OK</D:status>\n\
               </D:propstat>\n\
             </D:response>\n"
        ));
    }
    doc.push_str("</D:multistatus>");
    doc
}

/// Mounts a verify-GET for every desired event, echoing what the encoder
/// would have written.
async fn mount_verify_gets(server: &MockServer, desired: &BTreeMap<String, olsync_core::Event>) {
    let options = EncodeOptions {
        tag: String::new(),
        include_second_reminder: true,
    };
    for (uid, event) in desired {
        Mock::given(method("GET"))
            .and(path(event_path(uid)))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(encode_event(event, uid, &options)),
            )
            .mount(server)
            .await;
    }
}

#[derive(Default)]
struct RecordingStatus {
    transitions: Mutex<Vec<String>>,
}

impl RecordingStatus {
    fn snapshot(&self) -> Vec<String> {
        self.transitions.lock().unwrap().clone()
    }

    fn push(&self, entry: &str) {
        self.transitions.lock().unwrap().push(entry.to_string());
    }
}

impl StatusSink for RecordingStatus {
    fn set_idle(&self) {
        self.push("idle");
    }

    fn set_updating(&self) {
        self.push("updating");
    }

    fn set_deleting(&self) {
        self.push("deleting");
    }

    fn update_text(&self, _text: &str) {}

    fn notify_auth_failure(&self, _detail: &str) {
        self.push("auth-failure");
    }
}

#[derive(Default)]
struct RecordingLifecycle {
    milestones: Mutex<Vec<Milestone>>,
}

impl LifecycleLog for RecordingLifecycle {
    fn record(&self, milestone: Milestone, _detail: &str) {
        self.milestones.lock().unwrap().push(milestone);
    }
}

/// Automation host handing out a fixed appointment list.
struct StaticHost(Vec<RawAppointment>);

struct StaticSession(Vec<RawAppointment>);

impl AutomationHost for StaticHost {
    fn is_running(&mut self) -> bool {
        true
    }

    fn launch(&mut self) -> Result<(), BridgeError> {
        Ok(())
    }

    fn connect(&mut self) -> Result<Box<dyn CalendarSession>, BridgeError> {
        Ok(Box::new(StaticSession(self.0.clone())))
    }
}

impl CalendarSession for StaticSession {
    fn appointments(&mut self, _window: &FetchWindow) -> Result<Vec<RawAppointment>, BridgeError> {
        Ok(self.0.clone())
    }

    fn release(&mut self) {}
}

/// Automation host that is never reachable.
struct DownHost;

impl AutomationHost for DownHost {
    fn is_running(&mut self) -> bool {
        false
    }

    fn launch(&mut self) -> Result<(), BridgeError> {
        Err(BridgeError::Launch("no host".to_string()))
    }

    fn connect(&mut self) -> Result<Box<dyn CalendarSession>, BridgeError> {
        Err(BridgeError::HostUnavailable("no host".to_string()))
    }
}

fn service_config(server: &MockServer) -> Config {
    serde_json::from_value(serde_json::json!({
        "ICloudCalDavUrl": server.uri(),
        "ICloudUser": "user",
        "ICloudPassword": "pass",
        "PrincipalId": "123456",
        "WorkCalendarId": "work",
        "InitialWaitSeconds": 0,
        "SourceId": "ACME",
        "SourceTimeZoneId": "Europe/Berlin",
        "TargetTimeZoneId": "Europe/Berlin",
    }))
    .expect("failed to build config")
}

fn test_tuning() -> Tuning {
    Tuning {
        settle_after_wipe: Some(StdDuration::ZERO),
        reconcile: ReconcileTuning {
            wipe_pacing: StdDuration::ZERO,
            wipe_error_backoff: StdDuration::ZERO,
            ..ReconcileTuning::default()
        },
        bridge: BridgeTiming {
            host_ready_timeout: StdDuration::from_millis(50),
            probe_interval: StdDuration::from_millis(5),
            connect_retries: 1,
            connect_backoff: StdDuration::from_millis(5),
            attach_attempts: 1,
            attach_backoff: StdDuration::from_millis(5),
            fetch_timeout: StdDuration::from_secs(5),
        },
    }
}

#[tokio::test]
async fn single_timed_event_is_uploaded_and_verified() {
    let server = MockServer::start().await;

    let raw = RawAppointment {
        subject: "Standup".to_string(),
        global_id: "G1".to_string(),
        start_local: Some(naive(2025, 2, 3, 9, 0)),
        end_local: Some(naive(2025, 2, 3, 9, 30)),
        ..RawAppointment::default()
    };
    let desired = materialize(&[raw], &params());

    let uid = build_uid(
        "ACME",
        "G1",
        Utc.with_ymd_and_hms(2025, 2, 3, 8, 0, 0).unwrap(),
    );
    assert!(desired.contains_key(&uid));

    Mock::given(method("PUT"))
        .and(path(event_path(&uid)))
        .and(body_string_contains("DTSTART:20250203T080000Z"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    mount_verify_gets(&server, &desired).await;

    let stats = reconciler(&server)
        .reconcile(&desired, &BTreeMap::new(), &CancelToken::new())
        .await
        .expect("reconcile failed");

    assert_eq!(stats.uploaded, 1);
    assert_eq!(stats.verified, 1);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn all_day_event_is_date_valued_without_alarms() {
    let server = MockServer::start().await;

    let raw = RawAppointment {
        subject: "Holiday".to_string(),
        global_id: "G2".to_string(),
        start_local: Some(naive(2025, 2, 10, 0, 0)),
        end_local: Some(naive(2025, 2, 11, 0, 0)),
        is_all_day: true,
        ..RawAppointment::default()
    };
    let desired = materialize(&[raw], &params());
    assert_eq!(desired.len(), 1);

    let uid = desired.keys().next().unwrap().clone();
    assert!(uid.ends_with("-20250210T000000Z"));

    let body = encode_event(
        desired.values().next().unwrap(),
        &uid,
        &EncodeOptions {
            tag: String::new(),
            include_second_reminder: true,
        },
    );
    assert!(body.contains("DTSTART;VALUE=DATE:20250210"));
    assert!(body.contains("DTEND;VALUE=DATE:20250211"));
    assert!(!body.contains("BEGIN:VALARM"));

    Mock::given(method("PUT"))
        .and(path(event_path(&uid)))
        .and(body_string_contains("DTSTART;VALUE=DATE:20250210"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    mount_verify_gets(&server, &desired).await;

    let stats = reconciler(&server)
        .reconcile(&desired, &BTreeMap::new(), &CancelToken::new())
        .await
        .expect("reconcile failed");

    assert_eq!(stats.verified, 1);
}

#[tokio::test]
async fn multi_day_all_day_uploads_one_event_per_day() {
    let server = MockServer::start().await;

    let raw = RawAppointment {
        subject: "Offsite".to_string(),
        global_id: "G3".to_string(),
        start_local: Some(naive(2025, 2, 10, 0, 0)),
        end_local: Some(naive(2025, 2, 13, 0, 0)),
        ..RawAppointment::default()
    };
    let desired = materialize(&[raw], &params());

    let uids: Vec<_> = desired.keys().cloned().collect();
    assert_eq!(uids.len(), 3);
    for (uid, day) in uids.iter().zip(["20250210", "20250211", "20250212"]) {
        assert!(uid.ends_with(&format!("-{day}T000000Z")));
        Mock::given(method("PUT"))
            .and(path(event_path(uid)))
            .and(body_string_contains(format!("DTSTART;VALUE=DATE:{day}")))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
    }
    mount_verify_gets(&server, &desired).await;

    let stats = reconciler(&server)
        .reconcile(&desired, &BTreeMap::new(), &CancelToken::new())
        .await
        .expect("reconcile failed");

    assert_eq!(stats.uploaded, 3);
    assert_eq!(stats.verified, 3);
}

#[tokio::test]
async fn weekly_series_with_exception_yields_expected_uids() {
    use olsync_core::{Frequency, SeriesDescriptor, SeriesException, Termination};

    let raw = RawAppointment {
        subject: "Weekly review".to_string(),
        global_id: "SERIES-1".to_string(),
        start_local: Some(naive(2025, 1, 6, 9, 0)),
        end_local: Some(naive(2025, 1, 6, 9, 30)),
        series: Some(SeriesDescriptor {
            frequency: Frequency::Weekly,
            interval: 1,
            days_of_week: vec![chrono::Weekday::Mon],
            day_of_month: None,
            month_of_year: None,
            instance: None,
            termination: Termination::UntilDate(NaiveDate::from_ymd_opt(2025, 2, 3).unwrap()),
            pattern_start_time: None,
            pattern_end_time: None,
            exceptions: vec![SeriesException {
                original_date: NaiveDate::from_ymd_opt(2025, 1, 20).unwrap(),
                replacement: Some(RawAppointment {
                    subject: "Moved".to_string(),
                    global_id: "SERIES-1".to_string(),
                    start_local: Some(naive(2025, 1, 21, 10, 0)),
                    end_local: Some(naive(2025, 1, 21, 10, 30)),
                    ..RawAppointment::default()
                }),
            }],
        }),
        ..RawAppointment::default()
    };

    let desired = materialize(&[raw], &params());

    assert_eq!(desired.len(), 5);
    let suffixes: Vec<_> = desired
        .keys()
        .map(|uid| uid.rsplit('-').next().unwrap().to_string())
        .collect();
    assert_eq!(
        suffixes,
        vec![
            "20250106T080000Z",
            "20250113T080000Z",
            "20250121T090000Z",
            "20250127T080000Z",
            "20250203T080000Z",
        ]
    );

    let moved = desired
        .iter()
        .find(|(uid, _)| uid.ends_with("-20250121T090000Z"))
        .map(|(_, e)| e)
        .unwrap();
    let body = encode_event(moved, "u", &EncodeOptions::default());
    assert!(body.contains("SUMMARY:Moved"));
}

#[tokio::test]
async fn stale_reap_never_touches_foreign_entries() {
    let server = MockServer::start().await;

    let managed = "ACME-outlook-deadbeef-20250101T080000Z";
    let foreign = "FOREIGN-outlook-cafe-20250101T080000Z";

    Mock::given(method("PROPFIND"))
        .respond_with(
            ResponseTemplate::new(207)
                .set_body_raw(multistatus_with(&[managed, foreign]), "application/xml"),
        )
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(event_path(managed)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(event_path(foreign)))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let reconciler = reconciler(&server);
    // Unfiltered snapshot: the reconciler's own managed check is what
    // protects the foreign entry.
    let current = reconciler
        .snapshot(false, &CancelToken::new())
        .await
        .expect("failed to enumerate");
    assert_eq!(current.len(), 2);

    let stats = reconciler
        .reconcile(&BTreeMap::new(), &current, &CancelToken::new())
        .await
        .expect("reconcile failed");

    assert_eq!(stats.deleted, 1);
}

#[tokio::test]
async fn auth_failure_during_reap_stops_the_cycle() {
    let server = MockServer::start().await;

    let managed = "ACME-outlook-deadbeef-20250101T080000Z";
    let mut current = BTreeMap::new();
    current.insert(managed.to_string(), olsync_caldav::ETag::from("\"e\""));

    Mock::given(method("DELETE"))
        .and(path(event_path(managed)))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    // No upsert may be issued after the auth failure.
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let raw = RawAppointment {
        subject: "Standup".to_string(),
        global_id: "G1".to_string(),
        start_local: Some(naive(2025, 2, 3, 9, 0)),
        end_local: Some(naive(2025, 2, 3, 9, 30)),
        ..RawAppointment::default()
    };
    let desired = materialize(&[raw], &params());
    assert!(!desired.is_empty());

    let err = reconciler(&server)
        .reconcile(&desired, &current, &CancelToken::new())
        .await
        .expect_err("expected auth failure");

    assert!(matches!(err, SyncError::Auth(_)));
}

#[tokio::test]
async fn first_cycle_wipes_managed_entries_only() {
    let server = MockServer::start().await;

    let managed = "ACME-outlook-deadbeef-20250101T080000Z";
    let foreign = "FOREIGN-outlook-cafe-20250101T080000Z";

    Mock::given(method("PROPFIND"))
        .respond_with(
            ResponseTemplate::new(207)
                .set_body_raw(multistatus_with(&[managed, foreign]), "application/xml"),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(event_path(managed)))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(event_path(foreign)))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let status = Arc::new(RecordingStatus::default());
    let service = SyncService::with_tuning(
        service_config(&server),
        Box::new(StaticHost(Vec::new())),
        Arc::clone(&status) as Arc<dyn StatusSink>,
        Arc::new(RecordingLifecycle::default()),
        test_tuning(),
    )
    .expect("failed to build service");

    service.run_once().await;

    let transitions = status.snapshot();
    assert!(transitions.contains(&"deleting".to_string()));
    assert_eq!(transitions.last().map(String::as_str), Some("idle"));
}

#[tokio::test]
async fn source_outage_suppresses_the_stale_reap() {
    let server = MockServer::start().await;

    let managed = "ACME-outlook-deadbeef-20250101T080000Z";

    Mock::given(method("PROPFIND"))
        .respond_with(
            ResponseTemplate::new(207)
                .set_body_raw(multistatus_with(&[managed]), "application/xml"),
        )
        // Only the first-run wipe enumerates; the outage cycle never does.
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(event_path(managed)))
        .respond_with(ResponseTemplate::new(204))
        // Exactly the first-run wipe delete; no reap without source data.
        .expect(1)
        .mount(&server)
        .await;

    let service = SyncService::with_tuning(
        service_config(&server),
        Box::new(DownHost),
        Arc::new(RecordingStatus::default()),
        Arc::new(RecordingLifecycle::default()),
        test_tuning(),
    )
    .expect("failed to build service");

    // First cycle: filtered wipe runs, then the fetch fails and the cycle
    // ends without reconciling.
    service.run_once().await;
    // Second cycle: still no source; nothing may be enumerated or deleted.
    service.run_once().await;
}

#[tokio::test]
async fn full_resync_wipes_foreign_entries_too() {
    let server = MockServer::start().await;

    let managed = "ACME-outlook-deadbeef-20250101T080000Z";
    let foreign = "FOREIGN-outlook-cafe-20250101T080000Z";

    Mock::given(method("PROPFIND"))
        .respond_with(
            ResponseTemplate::new(207)
                .set_body_raw(multistatus_with(&[managed, foreign]), "application/xml"),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(event_path(managed)))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(event_path(foreign)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let service = SyncService::with_tuning(
        service_config(&server),
        Box::new(StaticHost(Vec::new())),
        Arc::new(RecordingStatus::default()),
        Arc::new(RecordingLifecycle::default()),
        test_tuning(),
    )
    .expect("failed to build service");

    service.trigger_full_resync().await;
}

#[tokio::test]
async fn shutdown_interrupts_the_loop() {
    let server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .respond_with(
            ResponseTemplate::new(207).set_body_raw(multistatus_with(&[]), "application/xml"),
        )
        .mount(&server)
        .await;

    let mut config = service_config(&server);
    config.initial_wait_seconds = 3600;

    let service = SyncService::with_tuning(
        config,
        Box::new(StaticHost(Vec::new())),
        Arc::new(RecordingStatus::default()),
        Arc::new(RecordingLifecycle::default()),
        test_tuning(),
    )
    .expect("failed to build service");

    let runner = service.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    tokio::time::sleep(StdDuration::from_millis(50)).await;
    service.shutdown();

    tokio::time::timeout(StdDuration::from_secs(2), handle)
        .await
        .expect("run did not return after shutdown")
        .unwrap();
}
