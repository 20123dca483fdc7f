//! End-to-end tests of the HTTP surface against the simulated engine.

use std::net::SocketAddr;

use reqwest::{header, Client, Method, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use chorus_server::native::simulated::{PushedCommand, SimulatedVoice};
use chorus_server::{router, Gateway, SimulatedEngine};

fn voices() -> Vec<SimulatedVoice> {
    vec![
        SimulatedVoice::new("voice-a", "Voice A", "en-US"),
        SimulatedVoice::new("voice-b", "Voice B", "fr-FR"),
    ]
}

/// A server bound to an ephemeral port
struct TestServer {
    addr: SocketAddr,
    client: Client,
    _handle: JoinHandle<()>,
}

impl TestServer {
    fn url(&self, uri: &str) -> String {
        format!("http://{}{}", self.addr, uri)
    }
}

async fn start_server(engine: SimulatedEngine) -> TestServer {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = router(Gateway::new(engine));
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        addr,
        client: Client::new(),
        _handle: handle,
    }
}

/// Server plus a recording handle on the engine behind it
async fn app_with(engine: SimulatedEngine) -> (TestServer, SimulatedEngine) {
    let engine = engine.recording();
    let server = start_server(engine.clone()).await;
    (server, engine)
}

async fn app() -> (TestServer, SimulatedEngine) {
    app_with(SimulatedEngine::new(voices())).await
}

async fn send(app: &TestServer, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = app.client.request(method, app.url(uri));
    if let Some(value) = body {
        request = request.body(value.to_string());
    }

    let response = request.send().await.expect("response");
    let status = response.status();
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json",
        "{} {} must answer JSON",
        status,
        uri
    );

    let value = response.json().await.expect("JSON body");
    (status, value)
}

async fn enable(app: &TestServer) {
    let (status, _) = send(app, Method::GET, "/v1/audio/enable", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn command_batch_reaches_engine_in_order() {
    let (app, engine) = app().await;
    enable(&app).await;

    let batch = json!({
        "commands": [
            {"type": 1, "value": 2},
            {"type": 2, "value": 0.3},
            {"type": 3, "value": "Hello, 世界"},
            {"type": 4, "value": "<speak>hi</speak>"}
        ]
    });
    let (status, body) = send(&app, Method::POST, "/v1/audio/command?force", Some(batch)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    let pushed = engine.pushed();
    assert_eq!(pushed.len(), 1);
    assert!(pushed[0].force);
    assert_eq!(
        pushed[0].commands,
        vec![
            PushedCommand::PlaySound(2),
            PushedCommand::Wait(0.3),
            PushedCommand::SpeakText("Hello, 世界".to_string()),
            PushedCommand::SpeakSsml("<speak>hi</speak>".to_string()),
        ]
    );
}

#[tokio::test]
async fn batch_without_force_appends() {
    let (app, engine) = app().await;
    enable(&app).await;

    let batch = json!({"commands": [{"type": 2, "value": 1}]});
    let (status, _) = send(&app, Method::POST, "/v1/audio/command", Some(batch)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(!engine.pushed()[0].force);
}

#[tokio::test]
async fn empty_batch_makes_no_native_call() {
    let (app, engine) = app().await;

    let (status, body) = send(&app, Method::POST, "/v1/audio/command", Some(json!({"commands": []}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn unknown_command_type_rejects_the_whole_batch() {
    let (app, engine) = app().await;
    enable(&app).await;

    let batch = json!({
        "commands": [
            {"type": 3, "value": "fine"},
            {"type": 99, "value": 1}
        ]
    });
    let (status, body) = send(&app, Method::POST, "/v1/audio/command", Some(batch)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("unknown command type 99"));
    assert_eq!(engine.calls(), vec!["Setup"]);
    assert!(engine.pushed().is_empty());
}

#[tokio::test]
async fn untranscodable_text_rejects_the_whole_batch() {
    let (app, engine) = app().await;
    enable(&app).await;

    let batch = json!({
        "commands": [
            {"type": 2, "value": 0.5},
            {"type": 3, "value": "a\u{0000}b"}
        ]
    });
    let (status, body) = send(&app, Method::POST, "/v1/audio/command", Some(batch)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("Command 1 cannot be encoded"));
    assert_eq!(engine.calls(), vec!["Setup"]);
    assert!(engine.pushed().is_empty());
}

#[tokio::test]
async fn mismatched_payload_is_rejected() {
    let (app, engine) = app().await;
    enable(&app).await;

    let batch = json!({"commands": [{"type": 1, "value": "loud"}]});
    let (status, body) = send(&app, Method::POST, "/v1/audio/command", Some(batch)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("Command 0 is invalid"));
    assert!(engine.pushed().is_empty());
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let (app, _) = app().await;

    let response = app
        .client
        .post(app.url("/v1/audio/command"))
        .body("{\"commands\": [")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().starts_with("Requested JSON is invalid"));
}

#[tokio::test]
async fn engine_failure_surfaces_as_error_envelope() {
    let (app, engine) = app().await;
    enable(&app).await;
    engine.fail_on("Push");

    let batch = json!({"commands": [{"type": 3, "value": "hi"}]});
    let (status, body) = send(&app, Method::POST, "/v1/audio/command", Some(batch)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"message": "Failed to call Push"}));
}

#[tokio::test]
async fn push_before_enable_fails() {
    let (app, _) = app().await;

    let batch = json!({"commands": [{"type": 2, "value": 0.1}]});
    let (status, _) = send(&app, Method::POST, "/v1/audio/command", Some(batch)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn lifecycle_endpoints_drive_the_engine() {
    let (app, engine) = app().await;

    enable(&app).await;
    assert!(engine.is_active());

    let (status, _) = send(&app, Method::GET, "/v1/audio/pause", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(engine.is_faded_out());

    let (status, _) = send(&app, Method::GET, "/v1/audio/restart", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!engine.is_faded_out());

    let (status, _) = send(&app, Method::GET, "/v1/audio/disable", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!engine.is_active());

    assert_eq!(engine.calls(), vec!["Setup", "FadeOut", "FadeIn", "Teardown"]);
}

#[tokio::test]
async fn enabling_twice_is_an_error() {
    let (app, _) = app().await;
    enable(&app).await;

    let (status, body) = send(&app, Method::GET, "/v1/audio/enable", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Failed to call Setup");
}

#[tokio::test]
async fn voices_are_enumerated() {
    let (app, _) = app_with(SimulatedEngine::new(voices()).with_default_voice(1)).await;

    let (status, body) = send(&app, Method::GET, "/v1/voices", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "defaultVoiceIndex": 1,
            "voices": [
                {
                    "id": "voice-a",
                    "displayName": "Voice A",
                    "language": "en-US",
                    "speakingRate": 1.0,
                    "audioPitch": 1.0,
                    "audioVolume": 1.0
                },
                {
                    "id": "voice-b",
                    "displayName": "Voice B",
                    "language": "fr-FR",
                    "speakingRate": 1.0,
                    "audioPitch": 1.0,
                    "audioVolume": 1.0
                }
            ]
        })
    );
}

#[tokio::test]
async fn no_voices_is_not_an_error() {
    let (app, _) = app_with(SimulatedEngine::new(Vec::new())).await;

    let (status, body) = send(&app, Method::GET, "/v1/voices", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"defaultVoiceIndex": 0, "voices": []}));
}

#[tokio::test]
async fn voice_enumeration_failure_is_not_partial() {
    let (app, engine) = app().await;
    engine.fail_on("GetAudioVolume");

    let (status, body) = send(&app, Method::GET, "/v1/voices", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"message": "Failed to call GetAudioVolume"}));
}

#[tokio::test]
async fn voice_update_skips_sentinel_fields() {
    let (app, _) = app().await;

    let update = json!({"speakingRate": -1, "audioPitch": 0.5});
    let (status, body) = send(&app, Method::POST, "/v1/voice?index=0", Some(update)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    let (_, voices) = send(&app, Method::GET, "/v1/voices", None).await;
    assert_eq!(voices["voices"][0]["audioPitch"], 0.5);
    assert_eq!(voices["voices"][0]["speakingRate"], 1.0);
    assert_eq!(voices["voices"][1]["audioPitch"], 1.0);
}

#[tokio::test]
async fn voice_update_accepts_zero() {
    let (app, engine) = app().await;

    let update = json!({"audioVolume": 0.0});
    let (status, _) = send(&app, Method::POST, "/v1/voice?index=1", Some(update)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(engine.voice(1).unwrap().audio_volume, 0.0);
}

#[tokio::test]
async fn voice_update_requires_index() {
    let (app, engine) = app().await;

    let (status, body) = send(&app, Method::POST, "/v1/voice", Some(json!({"audioPitch": 1.0}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"message": "Query parameter 'index' is missing"}));
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn voice_update_rejects_non_numeric_index() {
    let (app, _) = app().await;

    let (status, body) = send(&app, Method::POST, "/v1/voice?index=first", Some(json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"message": "Query parameter 'index' must be a number"}));
}

#[tokio::test]
async fn voice_update_reports_the_failing_field() {
    let (app, engine) = app().await;
    engine.fail_on("SetAudioVolume");

    let update = json!({"speakingRate": 1.5, "audioVolume": 0.2});
    let (status, body) = send(&app, Method::POST, "/v1/voice?index=0", Some(update)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"message": "Failed to call SetAudioVolume (voice 0)"}));
    assert_eq!(engine.voice(0).unwrap().speaking_rate, 1.5);
}

#[tokio::test]
async fn relative_adjustments_target_the_default_voice() {
    let (app, engine) = app_with(SimulatedEngine::new(voices()).with_default_voice(1)).await;

    let (status, _) = send(&app, Method::POST, "/v1/voice/rate?diff=0.5", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::POST, "/v1/voice/pitch?diff=-0.25", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::POST, "/v1/voice/volume?diff=0", None).await;
    assert_eq!(status, StatusCode::OK);

    let voice = engine.voice(1).unwrap();
    assert_eq!(voice.speaking_rate, 1.5);
    assert_eq!(voice.audio_pitch, 0.75);
    assert_eq!(voice.audio_volume, 1.0);
    assert_eq!(engine.voice(0).unwrap().speaking_rate, 1.0);
    assert!(!engine.calls().contains(&"SetAudioVolume"));
}

#[tokio::test]
async fn relative_adjustment_requires_diff() {
    let (app, _) = app().await;

    let (status, body) = send(&app, Method::POST, "/v1/voice/rate", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"message": "Query parameter 'diff' is missing"}));
}

#[tokio::test]
async fn default_voice_can_be_changed() {
    let (app, engine) = app().await;

    let (status, _) = send(&app, Method::POST, "/v1/voice/default?index=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(engine.default_voice_index(), 1);

    let (status, _) = send(&app, Method::POST, "/v1/voice/default?index=7", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_routes_answer_404_envelope() {
    let (app, _) = app().await;

    let (status, body) = send(&app, Method::GET, "/v1/nothing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"message": "404 Not found"}));

    let (status, body) = send(&app, Method::GET, "/v1/audio/command", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"message": "404 Not found"}));
}

#[tokio::test]
async fn gateway_shutdown_tears_down_once() {
    let engine = SimulatedEngine::new(voices()).recording();
    let gateway = Gateway::new(engine.clone());

    gateway.shutdown().await;
    assert!(engine.calls().is_empty());

    gateway.enable().await.unwrap();
    assert!(gateway.is_enabled().await.unwrap());
    gateway.shutdown().await;
    assert!(!gateway.is_enabled().await.unwrap());
    assert_eq!(engine.calls(), vec!["Setup", "Teardown"]);
}

#[tokio::test]
async fn enabled_check_waits_without_blocking_the_runtime() {
    let gateway = Gateway::new(SimulatedEngine::new(voices()));
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let (held_tx, held_rx) = tokio::sync::oneshot::channel::<()>();

    let holder = gateway.clone();
    let hold = tokio::spawn(async move {
        holder
            .call(move |_engine| {
                let _ = held_tx.send(());
                let _ = release_rx.recv();
                Ok(())
            })
            .await
    });
    held_rx.await.unwrap();

    let checker = gateway.clone();
    let check = tokio::spawn(async move { checker.is_enabled().await });
    tokio::task::yield_now().await;

    // Only reachable if the pending check left the runtime free
    release_tx.send(()).unwrap();
    hold.await.unwrap().unwrap();
    assert!(!check.await.unwrap().unwrap());
}
