//! Tests for the dispatch policy table.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::*;
use crate::providers::{
    AgentReply, AgentStatus, CaptureProvider, NotificationProvider, OverlayPresenter,
    PermissionProvider, RemoteAgent, ShellProvider,
};

/// One fake standing in for every provider, recording what was asked of it.
#[derive(Default)]
struct Fake {
    notify_authorized: AtomicBool,
    notify_calls: AtomicUsize,
    last_sound: Mutex<Option<String>>,
    overlay_calls: AtomicUsize,
    granted: Mutex<HashMap<Capability, bool>>,
    permission_calls: Mutex<Vec<(Vec<Capability>, bool)>>,
    capture_result: Mutex<Option<Vec<u8>>>,
    capture_calls: AtomicUsize,
    shell_calls: Mutex<Vec<(Vec<String>, Option<Duration>)>>,
    agent_reply: Mutex<AgentReply>,
    agent_messages: Mutex<Vec<AgentMessage>>,
    agent_status: Mutex<AgentStatus>,
    status_calls: AtomicUsize,
}

impl Fake {
    fn grant(&self, cap: Capability, granted: bool) {
        self.granted.lock().unwrap().insert(cap, granted);
    }
}

#[async_trait]
impl NotificationProvider for Fake {
    async fn send(&self, _: &str, _: &str, sound: Option<&str>, _: Option<Priority>) -> bool {
        self.notify_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_sound.lock().unwrap() = sound.map(str::to_string);
        self.notify_authorized.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OverlayPresenter for Fake {
    async fn present(&self, _: &str, _: &str) {
        self.overlay_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PermissionProvider for Fake {
    async fn ensure(&self, caps: &[Capability], interactive: bool) -> HashMap<Capability, bool> {
        self.permission_calls
            .lock()
            .unwrap()
            .push((caps.to_vec(), interactive));
        let granted = self.granted.lock().unwrap();
        caps.iter()
            .filter_map(|cap| granted.get(cap).map(|g| (*cap, *g)))
            .collect()
    }
}

#[async_trait]
impl CaptureProvider for Fake {
    async fn capture(&self, _: Option<u32>, _: Option<u32>) -> Option<Vec<u8>> {
        self.capture_calls.fetch_add(1, Ordering::SeqCst);
        self.capture_result.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShellProvider for Fake {
    async fn run(
        &self,
        command: &[String],
        _: Option<&str>,
        _: Option<&BTreeMap<String, String>>,
        timeout: Option<Duration>,
    ) -> Response {
        self.shell_calls
            .lock()
            .unwrap()
            .push((command.to_vec(), timeout));
        Response {
            ok: false,
            message: Some("exit status 3".to_string()),
            payload: Some(b"partial".to_vec()),
        }
    }
}

#[async_trait]
impl RemoteAgent for Fake {
    async fn send(&self, message: AgentMessage) -> AgentReply {
        self.agent_messages.lock().unwrap().push(message);
        self.agent_reply.lock().unwrap().clone()
    }

    async fn status(&self) -> AgentStatus {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.agent_status.lock().unwrap().clone()
    }
}

fn setup() -> (Dispatcher, Arc<Fake>, PauseFlag) {
    let fake = Arc::new(Fake::default());
    let providers = Providers {
        notifications: fake.clone(),
        overlay: fake.clone(),
        permissions: fake.clone(),
        capture: fake.clone(),
        shell: fake.clone(),
        agent: fake.clone(),
    };
    let pause = PauseFlag::default();
    (Dispatcher::new(providers, Arc::new(pause.clone())), fake, pause)
}

fn notify(delivery: Option<Delivery>) -> Request {
    Request::Notify {
        title: "Deploy".into(),
        body: "finished".into(),
        sound: None,
        priority: None,
        delivery,
    }
}

fn agent(message: &str, session: Option<&str>) -> Request {
    Request::Agent {
        message: message.into(),
        thinking: None,
        session: session.map(str::to_string),
        deliver: false,
        to: None,
    }
}

fn all_variants() -> Vec<Request> {
    vec![
        notify(Some(Delivery::Overlay)),
        Request::EnsurePermissions {
            caps: vec![Capability::Notifications],
            interactive: true,
        },
        Request::Screenshot {
            display_id: None,
            window_id: None,
            format: "png".into(),
        },
        Request::RunShell {
            command: vec!["true".into()],
            cwd: None,
            env: None,
            timeout_sec: None,
            needs_screen_recording: false,
        },
        Request::Status,
        Request::RpcStatus,
        agent("hello", None),
    ]
}

// === Pause gate ===

#[tokio::test]
async fn test_paused_refuses_every_variant_without_touching_providers() {
    let (dispatcher, fake, pause) = setup();
    pause.pause();

    for request in all_variants() {
        let kind = request.kind();
        let response = dispatcher.dispatch(request).await;
        assert_eq!(response, Response::error("paused"), "variant {kind}");
    }

    assert_eq!(fake.overlay_calls.load(Ordering::SeqCst), 0);
    assert_eq!(fake.capture_calls.load(Ordering::SeqCst), 0);
    assert_eq!(fake.status_calls.load(Ordering::SeqCst), 0);
    assert!(fake.permission_calls.lock().unwrap().is_empty());
    assert!(fake.shell_calls.lock().unwrap().is_empty());
    assert!(fake.agent_messages.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_resume_reopens_the_gate() {
    let (dispatcher, _fake, pause) = setup();
    pause.pause();
    assert!(!dispatcher.dispatch(Request::Status).await.ok);

    pause.resume();
    assert_eq!(
        dispatcher.dispatch(Request::Status).await,
        Response::ok_with_message("ready")
    );
}

// === notify ===

#[tokio::test]
async fn test_notify_defaults_to_system() {
    let (dispatcher, fake, _) = setup();
    fake.notify_authorized.store(true, Ordering::SeqCst);

    let response = dispatcher.dispatch(notify(None)).await;
    assert_eq!(response, Response::ok());
    assert_eq!(fake.notify_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fake.overlay_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_notify_system_unauthorized_fails() {
    let (dispatcher, fake, _) = setup();

    let response = dispatcher.dispatch(notify(Some(Delivery::System))).await;
    assert_eq!(response, Response::error("notification not authorized"));
    assert_eq!(fake.overlay_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_notify_overlay_bypasses_system() {
    let (dispatcher, fake, _) = setup();

    let response = dispatcher.dispatch(notify(Some(Delivery::Overlay))).await;
    assert_eq!(response, Response::ok());
    assert_eq!(fake.notify_calls.load(Ordering::SeqCst), 0);
    assert_eq!(fake.overlay_calls.load(Ordering::SeqCst), 1);
    assert!(fake.permission_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_notify_auto_falls_back_to_overlay() {
    let (dispatcher, fake, _) = setup();

    let response = dispatcher.dispatch(notify(Some(Delivery::Auto))).await;
    assert!(response.ok, "auto delivery must never fail");
    assert_eq!(
        response.message.as_deref(),
        Some("notification not authorized; used overlay")
    );
    assert_eq!(fake.notify_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fake.overlay_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_notify_auto_uses_system_when_authorized() {
    let (dispatcher, fake, _) = setup();
    fake.notify_authorized.store(true, Ordering::SeqCst);

    let response = dispatcher.dispatch(notify(Some(Delivery::Auto))).await;
    assert_eq!(response, Response::ok());
    assert_eq!(fake.overlay_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_notify_trims_sound_and_drops_blank() {
    let (dispatcher, fake, _) = setup();
    fake.notify_authorized.store(true, Ordering::SeqCst);

    let request = Request::Notify {
        title: "t".into(),
        body: "b".into(),
        sound: Some("  Glass \n".into()),
        priority: Some(Priority::Active),
        delivery: None,
    };
    dispatcher.dispatch(request).await;
    assert_eq!(fake.last_sound.lock().unwrap().as_deref(), Some("Glass"));

    let request = Request::Notify {
        title: "t".into(),
        body: "b".into(),
        sound: Some("   ".into()),
        priority: None,
        delivery: None,
    };
    dispatcher.dispatch(request).await;
    assert_eq!(fake.last_sound.lock().unwrap().as_deref(), None);
}

// === ensurePermissions ===

#[tokio::test]
async fn test_ensure_permissions_reports_missing() {
    let (dispatcher, fake, _) = setup();
    fake.grant(Capability::Notifications, true);
    fake.grant(Capability::Accessibility, false);

    let response = dispatcher
        .dispatch(Request::EnsurePermissions {
            caps: vec![Capability::Notifications, Capability::Accessibility],
            interactive: true,
        })
        .await;
    assert_eq!(response, Response::error("missing: accessibility"));

    let calls = fake.permission_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].1, "interactive flag must be forwarded");
}

#[tokio::test]
async fn test_ensure_permissions_all_granted() {
    let (dispatcher, fake, _) = setup();
    fake.grant(Capability::Microphone, true);

    let response = dispatcher
        .dispatch(Request::EnsurePermissions {
            caps: vec![Capability::Microphone, Capability::Microphone],
            interactive: false,
        })
        .await;
    assert_eq!(response, Response::ok_with_message("all granted"));
    assert_eq!(
        fake.permission_calls.lock().unwrap()[0].0,
        vec![Capability::Microphone],
        "duplicates are collapsed"
    );
}

#[tokio::test]
async fn test_ensure_permissions_empty_set_checks_everything() {
    let (dispatcher, fake, _) = setup();
    for cap in Capability::ALL {
        fake.grant(cap, cap != Capability::ScreenRecording && cap != Capability::SpeechRecognition);
    }

    let response = dispatcher
        .dispatch(Request::EnsurePermissions {
            caps: Vec::new(),
            interactive: false,
        })
        .await;
    assert_eq!(
        response,
        Response::error("missing: screen-recording, speech-recognition")
    );
    assert_eq!(fake.permission_calls.lock().unwrap()[0].0, Capability::ALL.to_vec());
}

#[tokio::test]
async fn test_ensure_permissions_unreported_capability_is_missing() {
    let (dispatcher, _fake, _) = setup();

    let response = dispatcher
        .dispatch(Request::EnsurePermissions {
            caps: vec![Capability::Automation],
            interactive: false,
        })
        .await;
    assert_eq!(response, Response::error("missing: automation"));
}

// === screenshot ===

#[tokio::test]
async fn test_screenshot_denied_never_captures() {
    let (dispatcher, fake, _) = setup();
    fake.grant(Capability::ScreenRecording, false);
    *fake.capture_result.lock().unwrap() = Some(b"png".to_vec());

    let response = dispatcher
        .dispatch(Request::Screenshot {
            display_id: Some(1),
            window_id: None,
            format: "png".into(),
        })
        .await;
    assert_eq!(response, Response::error("screen recording permission missing"));
    assert_eq!(fake.capture_calls.load(Ordering::SeqCst), 0);

    let calls = fake.permission_calls.lock().unwrap();
    assert_eq!(calls.as_slice(), &[(vec![Capability::ScreenRecording], false)]);
}

#[tokio::test]
async fn test_screenshot_returns_payload() {
    let (dispatcher, fake, _) = setup();
    fake.grant(Capability::ScreenRecording, true);
    let png = vec![0x89, b'P', b'N', b'G', 0, 1, 2];
    *fake.capture_result.lock().unwrap() = Some(png.clone());

    let response = dispatcher
        .dispatch(Request::Screenshot {
            display_id: None,
            window_id: Some(42),
            format: "png".into(),
        })
        .await;
    assert_eq!(response, Response::ok_with_payload(png));
    assert_eq!(fake.capture_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_screenshot_capture_failure() {
    let (dispatcher, fake, _) = setup();
    fake.grant(Capability::ScreenRecording, true);

    let response = dispatcher
        .dispatch(Request::Screenshot {
            display_id: None,
            window_id: None,
            format: "png".into(),
        })
        .await;
    assert_eq!(response, Response::error("screenshot failed"));
}

// === runShell ===

#[tokio::test]
async fn test_run_shell_returns_provider_response_verbatim() {
    let (dispatcher, fake, _) = setup();

    let response = dispatcher
        .dispatch(Request::RunShell {
            command: vec!["make".into(), "test".into()],
            cwd: None,
            env: None,
            timeout_sec: Some(1.5),
            needs_screen_recording: false,
        })
        .await;
    assert_eq!(
        response,
        Response {
            ok: false,
            message: Some("exit status 3".into()),
            payload: Some(b"partial".to_vec()),
        }
    );

    let calls = fake.shell_calls.lock().unwrap();
    assert_eq!(calls[0].0, vec!["make".to_string(), "test".to_string()]);
    assert_eq!(calls[0].1, Some(Duration::from_millis(1500)));
    assert!(
        fake.permission_calls.lock().unwrap().is_empty(),
        "no gate without needsScreenRecording"
    );
}

#[tokio::test]
async fn test_run_shell_screen_recording_gate() {
    let (dispatcher, fake, _) = setup();
    fake.grant(Capability::ScreenRecording, false);

    let request = Request::RunShell {
        command: vec!["screencapture".into()],
        cwd: None,
        env: None,
        timeout_sec: None,
        needs_screen_recording: true,
    };
    let response = dispatcher.dispatch(request.clone()).await;
    assert_eq!(response, Response::error("screen recording permission missing"));
    assert!(fake.shell_calls.lock().unwrap().is_empty());

    fake.grant(Capability::ScreenRecording, true);
    dispatcher.dispatch(request).await;
    assert_eq!(fake.shell_calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_run_shell_negative_timeout_is_absent() {
    let (dispatcher, fake, _) = setup();

    dispatcher
        .dispatch(Request::RunShell {
            command: vec!["true".into()],
            cwd: None,
            env: None,
            timeout_sec: Some(-1.0),
            needs_screen_recording: false,
        })
        .await;
    assert_eq!(fake.shell_calls.lock().unwrap()[0].1, None);
}

// === agent ===

#[tokio::test]
async fn test_agent_blank_message_never_contacts_remote() {
    let (dispatcher, fake, _) = setup();

    let response = dispatcher.dispatch(agent("   ", None)).await;
    assert_eq!(response, Response::error("message empty"));
    assert!(fake.agent_messages.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_agent_defaults_session_and_trims_text() {
    let (dispatcher, fake, _) = setup();
    *fake.agent_reply.lock().unwrap() = AgentReply {
        ok: true,
        text: None,
        error: None,
    };

    let response = dispatcher.dispatch(agent("  status report \n", None)).await;
    assert_eq!(response, Response::ok_with_message("sent"));

    let messages = fake.agent_messages.lock().unwrap();
    assert_eq!(messages[0].text, "status report");
    assert_eq!(messages[0].session_key, "main");
}

#[tokio::test]
async fn test_agent_forwards_fields_and_reply_text() {
    let (dispatcher, fake, _) = setup();
    *fake.agent_reply.lock().unwrap() = AgentReply {
        ok: true,
        text: Some("on it".into()),
        error: None,
    };

    let response = dispatcher
        .dispatch(Request::Agent {
            message: "deploy".into(),
            thinking: Some(Thinking::Low),
            session: Some("ops".into()),
            deliver: true,
            to: Some("alice".into()),
        })
        .await;
    assert_eq!(response, Response::ok_with_message("on it"));

    let messages = fake.agent_messages.lock().unwrap();
    assert_eq!(
        messages[0],
        AgentMessage {
            text: "deploy".into(),
            thinking: Some(Thinking::Low),
            session_key: "ops".into(),
            deliver: true,
            to: Some("alice".into()),
        }
    );
}

#[tokio::test]
async fn test_agent_failure_messages() {
    let (dispatcher, fake, _) = setup();
    *fake.agent_reply.lock().unwrap() = AgentReply {
        ok: false,
        text: None,
        error: Some("gateway timeout".into()),
    };
    assert_eq!(
        dispatcher.dispatch(agent("hi", Some(""))).await,
        Response::error("gateway timeout")
    );
    assert_eq!(fake.agent_messages.lock().unwrap()[0].session_key, "main");

    *fake.agent_reply.lock().unwrap() = AgentReply::default();
    assert_eq!(
        dispatcher.dispatch(agent("hi", None)).await,
        Response::error("failed to send")
    );
}

// === status / rpcStatus ===

#[tokio::test]
async fn test_status_is_ready() {
    let (dispatcher, _, _) = setup();
    assert_eq!(
        dispatcher.dispatch(Request::Status).await,
        Response::ok_with_message("ready")
    );
}

#[tokio::test]
async fn test_rpc_status_propagates_probe() {
    let (dispatcher, fake, _) = setup();

    *fake.agent_status.lock().unwrap() = AgentStatus { ok: true, error: None };
    assert_eq!(dispatcher.dispatch(Request::RpcStatus).await, Response::ok());

    *fake.agent_status.lock().unwrap() = AgentStatus {
        ok: false,
        error: Some("connection refused".into()),
    };
    assert_eq!(
        dispatcher.dispatch(Request::RpcStatus).await,
        Response::error("connection refused")
    );
    assert_eq!(fake.status_calls.load(Ordering::SeqCst), 2);
}

// === Providers::unavailable ===

#[tokio::test]
async fn test_unavailable_providers_fail_closed() {
    let dispatcher = Dispatcher::new(Providers::unavailable(), Arc::new(PauseFlag::default()));

    let response = dispatcher
        .dispatch(Request::Screenshot {
            display_id: None,
            window_id: None,
            format: "png".into(),
        })
        .await;
    assert_eq!(response, Response::error("screen recording permission missing"));

    let response = dispatcher.dispatch(notify(Some(Delivery::Auto))).await;
    assert!(response.ok);

    let response = dispatcher.dispatch(Request::RpcStatus).await;
    assert_eq!(response, Response::error("agent gateway unavailable"));
}
