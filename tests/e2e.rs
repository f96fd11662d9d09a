//! End-to-end: device capture loop → HTTP → relay service → vision provider
//!
//! Uses a scripted station and camera (no Wi-Fi, no hardware) and a stub
//! vision provider behind the real relay router on an ephemeral port.
//!
//! Run: `cargo test --test e2e`

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::{json, Value};

use veri_cam::capture::CameraProfile;
use veri_cam::config::{RelayClientConfig, WifiCredentials};
use veri_cam::network::StationError;
use veri_cam::server::{relay, ProviderError, RelayState, VisionProvider, VisionRequest};
use veri_cam::{
    CameraDriver, CameraResource, CaptureLoop, CycleOutcome, HardwareError,
    NetworkAssociationManager, RelayClient, RelayError, StationInterface,
};

const SECRET: &str = "e2e-secret";

// ── Scripted device side ─────────────────────────────────────────────

struct ReadyStation;

#[async_trait::async_trait]
impl StationInterface for ReadyStation {
    async fn is_active(&mut self) -> Result<bool, StationError> {
        Ok(true)
    }
    async fn activate(&mut self) -> Result<(), StationError> {
        Ok(())
    }
    async fn connect(&mut self, _: &WifiCredentials) -> Result<(), StationError> {
        Ok(())
    }
    async fn is_connected(&mut self) -> Result<bool, StationError> {
        Ok(true)
    }
}

/// Camera returning a 5000-byte JPEG-shaped buffer on every grab
struct FixedCamera;

#[async_trait::async_trait]
impl CameraDriver for FixedCamera {
    async fn init(&mut self, _: &CameraProfile) -> Result<(), HardwareError> {
        Ok(())
    }
    async fn deinit(&mut self) -> Result<(), HardwareError> {
        Ok(())
    }
    async fn grab(&mut self) -> Result<Option<Bytes>, HardwareError> {
        let mut data = vec![0x42; 5000];
        data[..2].copy_from_slice(&[0xFF, 0xD8]);
        data[4998..].copy_from_slice(&[0xFF, 0xD9]);
        Ok(Some(Bytes::from(data)))
    }
}

// ── Relay side ───────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct CountingProvider {
    calls: Arc<AtomicUsize>,
    image_len: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl VisionProvider for CountingProvider {
    async fn describe(&self, request: VisionRequest) -> Result<Value, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.image_len
            .store(request.image_base64.len(), Ordering::SeqCst);
        Ok(json!({
            "output": [{ "content": [{ "type": "output_text", "text": " uma xícara de café " }] }]
        }))
    }
}

async fn start_relay(provider: CountingProvider) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = RelayState::new(provider).with_shared_secret(Some(SECRET.into()));
    tokio::spawn(async move {
        axum::serve(listener, relay::router(state)).await.unwrap();
    });
    addr
}

fn device(addr: SocketAddr, api_key: &str, interval: Duration) -> CaptureLoop<ReadyStation, FixedCamera> {
    let network = NetworkAssociationManager::new(
        ReadyStation,
        WifiCredentials {
            ssid: "lab".into(),
            password: "pw".into(),
        },
    );
    let relay = RelayClient::new(RelayClientConfig {
        endpoint: format!("http://{}/analyze", addr),
        api_key: Some(api_key.to_string()),
        ..Default::default()
    })
    .unwrap();
    CaptureLoop::new(network, CameraResource::new(FixedCamera), relay, interval)
}

// ── Tests ────────────────────────────────────────────────────────────

/// One frame travels the full path and the trimmed description comes back.
#[tokio::test(flavor = "multi_thread")]
async fn frame_is_described_end_to_end() {
    let provider = CountingProvider::default();
    let addr = start_relay(provider.clone()).await;

    let mut device = device(addr, SECRET, Duration::from_secs(12));
    device.start().await.unwrap();

    let report = device.cycle().await;
    match &report.outcome {
        CycleOutcome::Described {
            frame_bytes,
            description,
        } => {
            assert_eq!(*frame_bytes, 5000);
            assert_eq!(description.as_str(), "uma xícara de café");
        }
        other => panic!("expected Described, got {:?}", other),
    }
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    // 5000 bytes → 6668 base64 characters (padded)
    assert_eq!(provider.image_len.load(Ordering::SeqCst), 6668);
}

/// Wrong shared secret: the relay refuses and the device keeps going.
#[tokio::test(flavor = "multi_thread")]
async fn wrong_secret_is_reported_not_fatal() {
    let provider = CountingProvider::default();
    let addr = start_relay(provider.clone()).await;

    let mut device = device(addr, "not-the-secret", Duration::from_secs(12));
    device.start().await.unwrap();

    for cycle in 1..=2 {
        let report = device.cycle().await;
        assert_eq!(report.cycle, cycle);
        assert!(matches!(
            report.outcome,
            CycleOutcome::RelayFailed {
                frame_bytes: 5000,
                error: RelayError::ServiceError(401)
            }
        ));
    }
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

/// The loop keeps cycling and waits one interval between cycles.
#[tokio::test(flavor = "multi_thread")]
async fn run_loop_paces_cycles() {
    let provider = CountingProvider::default();
    let addr = start_relay(provider.clone()).await;

    let interval = Duration::from_millis(300);
    let mut device = device(addr, SECRET, interval);
    device.start().await.unwrap();
    let mut reports = device.subscribe();

    let runner = tokio::spawn(async move {
        device.run().await;
    });

    let first = tokio::time::timeout(Duration::from_secs(10), reports.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(10), reports.recv())
        .await
        .unwrap()
        .unwrap();
    runner.abort();

    assert_eq!(first.cycle, 1);
    assert_eq!(second.cycle, 2);
    assert_eq!(
        first.outcome.description().map(|d| d.as_str()),
        Some("uma xícara de café")
    );
    let gap = second.started_at.duration_since(first.finished_at);
    assert!(gap >= interval, "next cycle started early: {:?}", gap);
    assert!(
        gap < interval + Duration::from_millis(250),
        "next cycle started late: {:?}",
        gap
    );
    assert!(provider.calls.load(Ordering::SeqCst) >= 2);
}
