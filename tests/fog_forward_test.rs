//! Forward/buffer semantics of the fog node against an in-process stub
//! cloud: success clears the buffer, any failure retains it, a 401
//! additionally forces re-authentication on the next cycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::Duration;
use serde_json::{json, Value};

use fogflow::auth::Authenticator;
use fogflow::fog::{CloudClient, FogNode, MessageBus, NodePhase};
use fogflow::FogConfig;

// ---

/// Bus double for a node that never touches a broker.
struct NullBus;

impl MessageBus for NullBus {
    fn publish(&self, _topic: &str, _payload: Vec<u8>) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
struct Stub {
    // ---
    auth: Arc<Authenticator>,
    data_status: StatusCode,
    logins: Arc<AtomicUsize>,
    forwards: Arc<AtomicUsize>,
}

async fn stub_login(State(stub): State<Stub>) -> Json<Value> {
    // ---
    stub.logins.fetch_add(1, Ordering::SeqCst);
    let token = stub.auth.login("fog_node", "fog-pass").unwrap();
    Json(json!({ "token": token }))
}

async fn stub_data(State(stub): State<Stub>) -> StatusCode {
    // ---
    stub.forwards.fetch_add(1, Ordering::SeqCst);
    stub.data_status
}

/// Spin up a stub cloud whose `/api/data` always answers `data_status`.
/// Returns the base URL and the login/forward hit counters.
async fn spawn_stub(data_status: StatusCode) -> Result<(String, Arc<AtomicUsize>, Arc<AtomicUsize>)> {
    // ---
    let stub = Stub {
        auth: Arc::new(Authenticator::new(
            "stub-secret",
            vec![("fog_node".to_string(), "fog-pass".to_string())],
            Duration::hours(24),
        )),
        data_status,
        logins: Arc::new(AtomicUsize::new(0)),
        forwards: Arc::new(AtomicUsize::new(0)),
    };
    let logins = stub.logins.clone();
    let forwards = stub.forwards.clone();

    let app = Router::new()
        .route("/api/login", post(stub_login))
        .route("/api/data", post(stub_data))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Ok((format!("http://{addr}"), logins, forwards))
}

fn node_against(base: &str) -> Result<FogNode> {
    // ---
    let config = FogConfig {
        mqtt_host: "localhost".into(),
        mqtt_port: 1883,
        sensors_topic: "sensors/data".into(),
        actuator_topic: "actuator/control".into(),
        cloud_api_base: base.to_string(),
        username: "fog_node".into(),
        password: "fog-pass".into(),
        aggregation_interval_secs: 30,
        buffer_capacity: 100,
        token_refresh_margin_secs: 300,
        forward_timeout_secs: 10,
        region: "south_zone".into(),
    };
    let cloud = CloudClient::from_config(&config)?;
    Ok(FogNode::new(&config, cloud, Arc::new(NullBus)))
}

fn buffer_three_readings(node: &mut FogNode) {
    // ---
    for temp in [24.0, 25.0, 26.0] {
        node.handle_sensor_message(
            "sensors/data",
            json!({"temperature": temp, "vibration": 1.0, "presence": 1})
                .to_string()
                .as_bytes(),
        )
        .unwrap();
    }
}

// ---

#[tokio::test]
async fn forward_success_clears_buffer() -> Result<()> {
    // ---
    let (base, logins, forwards) = spawn_stub(StatusCode::OK).await?;
    let mut node = node_against(&base)?;
    assert_eq!(node.phase(), NodePhase::Disconnected);

    node.connect().await;
    assert_eq!(node.phase(), NodePhase::Ready);

    buffer_three_readings(&mut node);
    assert_eq!(node.buffer_len(), 3);

    node.run_aggregation_cycle().await;

    assert_eq!(node.buffer_len(), 0, "buffer must be cleared on 200");
    assert_eq!(node.phase(), NodePhase::Buffering);
    assert_eq!(logins.load(Ordering::SeqCst), 1);
    assert_eq!(forwards.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn forward_failure_retains_buffer() -> Result<()> {
    // ---
    let (base, _logins, forwards) = spawn_stub(StatusCode::INTERNAL_SERVER_ERROR).await?;
    let mut node = node_against(&base)?;
    buffer_three_readings(&mut node);

    node.run_aggregation_cycle().await;

    assert_eq!(node.buffer_len(), 3, "buffer must survive a failed forward");
    assert_eq!(forwards.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn auth_rejection_discards_token_and_retains_buffer() -> Result<()> {
    // ---
    let (base, logins, forwards) = spawn_stub(StatusCode::UNAUTHORIZED).await?;
    let mut node = node_against(&base)?;
    buffer_three_readings(&mut node);

    node.run_aggregation_cycle().await;
    assert_eq!(node.buffer_len(), 3);
    assert_eq!(logins.load(Ordering::SeqCst), 1);

    // The 401 dropped the held token, so the next cycle logs in again.
    node.run_aggregation_cycle().await;
    assert_eq!(logins.load(Ordering::SeqCst), 2);
    assert_eq!(forwards.load(Ordering::SeqCst), 2);
    assert_eq!(node.buffer_len(), 3);
    Ok(())
}

#[tokio::test]
async fn empty_buffer_skips_the_cycle_entirely() -> Result<()> {
    // ---
    let (base, logins, forwards) = spawn_stub(StatusCode::OK).await?;
    let mut node = node_against(&base)?;

    node.run_aggregation_cycle().await;

    assert_eq!(logins.load(Ordering::SeqCst), 0);
    assert_eq!(forwards.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn token_is_reused_across_successful_cycles() -> Result<()> {
    // ---
    let (base, logins, forwards) = spawn_stub(StatusCode::OK).await?;
    let mut node = node_against(&base)?;

    buffer_three_readings(&mut node);
    node.run_aggregation_cycle().await;
    buffer_three_readings(&mut node);
    node.run_aggregation_cycle().await;

    // One login serves both forwards: the 24h token stays clear of the
    // 300s refresh margin.
    assert_eq!(logins.load(Ordering::SeqCst), 1);
    assert_eq!(forwards.load(Ordering::SeqCst), 2);
    Ok(())
}
