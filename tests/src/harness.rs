//! Test harness wiring a dispatcher and client messengers to one bus.

use async_trait::async_trait;
use rpc_messenger::{
    DispatcherHandle, HandlerRegistry, MessageHandler, Messenger, MessengerConfig,
    ResponseEnvelope,
};
use serde_json::Value;
use shared_bus::{BusMessage, ChannelPattern, InMemoryBus, PubSubTransport, Subscription};
use messenger_telemetry::{init_logging, TelemetryConfig};
use std::sync::{Arc, Once};
use std::time::Duration;

static LOGGING: Once = Once::new();

/// Install logging once per test binary. Set `MESSENGER_LOG_LEVEL=debug` to
/// see the message flow.
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let mut config = TelemetryConfig::for_service("messenger-tests");
        if std::env::var_os("MESSENGER_LOG_LEVEL").is_none() && std::env::var_os("RUST_LOG").is_none() {
            config.log_level = "warn".to_string();
        }
        // Another subscriber may already be installed
        let _ = init_logging(&config);
    });
}

/// Replies with the request payload.
#[derive(Default)]
pub struct EchoHandler;

#[async_trait]
impl MessageHandler for EchoHandler {
    async fn handle(&self, payload: Option<Value>) -> anyhow::Result<Option<Value>> {
        Ok(payload)
    }
}

/// Replies `"pong"` to `"ping"` and echoes anything else.
#[derive(Default)]
pub struct PingHandler;

#[async_trait]
impl MessageHandler for PingHandler {
    async fn handle(&self, payload: Option<Value>) -> anyhow::Result<Option<Value>> {
        match payload {
            Some(Value::String(s)) if s == "ping" => Ok(Some(Value::from("pong"))),
            other => Ok(other),
        }
    }
}

/// Always fails with "boom".
#[derive(Default)]
pub struct BoomHandler;

#[async_trait]
impl MessageHandler for BoomHandler {
    async fn handle(&self, _: Option<Value>) -> anyhow::Result<Option<Value>> {
        anyhow::bail!("boom")
    }
}

/// Echoes after a delay.
pub struct SlowHandler(pub Duration);

#[async_trait]
impl MessageHandler for SlowHandler {
    async fn handle(&self, payload: Option<Value>) -> anyhow::Result<Option<Value>> {
        tokio::time::sleep(self.0).await;
        Ok(payload)
    }
}

/// Registry with `echo` (ping/pong), `boom`, and `slow` (200ms) channels.
pub fn default_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry
        .register_handler::<PingHandler>("echo")
        .and_then(|r| r.register_handler::<BoomHandler>("boom"))
        .and_then(|r| r.register_shared("slow", Arc::new(SlowHandler(Duration::from_millis(200)))))
        .expect("distinct channel names");
    registry
}

/// Bus, running dispatcher, and a wire monitor subscribed to everything.
pub struct MessengerHarness {
    pub bus: Arc<InMemoryBus>,
    pub server: DispatcherHandle,
    pub monitor: Subscription,
}

impl MessengerHarness {
    /// Start a dispatcher serving `registry` on a fresh bus.
    pub async fn start(registry: HandlerRegistry) -> Self {
        init_test_logging();
        let bus = Arc::new(InMemoryBus::new());
        let monitor = bus
            .subscribe(ChannelPattern::glob("*"))
            .await
            .expect("bus open");

        let server_config = MessengerConfig {
            client_name: Some("server".into()),
            ..Default::default()
        };
        let server = Messenger::new(server_config, bus.clone())
            .expect("valid config")
            .serve(registry)
            .await
            .expect("dispatcher starts");

        Self {
            bus,
            server,
            monitor,
        }
    }

    /// A client messenger with identity `name` on the harness bus.
    pub fn client(&self, name: &str) -> Messenger {
        self.client_with(MessengerConfig {
            client_name: Some(name.into()),
            ..Default::default()
        })
    }

    pub fn client_with(&self, config: MessengerConfig) -> Messenger {
        Messenger::new(config, self.bus.clone()).expect("valid client config")
    }

    /// Everything published so far, in publish order.
    pub fn drain_wire(&mut self) -> Vec<BusMessage> {
        let mut seen = Vec::new();
        while let Ok(Some(message)) = self.monitor.try_recv() {
            seen.push(message);
        }
        seen
    }

    /// Messages published so far on exactly `channel`.
    pub fn published_on<'a>(wire: &'a [BusMessage], channel: &str) -> Vec<&'a BusMessage> {
        wire.iter().filter(|m| m.channel() == channel).collect()
    }
}

/// Decode a response seen on the wire.
pub fn response(message: &BusMessage) -> ResponseEnvelope {
    ResponseEnvelope::decode(&message.payload).expect("response envelope")
}
