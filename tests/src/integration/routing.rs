//! # Request Routing
//!
//! What the dispatcher does with requests it cannot answer, and the wire
//! format seen by clients that do not use this crate.

#[cfg(test)]
mod tests {
    use crate::harness::{default_registry, response, MessengerHarness};
    use bytes::Bytes;
    use rpc_messenger::{HandlerRegistry, MessengerError, Typed, TypedHandler};
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};
    use shared_bus::{ChannelPattern, PubSubTransport};
    use std::time::Duration;
    use tokio::time::timeout;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    #[derive(Debug, Serialize, Deserialize)]
    struct Order {
        id: u64,
        quantity: u32,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct OrderAccepted {
        order_id: u64,
        total_quantity: u32,
    }

    #[derive(Default)]
    struct OrderHandler;

    #[async_trait::async_trait]
    impl TypedHandler for OrderHandler {
        type Request = Order;
        type Response = OrderAccepted;

        async fn handle(&self, order: Option<Order>) -> anyhow::Result<OrderAccepted> {
            let order = order.ok_or_else(|| anyhow::anyhow!("order required"))?;
            Ok(OrderAccepted {
                order_id: order.id,
                total_quantity: order.quantity * 2,
            })
        }
    }

    // =============================================================================
    // UNROUTABLE REQUESTS
    // =============================================================================

    /// Malformed requests get no reply and do not disturb later requests
    #[tokio::test]
    async fn test_malformed_request_dropped() {
        let mut harness = MessengerHarness::start(default_registry()).await;

        let malformed: [&[u8]; 4] = [
            b"not json",
            br#"[1, 2, 3]"#,
            br#"{"requestId":"","clientId":"c1"}"#,
            br#"{"requestId":"r1"}"#,
        ];
        for garbage in malformed {
            harness
                .bus
                .publish("echo:req-c1", Bytes::copy_from_slice(garbage))
                .await
                .unwrap();
        }

        let echo = harness.client("c1").channel::<Value, Value>("echo").unwrap();
        assert_eq!(echo.query(json!("ping")).await.unwrap(), json!("pong"));

        let wire = harness.drain_wire();
        assert_eq!(MessengerHarness::published_on(&wire, "echo:res-c1").len(), 1);
    }

    /// No handler bound: nobody listens, the caller times out
    #[tokio::test]
    async fn test_unknown_channel_times_out() {
        let mut harness = MessengerHarness::start(default_registry()).await;
        let missing = harness.client("c1").channel::<Value, Value>("missing").unwrap();

        let err = missing
            .query_timeout(json!(1), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, MessengerError::Timeout(_)));

        let wire = harness.drain_wire();
        assert_eq!(MessengerHarness::published_on(&wire, "missing:req-c1").len(), 1);
        assert!(MessengerHarness::published_on(&wire, "missing:res-c1").is_empty());
    }

    /// A client id with glob characters cannot be addressed and is dropped
    #[tokio::test]
    async fn test_invalid_client_id_dropped() {
        let mut harness = MessengerHarness::start(default_registry()).await;
        let raw = json!({"requestId": "r1", "clientId": "c*", "payload": "ping"});
        harness
            .bus
            .publish("echo:req-c1", Bytes::from(raw.to_string()))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let wire = harness.drain_wire();
        assert_eq!(wire.len(), 1, "only the request itself was published");
    }

    /// Shutting the dispatcher down stops replies
    #[tokio::test]
    async fn test_shutdown_stops_serving() {
        let harness = MessengerHarness::start(default_registry()).await;
        let echo = harness.client("c1").channel::<Value, Value>("echo").unwrap();
        assert_eq!(echo.query(json!("ping")).await.unwrap(), json!("pong"));

        harness.server.shutdown();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = echo
            .query_timeout(json!("ping"), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, MessengerError::Timeout(_)));
    }

    // =============================================================================
    // WIRE FORMAT
    // =============================================================================

    /// A foreign client speaking raw JSON (with the legacy `clientName` key)
    #[tokio::test]
    async fn test_foreign_client_wire_format() {
        let harness = MessengerHarness::start(default_registry()).await;
        let mut replies = harness
            .bus
            .subscribe(ChannelPattern::literal("echo:res-legacy"))
            .await
            .unwrap();

        let raw = r#"{"requestId":"r-42","clientName":"legacy","payload":"ping"}"#;
        harness
            .bus
            .publish("echo:req-legacy", Bytes::from_static(raw.as_bytes()))
            .await
            .unwrap();

        let message = timeout(Duration::from_secs(1), replies.recv())
            .await
            .expect("reply published")
            .expect("subscription open");
        let body: Value = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(
            body,
            json!({"replyTo": "r-42", "success": true, "errorMessage": null, "payload": "pong"})
        );
        assert_eq!(response(&message).reply_to.as_str(), "r-42");
    }

    /// Typed handler: decoded request, camelCase response, decode failures reported
    #[tokio::test]
    async fn test_typed_handler_end_to_end() {
        let mut registry = HandlerRegistry::new();
        registry.register_handler::<Typed<OrderHandler>>("orders").unwrap();
        let harness = MessengerHarness::start(registry).await;

        let client = harness.client("shop");
        let orders = client.channel::<Order, OrderAccepted>("orders").unwrap();
        let accepted = orders.query(Order { id: 7, quantity: 3 }).await.unwrap();
        assert_eq!(
            accepted,
            OrderAccepted {
                order_id: 7,
                total_quantity: 6
            }
        );

        let untyped = client.channel::<Value, Value>("orders").unwrap();
        let err = untyped.query(json!({"id": "seven"})).await.unwrap_err();
        match err {
            MessengerError::RemoteHandler { message } => {
                assert!(message.starts_with("invalid request payload: "), "{message}")
            }
            other => panic!("Expected RemoteHandler, got {:?}", other),
        }

        let err = untyped.query(Value::Null).await.unwrap_err();
        assert!(matches!(err, MessengerError::RemoteHandler { message } if message == "order required"));
    }
}
