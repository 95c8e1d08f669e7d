//! # Query Flows
//!
//! Client channels against a running dispatcher on one in-memory bus:
//!
//! 1. **Echo**: one request and one response on the wire, correlated
//! 2. **Failure**: a failing handler surfaces as `RemoteHandler`
//! 3. **Concurrency**: many in-flight queries each get their own reply
//! 4. **Timeout / cancel**: local outcomes, late replies ignored

#[cfg(test)]
mod tests {
    use crate::harness::{default_registry, response, MessengerHarness};
    use futures::future::join_all;
    use rpc_messenger::{
        CancellationToken, MessengerConfig, MessengerError, QueryOptions, RequestEnvelope,
    };
    use serde_json::{json, Value};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::time::timeout;

    // =============================================================================
    // REPLIES
    // =============================================================================

    /// Echo: exactly one publish on each concrete channel, correlated
    #[tokio::test]
    async fn test_echo_ping_pong() {
        let mut harness = MessengerHarness::start(default_registry()).await;
        let echo = harness.client("c1").channel::<Value, Value>("echo").unwrap();

        let reply = echo.query(json!("ping")).await.unwrap();
        assert_eq!(reply, json!("pong"));
        assert_eq!(echo.pending_count(), 0);

        let wire = harness.drain_wire();
        let requests = MessengerHarness::published_on(&wire, "echo:req-c1");
        let responses = MessengerHarness::published_on(&wire, "echo:res-c1");
        assert_eq!(requests.len(), 1, "one request published");
        assert_eq!(responses.len(), 1, "one response published");

        let request = RequestEnvelope::decode(&requests[0].payload).unwrap();
        let response = response(responses[0]);
        assert_eq!(request.client_id, "c1");
        assert_eq!(request.payload, Some(json!("ping")));
        assert_eq!(response.reply_to, request.request_id);
        assert!(response.success);
        assert_eq!(response.payload, Some(json!("pong")));
    }

    /// Boom: failure response with the handler's message and no payload
    #[tokio::test]
    async fn test_failing_handler() {
        let mut harness = MessengerHarness::start(default_registry()).await;
        let boom = harness.client("c1").channel::<Value, Value>("boom").unwrap();

        let err = boom.query(json!({"any": "thing"})).await.unwrap_err();
        match err {
            MessengerError::RemoteHandler { message } => assert_eq!(message, "boom"),
            other => panic!("Expected RemoteHandler, got {:?}", other),
        }
        assert!(boom.query(Value::Null).await.unwrap_err().is_remote());

        let wire = harness.drain_wire();
        let responses = MessengerHarness::published_on(&wire, "boom:res-c1");
        assert_eq!(responses.len(), 2);
        for message in responses {
            let response = response(message);
            assert!(!response.success);
            assert_eq!(response.error_message.as_deref(), Some("boom"));
            assert_eq!(response.payload, None);
        }
    }

    /// 100 concurrent queries on one channel each resolve with their own reply
    #[tokio::test]
    async fn test_concurrent_queries() {
        let harness = MessengerHarness::start(default_registry()).await;
        let echo = harness.client("c1").channel::<u32, u32>("echo").unwrap();

        let calls = (0..100u32).map(|i| {
            let echo = echo.clone();
            tokio::spawn(async move { (i, echo.query(i).await) })
        });

        let results = timeout(Duration::from_secs(5), join_all(calls))
            .await
            .expect("all queries resolve");
        for result in results {
            let (sent, reply) = result.unwrap();
            assert_eq!(reply.unwrap(), sent);
        }
        assert_eq!(echo.pending_count(), 0);
        assert_eq!(echo.stats().total_completed.load(Ordering::Relaxed), 100);
    }

    /// Clients on the same logical channel only see their own replies
    #[tokio::test]
    async fn test_clients_are_isolated() {
        let harness = MessengerHarness::start(default_registry()).await;
        let a = harness.client("a").channel::<String, String>("echo").unwrap();
        let b = harness.client("b").channel::<String, String>("echo").unwrap();

        let (ra, rb) = tokio::join!(a.query("from-a".into()), b.query("from-b".into()));
        assert_eq!(ra.unwrap(), "from-a");
        assert_eq!(rb.unwrap(), "from-b");
        assert_eq!(a.stats().total_unmatched.load(Ordering::Relaxed), 0);
        assert_eq!(b.stats().total_unmatched.load(Ordering::Relaxed), 0);
    }

    /// Prefixed deployments talk on prefixed channels only
    #[tokio::test]
    async fn test_prefixed_deployment() {
        let bus = std::sync::Arc::new(shared_bus::InMemoryBus::new());
        let config = |name: &str| MessengerConfig {
            client_name: Some(name.into()),
            channel_prefix: Some("test".into()),
            ..Default::default()
        };

        let server = rpc_messenger::Messenger::new(config("server"), bus.clone()).unwrap();
        let _handle = server.serve(default_registry()).await.unwrap();

        let client = rpc_messenger::Messenger::new(config("c1"), bus.clone()).unwrap();
        let echo = client.channel::<Value, Value>("echo").unwrap();
        assert_eq!(echo.request_channel(), "test_echo:req-c1");
        assert_eq!(echo.query(json!("ping")).await.unwrap(), json!("pong"));
    }

    // =============================================================================
    // LOCAL OUTCOMES
    // =============================================================================

    /// Timeout fires first; the late reply is dropped without resolving anything
    #[tokio::test]
    async fn test_timeout_then_late_reply() {
        let mut harness = MessengerHarness::start(default_registry()).await;
        let slow = harness.client("c1").channel::<Value, Value>("slow").unwrap();

        let err = slow
            .query_timeout(json!(1), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, MessengerError::Timeout(d) if d == Duration::from_millis(50)));
        assert_eq!(slow.pending_count(), 0);

        // Handler finishes at ~200ms and still replies
        tokio::time::sleep(Duration::from_millis(400)).await;
        let wire = harness.drain_wire();
        assert_eq!(MessengerHarness::published_on(&wire, "slow:res-c1").len(), 1);
        assert_eq!(slow.stats().total_unmatched.load(Ordering::Relaxed), 1);
        assert_eq!(slow.stats().total_timeouts.load(Ordering::Relaxed), 1);

        // The channel keeps working afterwards
        assert_eq!(
            slow.query_timeout(json!(2), Duration::from_secs(2)).await.unwrap(),
            json!(2)
        );
    }

    /// Default timeout comes from the messenger config
    #[tokio::test]
    async fn test_default_timeout_from_config() {
        let harness = MessengerHarness::start(default_registry()).await;
        let client = harness.client_with(MessengerConfig {
            client_name: Some("c1".into()),
            default_timeout: Duration::from_millis(30),
            ..Default::default()
        });
        let slow = client.channel::<Value, Value>("slow").unwrap();

        let err = slow.query(json!(1)).await.unwrap_err();
        assert!(matches!(err, MessengerError::Timeout(_)));
    }

    /// Cancel token ends the wait with Canceled and removes the call
    #[tokio::test]
    async fn test_cancellation() {
        let harness = MessengerHarness::start(default_registry()).await;
        let slow = harness.client("c1").channel::<Value, Value>("slow").unwrap();
        let token = CancellationToken::new();

        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let options = QueryOptions::timeout(Duration::from_secs(5)).with_cancel(token);
        let err = slow.query_with(json!(1), options).await.unwrap_err();
        assert!(matches!(err, MessengerError::Canceled));
        assert_eq!(slow.pending_count(), 0);
    }

    /// A query whose caller goes away leaves no pending entry behind
    #[tokio::test]
    async fn test_abandoned_query_future() {
        let harness = MessengerHarness::start(default_registry()).await;
        let slow = harness.client("c1").channel::<Value, Value>("slow").unwrap();

        let outer = timeout(Duration::from_millis(30), slow.query(json!(1))).await;
        assert!(outer.is_err(), "outer timeout drops the query future");
        assert_eq!(slow.pending_count(), 0);
    }
}
