//! # Messenger
//!
//! Process-level entry point. Owns the client identity and channel prefix,
//! hands out typed message channels, and starts the dispatcher.
//!
//! ```ignore
//! let messenger = Messenger::new(MessengerConfig::from_env(), transport)?;
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register_handler::<Typed<EchoHandler>>("echo")?;
//! let _server = messenger.serve(registry).await?;
//!
//! let echo = messenger.channel::<EchoRequest, EchoResponse>("echo")?;
//! let reply = echo.query(EchoRequest { message: "ping".into() }).await?;
//! ```

use crate::channel::MessageChannel;
use crate::dispatcher::{DispatcherHandle, HandlerDispatcher};
use crate::domain::{
    ChannelIdentity, ChannelNaming, ClientId, LogicalChannel, MessengerConfig, MessengerError,
};
use crate::ports::PubSubTransport;
use crate::registry::HandlerRegistry;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_bus::InMemoryBus;
use std::sync::Arc;
use tracing::info;

/// Messaging endpoint of one process.
#[derive(Clone)]
pub struct Messenger {
    transport: Arc<dyn PubSubTransport>,
    config: MessengerConfig,
    client_id: ClientId,
    naming: ChannelNaming,
}

impl Messenger {
    /// Create a messenger over `transport`.
    ///
    /// Without a configured client name a random identity is generated.
    pub fn new(
        config: MessengerConfig,
        transport: Arc<dyn PubSubTransport>,
    ) -> Result<Self, MessengerError> {
        config.validate()?;
        let client_id = config.client_id()?;
        let naming = config.naming()?;

        info!(
            client_id = %client_id,
            prefix = naming.prefix(),
            default_timeout_ms = config.default_timeout.as_millis(),
            "Messenger created"
        );

        Ok(Self {
            transport,
            config,
            client_id,
            naming,
        })
    }

    /// Create a messenger over a fresh in-memory bus sized from the config.
    pub fn in_memory(config: MessengerConfig) -> Result<(Self, Arc<InMemoryBus>), MessengerError> {
        config.validate()?;
        let bus = Arc::new(InMemoryBus::with_capacity(config.bus_capacity));
        let messenger = Self::new(config, bus.clone())?;
        Ok((messenger, bus))
    }

    /// Typed channel for the logical channel `name`.
    pub fn channel<Req, Res>(&self, name: &str) -> Result<MessageChannel<Req, Res>, MessengerError>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let identity = ChannelIdentity::new(
            self.naming.clone(),
            LogicalChannel::new(name)?,
            self.client_id.clone(),
        );
        Ok(MessageChannel::new(
            Arc::clone(&self.transport),
            identity,
            self.config.default_timeout,
        ))
    }

    /// Dispatcher for `registry`, not yet started.
    pub fn dispatcher(&self, registry: HandlerRegistry) -> HandlerDispatcher {
        HandlerDispatcher::new(Arc::clone(&self.transport), registry, self.naming.clone())
    }

    /// Start serving the handlers of `registry`.
    pub async fn serve(&self, registry: HandlerRegistry) -> Result<DispatcherHandle, MessengerError> {
        self.dispatcher(registry).start().await
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn naming(&self) -> &ChannelNaming {
        &self.naming
    }

    pub fn config(&self) -> &MessengerConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn PubSubTransport> {
        &self.transport
    }
}

impl std::fmt::Debug for Messenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messenger")
            .field("client_id", &self.client_id)
            .field("naming", &self.naming)
            .field("config", &self.config)
            .finish()
    }
}
