//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Start the broker, then the consumer, then build the pipeline
//! - Bind the listener and serve until shutdown
//! - Stop in reverse order: server, broker, consumer
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::io;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::broker::{BrokerError, FileMessageBroker};
use crate::config::{validate_config, ConfigError, ListenerConfig, ProxyConfig};
use crate::http::{AppState, HttpServer};
use crate::lifecycle::Shutdown;
use crate::messaging::{MessageConsumer, MessageRegistry};
use crate::pipeline::RequestPipeline;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("failed to start message broker: {0}")]
    Broker(#[from] BrokerError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },
}

/// A started proxy: broker and consumer running, server not yet serving.
pub struct Application {
    pub server: HttpServer,
    pub broker: Arc<FileMessageBroker>,
    consumer: JoinHandle<()>,
}

/// Start every subsystem in dependency order.
pub async fn bootstrap(config: &ProxyConfig, shutdown: &Shutdown) -> Result<Application, StartupError> {
    validate_config(config).map_err(ConfigError::Validation)?;

    let broker = Arc::new(FileMessageBroker::start(&config.message_broker).await?);
    let registry = MessageRegistry::new();

    let consumer = MessageConsumer::new(broker.clone(), registry.clone());
    let consumer = tokio::spawn(consumer.run(shutdown.subscribe()));

    let pipeline = RequestPipeline::new(
        &config.application,
        config.message_broker.time_to_live(),
        broker.clone(),
        registry.clone(),
        shutdown.subscribe(),
    );
    tracing::info!(
        mode = pipeline.mode(),
        request_timeout_secs = config.timeouts.request_secs,
        "Request pipeline ready"
    );

    let server = HttpServer::new(AppState {
        pipeline,
        registry,
        request_timeout: config.timeouts.request_timeout(),
        shutdown: shutdown.subscribe(),
    });

    Ok(Application {
        server,
        broker,
        consumer,
    })
}

pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, StartupError> {
    TcpListener::bind(&config.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.bind_address.clone(),
            source,
        })
}

impl Application {
    /// Serve until `shutdown` fires, then stop the broker and consumer.
    pub async fn run(self, listener: TcpListener, shutdown: Arc<Shutdown>) -> io::Result<()> {
        let served = self.server.run(listener, shutdown.subscribe()).await;

        shutdown.trigger();
        self.broker.dispose();
        if let Err(e) = self.consumer.await {
            tracing::error!(error = %e, "Message consumer task failed");
        }

        served
    }
}
