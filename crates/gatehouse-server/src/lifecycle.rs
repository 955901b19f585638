//! Server lifecycle: bind, serve, drain, shut down.

use gatehouse_auth::AuthGate;
use gatehouse_config::{GatewayConfig, validate};
use gatehouse_queue::{QueueEngine, QueueLimits};
use gatehouse_telemetry::{EventLog, LogLevel};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::app::build_router;
use crate::error::{ServerError, ServerResult};
use crate::state::AppState;
use crate::upstream::{A2aProxy, McpProxy, ProxyUpstream};

/// Live signal-listener count across the process, for the start/stop
/// non-accumulation check.
static SIGNAL_LISTENERS: AtomicUsize = AtomicUsize::new(0);

/// How many signal listeners are currently registered.
#[must_use]
pub fn active_signal_listeners() -> usize {
    SIGNAL_LISTENERS.load(Ordering::SeqCst)
}

/// Start-time knobs, mainly for tests and embedders.
#[derive(Default)]
pub struct ServerOptions {
    /// Skip OS signal registration. Embedders that own the process
    /// lifecycle set this.
    pub disable_signal_handlers: bool,

    /// Substitute MCP upstream (tests use scripted ones).
    pub mcp_upstream: Option<Arc<dyn ProxyUpstream>>,

    /// Substitute A2A upstream.
    pub a2a_upstream: Option<Arc<dyn ProxyUpstream>>,

    /// Substitute event log sink.
    pub event_log: Option<EventLog>,
}

impl std::fmt::Debug for ServerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerOptions")
            .field("disable_signal_handlers", &self.disable_signal_handlers)
            .finish_non_exhaustive()
    }
}

/// Cancels queues, kills connectors, and stops the listener — exactly
/// once, no matter how many paths race into it.
struct ShutdownDriver {
    state: Arc<AppState>,
    mcp_proxy: Option<Arc<McpProxy>>,
    token: CancellationToken,
    fired: AtomicBool,
}

impl ShutdownDriver {
    fn trigger(&self) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        self.state.events.info("server_shutdown", json!({}));
        // Reject queued work first so draining HTTP connections answer
        // promptly instead of riding out their full deadlines.
        self.state.engine.shutdown();
        if let Some(proxy) = &self.mcp_proxy {
            proxy.shutdown();
        }
        self.token.cancel();
    }
}

/// Decrements the listener count when the signal task goes away.
struct SignalGuard {
    task: JoinHandle<()>,
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.task.abort();
        SIGNAL_LISTENERS.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A running gateway.
pub struct GatewayServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    driver: Arc<ShutdownDriver>,
    serve_task: Option<JoinHandle<std::io::Result<()>>>,
    _signal_guard: Option<SignalGuard>,
}

impl std::fmt::Debug for GatewayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayServer")
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

impl GatewayServer {
    /// Validate the config, bind the listener, and start serving.
    ///
    /// # Errors
    ///
    /// Any [`ServerError`] variant; nothing is left running on failure.
    pub async fn start(config: GatewayConfig) -> ServerResult<Self> {
        Self::start_with_options(config, ServerOptions::default()).await
    }

    /// [`start`](Self::start) with explicit options.
    ///
    /// # Errors
    ///
    /// Any [`ServerError`] variant; nothing is left running on failure.
    pub async fn start_with_options(
        config: GatewayConfig,
        options: ServerOptions,
    ) -> ServerResult<Self> {
        validate(&config)?;
        let body_limit = usize::try_from(config.body_limit_bytes()?).unwrap_or(usize::MAX);

        let events = Arc::new(match options.event_log {
            Some(log) => log,
            None => match &config.logging.access_log {
                Some(path) => EventLog::file(LogLevel::Info, path)?,
                None => EventLog::stdout(LogLevel::Info),
            },
        });

        let gate = AuthGate::from_settings(&config.auth)?;
        let engine = QueueEngine::new(QueueLimits {
            timeout: Duration::from_millis(config.queue.timeout_ms),
            max_queue: config.queue.max_queue_per_target,
            max_inflight: config.queue.max_inflight_per_target,
        });

        let mut mcp_proxy = None;
        let mcp: Arc<dyn ProxyUpstream> = match options.mcp_upstream {
            Some(upstream) => upstream,
            None => {
                let proxy = Arc::new(McpProxy::new());
                mcp_proxy = Some(Arc::clone(&proxy));
                proxy
            }
        };
        let a2a: Arc<dyn ProxyUpstream> = match options.a2a_upstream {
            Some(upstream) => upstream,
            None => Arc::new(A2aProxy::new().map_err(ServerError::A2a)?),
        };

        let targets: HashMap<_, _> = config
            .targets
            .iter()
            .map(|t| (t.id.clone(), t.clone()))
            .collect();
        let connector_count = config
            .targets
            .iter()
            .filter(|t| t.kind == gatehouse_core::TargetKind::Connector && t.enabled)
            .count();
        let agent_count = config
            .targets
            .iter()
            .filter(|t| t.kind == gatehouse_core::TargetKind::Agent && t.enabled)
            .count();

        let state = Arc::new(AppState {
            hide_not_found: config.hide_not_found,
            targets,
            gate,
            engine,
            mcp,
            a2a,
            events: Arc::clone(&events),
        });

        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(|source| ServerError::Bind {
                addr: format!("{}:{}", config.host, config.port),
                source,
            })?;
        let addr = listener.local_addr()?;

        events.info(
            "server_started",
            json!({"host": config.host, "port": addr.port()}),
        );
        events.info("mcp_proxy_enabled", json!({"connectors": connector_count}));
        events.info("a2a_proxy_enabled", json!({"agents": agent_count}));
        tracing::info!(%addr, "gateway listening");

        let token = CancellationToken::new();
        let driver = Arc::new(ShutdownDriver {
            state: Arc::clone(&state),
            mcp_proxy,
            token: token.clone(),
            fired: AtomicBool::new(false),
        });

        let app = build_router(Arc::clone(&state), body_limit);
        let shutdown = token.clone();
        let serve_task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        });

        let signal_guard = if options.disable_signal_handlers {
            None
        } else {
            Some(spawn_signal_listener(Arc::clone(&driver)))
        };

        Ok(Self {
            addr,
            state,
            driver,
            serve_task: Some(serve_task),
            _signal_guard: signal_guard,
        })
    }

    /// The bound address. With port 0 in the config this is where the OS
    /// actually put the listener.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared state, for embedders that want queue introspection.
    #[must_use]
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Initiate shutdown and wait for the listener to drain.
    pub async fn stop(mut self) {
        self.driver.trigger();
        self.finish().await;
    }

    /// Run until something else (a signal, a driver trigger) stops the
    /// server, then clean up.
    pub async fn wait(mut self) {
        self.finish().await;
    }

    async fn finish(&mut self) {
        let Some(task) = self.serve_task.take() else {
            return;
        };
        match task.await {
            Ok(Ok(())) => {
                self.state.events.info("server_stopped", json!({}));
                tracing::info!("gateway stopped");
            }
            Ok(Err(e)) => {
                self.state
                    .events
                    .error("server_shutdown_error", json!({"error": e.to_string()}));
                tracing::error!(error = %e, "gateway stopped with error");
            }
            Err(e) => {
                self.state
                    .events
                    .error("server_shutdown_error", json!({"error": e.to_string()}));
            }
        }
    }
}

fn spawn_signal_listener(driver: Arc<ShutdownDriver>) -> SignalGuard {
    SIGNAL_LISTENERS.fetch_add(1, Ordering::SeqCst);
    let task = tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutdown signal received");
        driver.trigger();
    });
    SignalGuard { task }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let interrupt = signal(SignalKind::interrupt());
    let terminate = signal(SignalKind::terminate());
    match (interrupt, terminate) {
        (Ok(mut interrupt), Ok(mut terminate)) => {
            tokio::select! {
                _ = interrupt.recv() => {}
                _ = terminate.recv() => {}
            }
        }
        _ => {
            tracing::warn!("cannot register signal handlers; relying on explicit stop");
            futures::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("cannot register ctrl-c handler; relying on explicit stop");
        futures::future::pending::<()>().await;
    }
}
