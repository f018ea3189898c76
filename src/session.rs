//! Remote session establishment.
//!
//! A [`SessionHandle`] is the only way the rest of the crate reaches the agent. Handles
//! are minted exclusively by [`SessionEstablisher::establish`], which:
//!
//! 1. initializes the process-wide middleware state on first use,
//! 2. resolves the instance name through the directory service,
//! 3. probes the resolved agent with `ping`, bounded by the caller's timeout hint.
//!
//! A handle has answered at least one probe when it is returned. Nothing guarantees it
//! stays live; later calls may fail and are never retried here.
//!
//! ## Middleware lifecycle
//!
//! Middleware state is created once per process and shared by every handle. It is
//! torn down by [`SessionEstablisher::teardown`] when the process exits. Calling
//! `establish` again while the state is present reuses it.

use crate::agent::directory::NameService;
use crate::agent::DataFactoryAgent;
use crate::error::{AppResult, LoadTestError};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Default middleware message size limit (large detector frames).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1_048_576_000;

/// Process-wide middleware state.
#[derive(Debug)]
pub struct Middleware {
    max_message_size: usize,
    initialized_at: DateTime<Utc>,
}

impl Middleware {
    /// Message size limit negotiated at initialization.
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// When the middleware was brought up.
    pub fn initialized_at(&self) -> DateTime<Utc> {
        self.initialized_at
    }
}

static MIDDLEWARE: Lazy<Mutex<Option<Arc<Middleware>>>> = Lazy::new(|| Mutex::new(None));

fn acquire_middleware(max_message_size: usize) -> Arc<Middleware> {
    let mut slot = MIDDLEWARE.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(existing) = slot.as_ref() {
        if existing.max_message_size != max_message_size {
            debug!(
                current = existing.max_message_size,
                requested = max_message_size,
                "middleware already initialized, keeping existing message size limit"
            );
        }
        return Arc::clone(existing);
    }

    let middleware = Arc::new(Middleware {
        max_message_size,
        initialized_at: Utc::now(),
    });
    info!(max_message_size, "middleware initialized");
    *slot = Some(Arc::clone(&middleware));
    middleware
}

/// Live capability to the remote agent.
pub struct SessionHandle {
    instance_name: String,
    agent: Arc<dyn DataFactoryAgent>,
    middleware: Arc<Middleware>,
    established_at: DateTime<Utc>,
}

impl SessionHandle {
    /// Directory name the agent was resolved from.
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// Middleware state this session rides on.
    pub fn middleware(&self) -> &Middleware {
        &self.middleware
    }

    /// Time the liveness probe succeeded.
    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    pub(crate) fn agent(&self) -> &dyn DataFactoryAgent {
        self.agent.as_ref()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("instance_name", &self.instance_name)
            .field("established_at", &self.established_at)
            .finish_non_exhaustive()
    }
}

/// Resolves and probes agents, minting [`SessionHandle`]s.
pub struct SessionEstablisher {
    name_service: Arc<dyn NameService>,
    max_message_size: usize,
}

impl SessionEstablisher {
    pub fn new(name_service: Arc<dyn NameService>) -> Self {
        Self {
            name_service,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Middleware message size limit used if this establisher initializes it.
    pub fn with_max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Resolve `instance_name` and verify it answers a liveness probe.
    ///
    /// # Errors
    ///
    /// - [`LoadTestError::UnreachableActor`] if the directory cannot resolve the name
    /// - [`LoadTestError::ActorNotResponding`] if the probe fails or does not complete
    ///   within `timeout_hint`
    pub async fn establish(
        &self,
        instance_name: &str,
        timeout_hint: Duration,
    ) -> AppResult<SessionHandle> {
        let middleware = acquire_middleware(self.max_message_size);

        let agent = self
            .name_service
            .resolve(instance_name)
            .await
            .map_err(|e| LoadTestError::UnreachableActor {
                instance: instance_name.to_string(),
                reason: format!("{e:#}"),
            })?;

        info!(instance = instance_name, "pinging component");
        match timeout(timeout_hint, agent.ping()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(instance = instance_name, error = %e, "ping failed");
                return Err(LoadTestError::ActorNotResponding {
                    instance: instance_name.to_string(),
                    reason: format!("{e:#}"),
                });
            }
            Err(_) => {
                warn!(instance = instance_name, ?timeout_hint, "ping timed out");
                return Err(LoadTestError::ActorNotResponding {
                    instance: instance_name.to_string(),
                    reason: format!("no answer within {timeout_hint:?}"),
                });
            }
        }
        info!(instance = instance_name, "component is available");

        Ok(SessionHandle {
            instance_name: instance_name.to_string(),
            agent,
            middleware,
            established_at: Utc::now(),
        })
    }

    /// Release the process-wide middleware state. Returns whether it was present.
    ///
    /// Outstanding handles keep their reference alive until dropped.
    pub fn teardown() -> bool {
        let released = MIDDLEWARE
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();
        if released {
            info!("middleware torn down");
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::directory::InMemoryNameService;
    use crate::agent::mock::{AgentCall, PingBehavior, SimulatedAgent};

    async fn directory_with(agent: Arc<SimulatedAgent>) -> Arc<InMemoryNameService> {
        let directory = Arc::new(InMemoryNameService::new());
        directory.register("DF/MIRADASDFAgent", agent).await;
        directory
    }

    #[tokio::test]
    async fn establish_probes_the_agent() {
        let agent = Arc::new(SimulatedAgent::new());
        let establisher = SessionEstablisher::new(directory_with(agent.clone()).await);

        let session = establisher
            .establish("DF/MIRADASDFAgent", Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(session.instance_name(), "DF/MIRADASDFAgent");
        let calls = agent.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].call, AgentCall::Ping);
    }

    #[tokio::test]
    async fn unknown_name_is_unreachable() {
        let establisher = SessionEstablisher::new(Arc::new(InMemoryNameService::new()));
        let err = establisher
            .establish("DF/Missing", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LoadTestError::UnreachableActor { .. }));
    }

    #[tokio::test]
    async fn failed_ping_is_not_responding() {
        let agent = Arc::new(SimulatedAgent::new().with_ping(PingBehavior::Fail));
        let establisher = SessionEstablisher::new(directory_with(agent).await);
        let err = establisher
            .establish("DF/MIRADASDFAgent", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LoadTestError::ActorNotResponding { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_ping_times_out() {
        let agent = Arc::new(SimulatedAgent::new().with_ping(PingBehavior::Hang));
        let establisher = SessionEstablisher::new(directory_with(agent).await);
        let err = establisher
            .establish("DF/MIRADASDFAgent", Duration::from_secs(30))
            .await
            .unwrap_err();
        match err {
            LoadTestError::ActorNotResponding { reason, .. } => {
                assert!(reason.contains("30s"), "{reason}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn middleware_is_shared_between_sessions() {
        let agent = Arc::new(SimulatedAgent::new());
        let establisher = SessionEstablisher::new(directory_with(agent).await);

        let first = establisher
            .establish("DF/MIRADASDFAgent", Duration::from_secs(1))
            .await
            .unwrap();
        let second = establisher
            .establish("DF/MIRADASDFAgent", Duration::from_secs(1))
            .await
            .unwrap();

        assert!(std::ptr::eq(first.middleware(), second.middleware()));
    }
}
