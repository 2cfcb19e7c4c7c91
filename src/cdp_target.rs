//! CDP Target Wrapper. One per CDP session: drives the
//! ordered domain-enable sequence and gates concurrent access on an
//! `unblocked` latch until it completes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bidicdp_cdp::{network, page, runtime, target::SetAutoAttachParams};
use bidicdp_types::SessionId;
use tokio::sync::Notify;
use tracing::debug;

use crate::conn::{Connection, RawCdpEvent};
use crate::error::CdpError;
use crate::preload::PreloadScriptStore;

/// One per attached CDP session. Owns nothing beyond the init latch itself
/// — the Network Manager, Realm ownership etc. live in their own stores and
/// are looked up by session id.
pub struct CdpTarget {
    pub target_id: bidicdp_cdp::target::TargetId,
    pub parent_target_id: Option<bidicdp_cdp::target::TargetId>,
    pub session_id: SessionId,
    pub user_context: String,
    /// CDP's `TargetInfo.type` (`"page"`, `"iframe"`, `"worker"`,
    /// `"service_worker"`, `"shared_worker"`, ...), used to classify realms
    /// created under this session.
    pub target_type: String,
    ready: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CdpTarget {
    /// Runs the ordered domain-enable init sequence. Close-errors at any
    /// step are swallowed (the browser may have detached first); any other
    /// error propagates and the target is considered never-unblocked.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        target_id: bidicdp_cdp::target::TargetId,
        parent_target_id: Option<bidicdp_cdp::target::TargetId>,
        session_id: SessionId,
        conn: &Connection,
        network_domain_enabled: bool,
        preload_scripts: &mut PreloadScriptStore,
        user_context: &str,
        target_type: &str,
        auto_attach: SetAutoAttachParams,
    ) -> Result<Self, CdpError> {
        let ready = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());
        let target = Self {
            target_id: target_id.clone(),
            parent_target_id,
            session_id: session_id.clone(),
            user_context: user_context.to_string(),
            target_type: target_type.to_string(),
            ready: ready.clone(),
            notify: notify.clone(),
        };

        let session = Some(session_id.0.as_str());
        debug!(target = %target_id.0, %session_id, "initializing CDP target");

        if network_domain_enabled {
            swallow_close_error(conn.execute(session, network::EnableParams::default()).await)?;
        }
        swallow_close_error(conn.execute(session, runtime::EnableParams {}).await)?;
        swallow_close_error(conn.execute(session, page::EnableParams {}).await)?;
        swallow_close_error(
            conn.execute(session, page::SetLifecycleEventsEnabledParams { enabled: true })
                .await,
        )?;
        swallow_close_error(conn.execute(session, auto_attach).await)?;

        match preload_scripts
            .install_on_target(&target_id, session_id.0.as_str(), user_context, conn)
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_close_error() => {}
            Err(err) => return Err(err),
        }

        swallow_close_error(conn.execute(session, runtime::RunIfWaitingForDebuggerParams {}).await)?;

        ready.store(true, Ordering::SeqCst);
        notify.notify_waiters();
        Ok(target)
    }

    /// Blocks until every init step has completed. Concurrent accessors
    /// serialize through this latch.
    pub async fn wait_unblocked(&self) {
        loop {
            if self.ready.load(Ordering::SeqCst) {
                return;
            }
            let notified = self.notify.notified();
            if self.ready.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    pub fn is_unblocked(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Spawns the wildcard relay: every raw CDP event on this session is
    /// handed to `on_event` for re-emission as `cdp.eventReceived`, the
    /// single atomic event the `cdp` module exposes.
    pub fn spawn_wildcard_relay<F>(&self, conn: &Connection, mut on_event: F) -> tokio::task::JoinHandle<()>
    where
        F: FnMut(RawCdpEvent) + Send + 'static,
    {
        let mut events = conn.subscribe_events();
        let session_id = self.session_id.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.session_id.as_deref() == Some(session_id.0.as_str()) => on_event(event),
                    Ok(_) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

fn swallow_close_error<T>(result: Result<T, CdpError>) -> Result<(), CdpError> {
    match result {
        Ok(_) => Ok(()),
        Err(err) if err.is_close_error() => Ok(()),
        Err(err) => Err(err),
    }
}
