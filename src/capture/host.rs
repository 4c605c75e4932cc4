//! Pipeline surface: the hidden execution context hosting capture
//! pipelines.
//!
//! The orchestrator never owns pipelines directly; it sends typed
//! [`SurfaceRequest`]s to a surface that does. [`PipelineHost`] is the
//! in-process implementation: a spawned event-loop task owning every
//! pipeline, processing requests one at a time and acking each through a
//! oneshot. Serializing all pipeline mutation on one task is what makes
//! attach/release idempotence sufficient: no per-tab lock exists or is
//! needed.
//!
//! [`PipelineSurface`] is the orchestrator-facing handle. It creates the
//! host task lazily on first use and reuses it afterwards, mirroring a
//! detect-or-create singleton surface.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::{StreamId, TabId};
use crate::protocol::{SurfaceAck, SurfaceCommand, SurfaceRequest};

use super::pipeline::{AudioBackend, CapturePipeline};

// ============================================================================
// CaptureSurface
// ============================================================================

/// Orchestrator-facing surface capability.
///
/// All operations are idempotent: attaching an attached tab, or touching
/// a tab without a pipeline, acks success.
#[async_trait]
pub trait CaptureSurface: Send + Sync {
    /// Creates the surface if it does not exist yet.
    async fn ensure_created(&self) -> Result<()>;

    /// Builds a capture pipeline for a tab from a stream handle.
    async fn attach(&self, tab_id: TabId, stream_id: StreamId) -> Result<()>;

    /// Updates the gain of a tab's pipeline.
    async fn set_audio(&self, tab_id: TabId, volume: u16, muted: bool) -> Result<()>;

    /// Tears down a tab's pipeline.
    async fn release(&self, tab_id: TabId) -> Result<()>;
}

// ============================================================================
// HostCommand
// ============================================================================

/// Internal commands for the host event loop.
enum HostCommand {
    /// Process a surface request and ack it.
    Request {
        request: SurfaceRequest,
        ack_tx: oneshot::Sender<SurfaceAck>,
    },
    /// Release every pipeline and stop the loop.
    Shutdown,
}

// ============================================================================
// PipelineHost
// ============================================================================

/// Event-loop task owning all capture pipelines.
pub struct PipelineHost;

impl PipelineHost {
    /// Spawns the host task and returns its handle.
    #[must_use]
    pub fn spawn(backend: Arc<dyn AudioBackend>) -> SurfaceHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::run_event_loop(backend, command_rx));
        SurfaceHandle { command_tx }
    }

    /// Event loop processing surface requests.
    async fn run_event_loop(
        backend: Arc<dyn AudioBackend>,
        mut command_rx: mpsc::UnboundedReceiver<HostCommand>,
    ) {
        let mut pipelines: FxHashMap<TabId, CapturePipeline> = FxHashMap::default();

        while let Some(command) = command_rx.recv().await {
            match command {
                HostCommand::Request { request, ack_tx } => {
                    let ack = Self::handle_request(&backend, &mut pipelines, request).await;
                    let _ = ack_tx.send(ack);
                }

                HostCommand::Shutdown => {
                    debug!("Shutdown command received");
                    break;
                }
            }
        }

        // Release every pipeline on shutdown
        let count = pipelines.len();
        for (_, mut pipeline) in pipelines.drain() {
            pipeline.release().await;
        }
        if count > 0 {
            debug!(count, "Released pipelines on shutdown");
        }

        debug!("Pipeline host terminated");
    }

    /// Handles one surface request against the pipeline map.
    async fn handle_request(
        backend: &Arc<dyn AudioBackend>,
        pipelines: &mut FxHashMap<TabId, CapturePipeline>,
        request: SurfaceRequest,
    ) -> SurfaceAck {
        let id = request.id;

        match request.command {
            SurfaceCommand::AttachTabStream { tab_id, stream_id } => {
                if pipelines.contains_key(&tab_id) {
                    debug!(tab_id = %tab_id, "Tab already attached");
                    return SurfaceAck::success(id);
                }

                let mut pipeline = CapturePipeline::new(tab_id);
                match pipeline.attach(backend.as_ref(), &stream_id).await {
                    Ok(()) => {
                        pipelines.insert(tab_id, pipeline);
                        SurfaceAck::success(id)
                    }
                    Err(e) => {
                        warn!(tab_id = %tab_id, error = %e, "Pipeline attach failed");
                        SurfaceAck::failure(id, e.to_string())
                    }
                }
            }

            SurfaceCommand::SetTabAudio {
                tab_id,
                volume,
                muted,
            } => match pipelines.get_mut(&tab_id) {
                Some(pipeline) => match pipeline.set_gain(volume, muted).await {
                    Ok(()) => SurfaceAck::success(id),
                    Err(e) => {
                        warn!(tab_id = %tab_id, error = %e, "Gain update failed");
                        SurfaceAck::failure(id, e.to_string())
                    }
                },
                None => SurfaceAck::success(id),
            },

            SurfaceCommand::ReleaseTabStream { tab_id } => {
                if let Some(mut pipeline) = pipelines.remove(&tab_id) {
                    pipeline.release().await;
                }
                SurfaceAck::success(id)
            }
        }
    }
}

// ============================================================================
// SurfaceHandle
// ============================================================================

/// Channel handle to a running [`PipelineHost`] task.
#[derive(Clone)]
pub struct SurfaceHandle {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<HostCommand>,
}

impl SurfaceHandle {
    /// Sends a command and waits for its ack.
    ///
    /// # Errors
    ///
    /// - [`Error::SurfaceClosed`] if the host task is gone
    /// - [`Error::Capture`] if the surface acked a failure
    pub async fn request(&self, command: SurfaceCommand) -> Result<()> {
        let tab_id = command.tab_id();
        let request = SurfaceRequest::new(command);
        let (ack_tx, ack_rx) = oneshot::channel();

        self.command_tx
            .send(HostCommand::Request { request, ack_tx })
            .map_err(|_| Error::SurfaceClosed)?;

        let ack = ack_rx.await.map_err(|_| Error::SurfaceClosed)?;
        if ack.ok {
            Ok(())
        } else {
            Err(Error::capture(
                tab_id,
                ack.error.unwrap_or_else(|| "surface rejected request".to_string()),
            ))
        }
    }

    /// Asks the host to release every pipeline and stop.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(HostCommand::Shutdown);
    }
}

// ============================================================================
// PipelineSurface
// ============================================================================

/// Lazily-created singleton surface backed by [`PipelineHost`].
pub struct PipelineSurface {
    /// Backend handed to the host task on creation.
    backend: Arc<dyn AudioBackend>,
    /// Handle of the running host, once created.
    handle: Mutex<Option<SurfaceHandle>>,
}

impl PipelineSurface {
    /// Creates a surface that will spawn its host on first use.
    #[must_use]
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            backend,
            handle: Mutex::new(None),
        }
    }

    /// Returns the live handle, spawning the host task if needed.
    fn handle(&self) -> SurfaceHandle {
        let mut guard = self.handle.lock();
        if let Some(handle) = guard.as_ref() {
            return handle.clone();
        }

        debug!("Creating pipeline surface");
        let handle = PipelineHost::spawn(Arc::clone(&self.backend));
        *guard = Some(handle.clone());
        handle
    }

    /// Stops the host task, releasing every pipeline.
    ///
    /// A later call re-creates the surface from scratch.
    pub fn shutdown(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.shutdown();
        }
    }
}

#[async_trait]
impl CaptureSurface for PipelineSurface {
    async fn ensure_created(&self) -> Result<()> {
        let _ = self.handle();
        Ok(())
    }

    async fn attach(&self, tab_id: TabId, stream_id: StreamId) -> Result<()> {
        self.handle()
            .request(SurfaceCommand::AttachTabStream { tab_id, stream_id })
            .await
    }

    async fn set_audio(&self, tab_id: TabId, volume: u16, muted: bool) -> Result<()> {
        self.handle()
            .request(SurfaceCommand::SetTabAudio {
                tab_id,
                volume,
                muted,
            })
            .await
    }

    async fn release(&self, tab_id: TabId) -> Result<()> {
        self.handle()
            .request(SurfaceCommand::ReleaseTabStream { tab_id })
            .await
    }
}

// ============================================================================
// Tests
// ============================================================================
