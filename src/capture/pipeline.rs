//! Per-tab capture pipeline.
//!
//! [`CapturePipeline`] wraps a captured tab stream and its audio graph
//! (source → gain → output) behind an explicit state machine:
//!
//! ```text
//! Detached ──attach──▶ Attached ──release──▶ Released (terminal)
//! ```
//!
//! Every transition is guarded: attaching an attached pipeline and
//! releasing a released one are no-ops, which is what lets racing
//! lifecycle events resolve without per-tab locks. A released pipeline
//! never comes back; re-attaching a tab starts a fresh one.
//!
//! The audio-graph primitives are external capabilities behind the
//! [`AudioBackend`] family of traits; the real implementation sits on the
//! host's audio stack, tests use instrumented mocks.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::{StreamId, TabId};
use crate::volume::gain_multiplier;

// ============================================================================
// Audio Graph Capabilities
// ============================================================================

/// Factory for capture streams and audio-processing contexts.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Opens the captured media stream behind a stream handle.
    ///
    /// # Errors
    ///
    /// [`Error::Capture`] when the stream cannot be acquired
    /// (unsupported tab, revoked handle).
    async fn open_stream(
        &self,
        tab_id: TabId,
        stream_id: &StreamId,
    ) -> Result<Box<dyn MediaStream>>;

    /// Creates a fresh audio-processing context.
    async fn create_context(&self, tab_id: TabId) -> Result<Box<dyn AudioContext>>;
}

/// A captured media stream.
pub trait MediaStream: Send {
    /// Stops every underlying media track.
    fn stop_tracks(&mut self);
}

/// An audio-processing context owning the node graph.
#[async_trait]
pub trait AudioContext: Send {
    /// Creates a source node fed by a captured stream.
    fn create_source(&mut self, stream: &dyn MediaStream) -> Result<Box<dyn SourceNode>>;

    /// Creates a gain node.
    fn create_gain(&mut self) -> Result<Box<dyn GainNode>>;

    /// Returns `true` if the context is currently suspended.
    fn is_suspended(&self) -> bool;

    /// Resumes a suspended context. Idempotent.
    async fn resume(&mut self) -> Result<()>;

    /// Closes the context, releasing its processing resources.
    async fn close(&mut self) -> Result<()>;
}

/// A node feeding captured audio into the graph.
pub trait SourceNode: Send {
    /// Connects this source into a gain node.
    fn connect(&mut self, gain: &mut dyn GainNode) -> Result<()>;

    /// Disconnects the node, tolerating an already-disconnected state.
    fn disconnect(&mut self);
}

/// A linear gain node.
pub trait GainNode: Send {
    /// Connects this node to the context's output destination.
    fn connect_destination(&mut self) -> Result<()>;

    /// Sets the gain value.
    fn set_gain(&mut self, value: f64);

    /// Disconnects the node, tolerating an already-disconnected state.
    fn disconnect(&mut self);
}

// ============================================================================
// PipelineState
// ============================================================================

/// Lifecycle state of a capture pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No resources held; attach may be attempted.
    Detached,
    /// Stream captured and graph wired; gain updates apply.
    Attached,
    /// Terminal: resources torn down, pipeline unusable.
    Released,
}

// ============================================================================
// CapturePipeline
// ============================================================================

/// Out-of-page audio routing for one tab.
///
/// Exclusively owned by the pipeline surface; all resources are released
/// exactly once.
pub struct CapturePipeline {
    /// Tab this pipeline captures.
    tab_id: TabId,
    /// Current lifecycle state.
    state: PipelineState,
    /// Captured media stream.
    stream: Option<Box<dyn MediaStream>>,
    /// Audio-processing context.
    context: Option<Box<dyn AudioContext>>,
    /// Stream source node.
    source: Option<Box<dyn SourceNode>>,
    /// Gain node.
    gain: Option<Box<dyn GainNode>>,
}

impl CapturePipeline {
    /// Creates a detached pipeline for a tab.
    #[must_use]
    pub fn new(tab_id: TabId) -> Self {
        Self {
            tab_id,
            state: PipelineState::Detached,
            stream: None,
            context: None,
            source: None,
            gain: None,
        }
    }

    /// Returns the pipeline's lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Returns the tab this pipeline captures.
    #[inline]
    #[must_use]
    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    /// Acquires the stream and wires source → gain → output, gain 1.0.
    ///
    /// No-op when already attached. Failure tears down any partially
    /// acquired resources and leaves the pipeline detached for a later
    /// retry.
    ///
    /// # Errors
    ///
    /// [`Error::Capture`] on acquisition or graph failure, or when the
    /// pipeline was already released.
    pub async fn attach(&mut self, backend: &dyn AudioBackend, stream_id: &StreamId) -> Result<()> {
        match self.state {
            PipelineState::Attached => return Ok(()),
            PipelineState::Released => {
                return Err(Error::capture(
                    self.tab_id,
                    "released pipeline cannot be re-attached",
                ));
            }
            PipelineState::Detached => {}
        }

        let mut stream = backend.open_stream(self.tab_id, stream_id).await?;

        let mut context = match backend.create_context(self.tab_id).await {
            Ok(context) => context,
            Err(e) => {
                stream.stop_tracks();
                return Err(e);
            }
        };

        let (source, gain) = match Self::wire_graph(context.as_mut(), stream.as_ref()) {
            Ok(nodes) => nodes,
            Err(e) => {
                stream.stop_tracks();
                if let Err(close_err) = context.close().await {
                    warn!(tab_id = %self.tab_id, error = %close_err, "Failed to close context after wiring failure");
                }
                return Err(e);
            }
        };

        self.stream = Some(stream);
        self.context = Some(context);
        self.source = Some(source);
        self.gain = Some(gain);
        self.state = PipelineState::Attached;

        debug!(tab_id = %self.tab_id, "Capture pipeline attached");
        Ok(())
    }

    /// Applies a volume/mute setting to the gain node.
    ///
    /// Resumes a suspended context first. No-op unless attached.
    ///
    /// # Errors
    ///
    /// [`Error::Capture`] if resuming the context fails.
    pub async fn set_gain(&mut self, volume: u16, muted: bool) -> Result<()> {
        if self.state != PipelineState::Attached {
            return Ok(());
        }

        if let Some(context) = self.context.as_mut()
            && context.is_suspended()
        {
            context.resume().await?;
        }

        let value = if muted { 0.0 } else { gain_multiplier(volume) };
        if let Some(gain) = self.gain.as_mut() {
            gain.set_gain(value);
        }

        debug!(tab_id = %self.tab_id, gain = value, "Capture gain updated");
        Ok(())
    }

    /// Tears down the graph: disconnect nodes, stop tracks, close context.
    ///
    /// Idempotent; a detached or released pipeline is left untouched.
    /// Teardown failures are logged, never propagated.
    pub async fn release(&mut self) {
        if self.state != PipelineState::Attached {
            return;
        }

        if let Some(mut source) = self.source.take() {
            source.disconnect();
        }
        if let Some(mut gain) = self.gain.take() {
            gain.disconnect();
        }
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
        }
        if let Some(mut context) = self.context.take()
            && let Err(e) = context.close().await
        {
            warn!(tab_id = %self.tab_id, error = %e, "Failed to close audio context");
        }

        self.state = PipelineState::Released;
        debug!(tab_id = %self.tab_id, "Capture pipeline released");
    }

    /// Builds and connects the node graph on a fresh context.
    fn wire_graph(
        context: &mut dyn AudioContext,
        stream: &dyn MediaStream,
    ) -> Result<(Box<dyn SourceNode>, Box<dyn GainNode>)> {
        let mut source = context.create_source(stream)?;
        let mut gain = context.create_gain()?;
        source.connect(gain.as_mut())?;
        gain.connect_destination()?;
        gain.set_gain(1.0);
        Ok((source, gain))
    }
}

impl std::fmt::Debug for CapturePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturePipeline")
            .field("tab_id", &self.tab_id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use parking_lot::Mutex;

    /// Shared probe recording what the mock graph saw.
    #[derive(Debug, Default)]
    struct Probe {
        gain_values: Mutex<Vec<f64>>,
        tracks_stopped: AtomicBool,
        context_closed: AtomicBool,
        source_disconnected: AtomicBool,
        resumed: AtomicBool,
    }

    struct MockStream {
        probe: Arc<Probe>,
    }

    impl MediaStream for MockStream {
        fn stop_tracks(&mut self) {
            self.probe.tracks_stopped.store(true, Ordering::SeqCst);
        }
    }

    struct MockContext {
        probe: Arc<Probe>,
        suspended: bool,
    }

    #[async_trait]
    impl AudioContext for MockContext {
        fn create_source(&mut self, _stream: &dyn MediaStream) -> Result<Box<dyn SourceNode>> {
            Ok(Box::new(MockSource {
                probe: Arc::clone(&self.probe),
            }))
        }

        fn create_gain(&mut self) -> Result<Box<dyn GainNode>> {
            Ok(Box::new(MockGain {
                probe: Arc::clone(&self.probe),
            }))
        }

        fn is_suspended(&self) -> bool {
            self.suspended
        }

        async fn resume(&mut self) -> Result<()> {
            self.suspended = false;
            self.probe.resumed.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            self.probe.context_closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MockSource {
        probe: Arc<Probe>,
    }

    impl SourceNode for MockSource {
        fn connect(&mut self, _gain: &mut dyn GainNode) -> Result<()> {
            Ok(())
        }

        fn disconnect(&mut self) {
            self.probe.source_disconnected.store(true, Ordering::SeqCst);
        }
    }

    struct MockGain {
        probe: Arc<Probe>,
    }

    impl GainNode for MockGain {
        fn connect_destination(&mut self) -> Result<()> {
            Ok(())
        }

        fn set_gain(&mut self, value: f64) {
            self.probe.gain_values.lock().push(value);
        }

        fn disconnect(&mut self) {}
    }

    struct MockBackend {
        probe: Arc<Probe>,
        fail_stream: bool,
        start_suspended: bool,
    }

    impl MockBackend {
        fn new(probe: Arc<Probe>) -> Self {
            Self {
                probe,
                fail_stream: false,
                start_suspended: false,
            }
        }
    }

    #[async_trait]
    impl AudioBackend for MockBackend {
        async fn open_stream(
            &self,
            tab_id: TabId,
            _stream_id: &StreamId,
        ) -> Result<Box<dyn MediaStream>> {
            if self.fail_stream {
                return Err(Error::capture(tab_id, "stream unavailable"));
            }
            Ok(Box::new(MockStream {
                probe: Arc::clone(&self.probe),
            }))
        }

        async fn create_context(&self, _tab_id: TabId) -> Result<Box<dyn AudioContext>> {
            Ok(Box::new(MockContext {
                probe: Arc::clone(&self.probe),
                suspended: self.start_suspended,
            }))
        }
    }

    #[tokio::test]
    async fn test_attach_wires_graph_at_unity_gain() {
        let probe = Arc::new(Probe::default());
        let backend = MockBackend::new(Arc::clone(&probe));
        let mut pipeline = CapturePipeline::new(TabId::new(1));

        pipeline
            .attach(&backend, &StreamId::new("s"))
            .await
            .expect("attach");

        assert_eq!(pipeline.state(), PipelineState::Attached);
        assert_eq!(*probe.gain_values.lock(), vec![1.0]);
    }

    #[tokio::test]
    async fn test_attach_twice_is_noop() {
        let probe = Arc::new(Probe::default());
        let backend = MockBackend::new(Arc::clone(&probe));
        let mut pipeline = CapturePipeline::new(TabId::new(1));

        pipeline
            .attach(&backend, &StreamId::new("s"))
            .await
            .expect("attach");
        pipeline
            .attach(&backend, &StreamId::new("s"))
            .await
            .expect("re-attach");

        // A second attach builds nothing: still one unity-gain write.
        assert_eq!(probe.gain_values.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_attach_failure_leaves_detached() {
        let probe = Arc::new(Probe::default());
        let mut backend = MockBackend::new(Arc::clone(&probe));
        backend.fail_stream = true;
        let mut pipeline = CapturePipeline::new(TabId::new(1));

        let err = pipeline
            .attach(&backend, &StreamId::new("s"))
            .await
            .unwrap_err();
        assert!(err.is_capture());
        assert_eq!(pipeline.state(), PipelineState::Detached);
    }

    #[tokio::test]
    async fn test_set_gain_applies_multiplier_and_mute() {
        let probe = Arc::new(Probe::default());
        let backend = MockBackend::new(Arc::clone(&probe));
        let mut pipeline = CapturePipeline::new(TabId::new(1));

        pipeline
            .attach(&backend, &StreamId::new("s"))
            .await
            .expect("attach");
        pipeline.set_gain(150, false).await.expect("set");
        pipeline.set_gain(150, true).await.expect("mute");

        assert_eq!(*probe.gain_values.lock(), vec![1.0, 1.5, 0.0]);
    }

    #[tokio::test]
    async fn test_set_gain_resumes_suspended_context() {
        let probe = Arc::new(Probe::default());
        let mut backend = MockBackend::new(Arc::clone(&probe));
        backend.start_suspended = true;
        let mut pipeline = CapturePipeline::new(TabId::new(1));

        pipeline
            .attach(&backend, &StreamId::new("s"))
            .await
            .expect("attach");
        pipeline.set_gain(100, false).await.expect("set");

        assert!(probe.resumed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_set_gain_detached_is_noop() {
        let mut pipeline = CapturePipeline::new(TabId::new(1));
        pipeline.set_gain(100, false).await.expect("noop");
        assert_eq!(pipeline.state(), PipelineState::Detached);
    }

    #[tokio::test]
    async fn test_release_tears_down_everything() {
        let probe = Arc::new(Probe::default());
        let backend = MockBackend::new(Arc::clone(&probe));
        let mut pipeline = CapturePipeline::new(TabId::new(1));

        pipeline
            .attach(&backend, &StreamId::new("s"))
            .await
            .expect("attach");
        pipeline.release().await;

        assert_eq!(pipeline.state(), PipelineState::Released);
        assert!(probe.source_disconnected.load(Ordering::SeqCst));
        assert!(probe.tracks_stopped.load(Ordering::SeqCst));
        assert!(probe.context_closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let probe = Arc::new(Probe::default());
        let backend = MockBackend::new(Arc::clone(&probe));
        let mut pipeline = CapturePipeline::new(TabId::new(1));

        pipeline.release().await;
        assert_eq!(pipeline.state(), PipelineState::Detached);

        pipeline
            .attach(&backend, &StreamId::new("s"))
            .await
            .expect("attach");
        pipeline.release().await;
        pipeline.release().await;
        assert_eq!(pipeline.state(), PipelineState::Released);
    }

    #[tokio::test]
    async fn test_released_pipeline_refuses_reattach() {
        let probe = Arc::new(Probe::default());
        let backend = MockBackend::new(Arc::clone(&probe));
        let mut pipeline = CapturePipeline::new(TabId::new(1));

        pipeline
            .attach(&backend, &StreamId::new("s"))
            .await
            .expect("attach");
        pipeline.release().await;

        let err = pipeline
            .attach(&backend, &StreamId::new("s"))
            .await
            .unwrap_err();
        assert!(err.is_capture());
    }

    #[tokio::test]
    async fn test_set_gain_after_release_is_noop() {
        let probe = Arc::new(Probe::default());
        let backend = MockBackend::new(Arc::clone(&probe));
        let mut pipeline = CapturePipeline::new(TabId::new(1));

        pipeline
            .attach(&backend, &StreamId::new("s"))
            .await
            .expect("attach");
        pipeline.release().await;
        pipeline.set_gain(50, false).await.expect("noop");

        // Only the unity gain from attach was ever written.
        assert_eq!(*probe.gain_values.lock(), vec![1.0]);
    }
}
