//! Control orchestration and state reconciliation.
//!
//! [`Orchestrator`] is the single decision point of the engine. Every
//! user intent (set volume, set mute, apply, read state) and every
//! lifecycle event (tab created/updated/removed, window removed) funnels
//! through it; it consults the registry and dispatches to the page path
//! or the capture path per tab.
//!
//! # Control paths
//!
//! For each capturable tab, in-page application is tried first. If the
//! page rejects script execution the tab falls back to a capture
//! pipeline on the surface; if a later in-page application succeeds the
//! pipeline is released again; the page path is the cheaper steady
//! state.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tab_volume::{Orchestrator, PipelineSurface};
//!
//! # async fn example(
//! #     host: Arc<dyn tab_volume::BrowserHost>,
//! #     backend: Arc<dyn tab_volume::AudioBackend>,
//! # ) -> tab_volume::Result<()> {
//! # let window_id = tab_volume::WindowId::new(1);
//! let engine = Orchestrator::builder()
//!     .host(host)
//!     .surface(Arc::new(PipelineSurface::new(backend)))
//!     .build()?;
//!
//! engine.initialize().await?;
//! let (state, summary) = engine.set_volume_for(window_id, 80.0).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::browser::{BrowserHost, TabChange, TabInfo};
use crate::capture::CaptureSurface;
use crate::error::{Error, Result};
use crate::identifiers::{TabId, WindowId};
use crate::protocol::{ApplySummary, Request, Response};
use crate::registry::TabWindowRegistry;
use crate::settings::{AudioSettings, MemoryStore, SettingsStore};
use crate::volume::sanitize_volume;

// ============================================================================
// Types
// ============================================================================

/// Shared engine state, mutated only from the control context.
struct EngineState {
    /// Process-wide default settings.
    global: AudioSettings,
    /// Per-window desired state, lazily seeded from `global`.
    windows: FxHashMap<WindowId, AudioSettings>,
    /// Tab→window and attachment bookkeeping.
    registry: TabWindowRegistry,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Per-window volume control engine.
///
/// One instance per process; owns all mutable engine state and exposes
/// it only through its methods. Construction goes through
/// [`Orchestrator::builder`].
pub struct Orchestrator {
    /// Browser capabilities.
    host: Arc<dyn BrowserHost>,
    /// Capture pipeline surface.
    surface: Arc<dyn CaptureSurface>,
    /// Persisted settings storage.
    store: Arc<dyn SettingsStore>,
    /// Mutable engine state. Never held across an await.
    state: Mutex<EngineState>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Orchestrator")
            .field("global", &state.global)
            .field("windows", &state.windows.len())
            .field("attached", &state.registry.attached_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Orchestrator - Construction
// ============================================================================

impl Orchestrator {
    /// Returns a builder for the engine.
    #[must_use]
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Loads persisted global settings.
    ///
    /// Call once at startup. A missing record keeps the defaults
    /// (volume 100, unmuted); persisted values are sanitized.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] if the store fails to read; the engine
    /// stays usable with default settings.
    pub async fn initialize(&self) -> Result<()> {
        if let Some(persisted) = self.store.load().await? {
            let sanitized = AudioSettings::sanitized(f64::from(persisted.volume), persisted.muted);
            self.state.lock().global = sanitized;
            info!(volume = sanitized.volume, muted = sanitized.muted, "Settings restored");
        }
        Ok(())
    }
}

// ============================================================================
// Orchestrator - State Access
// ============================================================================

impl Orchestrator {
    /// Returns a window's current state, initializing it from the global
    /// settings on first access.
    #[must_use]
    pub fn get_state(&self, window_id: WindowId) -> AudioSettings {
        let mut state = self.state.lock();
        let global = state.global;
        *state.windows.entry(window_id).or_insert(global)
    }

    /// Returns the process-wide default settings.
    #[inline]
    #[must_use]
    pub fn global_settings(&self) -> AudioSettings {
        self.state.lock().global
    }

    /// Returns `true` if a tab currently runs a capture pipeline.
    #[inline]
    #[must_use]
    pub fn is_tab_attached(&self, tab_id: TabId) -> bool {
        self.state.lock().registry.is_attached(tab_id)
    }
}

// ============================================================================
// Orchestrator - Control Operations
// ============================================================================

impl Orchestrator {
    /// Applies a window's current state to all of its live tabs.
    ///
    /// Non-capturable tabs (blocked schemes) count as skipped without an
    /// attempt; capturable tabs count as attached on success of either
    /// path, skipped otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if tab enumeration or a surface send fails;
    /// injection and capture failures are absorbed into the counts.
    pub async fn apply_to_window(&self, window_id: WindowId) -> Result<ApplySummary> {
        let settings = self.get_state(window_id);
        let tabs = self.host.tabs_in_window(window_id).await?;

        let mut summary = ApplySummary::default();
        for tab in &tabs {
            if !tab.is_capturable() {
                summary.skipped_count += 1;
                continue;
            }

            if self.apply_to_tab(tab, Some(settings)).await? {
                summary.attached_count += 1;
            } else {
                summary.skipped_count += 1;
            }
        }

        debug!(
            window_id = %window_id,
            attached = summary.attached_count,
            skipped = summary.skipped_count,
            "Window apply finished"
        );
        Ok(summary)
    }

    /// Applies state to one tab, page path first, capture path second.
    ///
    /// With no `explicit` state the owning window's state is used. On
    /// page-path success any capture pipeline the tab still holds is
    /// released. Returns `Ok(true)` when either path took control.
    ///
    /// # Errors
    ///
    /// Returns an error if a surface send fails after a successful
    /// attach; acquisition failures resolve to `Ok(false)`.
    pub async fn apply_to_tab(
        &self,
        tab: &TabInfo,
        explicit: Option<AudioSettings>,
    ) -> Result<bool> {
        if !tab.is_capturable() {
            return Ok(false);
        }

        let settings = explicit.unwrap_or_else(|| self.get_state(tab.window_id));

        match self
            .host
            .apply_page_audio(tab.id, settings.volume, settings.muted)
            .await
        {
            Ok(()) => {
                // Page path took over; the fallback pipeline is now
                // redundant.
                if self.is_tab_attached(tab.id) {
                    self.cleanup_tab(tab.id).await;
                }
                debug!(tab_id = %tab.id, "Page path applied");
                Ok(true)
            }
            Err(e) => {
                debug!(tab_id = %tab.id, error = %e, "Page path unavailable, trying capture");
                if self.ensure_tab_attached(tab.id, tab.window_id).await {
                    self.surface.ensure_created().await?;
                    self.surface
                        .set_audio(tab.id, settings.volume, settings.muted)
                        .await?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// Sets a window's volume, updates the global baseline, persists and
    /// re-applies.
    ///
    /// Volume 0 also sets the mute flag. Returns the window's state and
    /// the apply summary.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] if the save fails; the in-memory change
    /// has already taken effect.
    pub async fn set_volume_for(
        &self,
        window_id: WindowId,
        raw_volume: f64,
    ) -> Result<(AudioSettings, ApplySummary)> {
        let volume = sanitize_volume(raw_volume);

        let (window_snapshot, global_snapshot) = {
            let mut state = self.state.lock();
            let global = state.global;
            let entry = state.windows.entry(window_id).or_insert(global);
            entry.volume = volume;
            entry.muted = volume == 0;
            let window_snapshot = *entry;
            state.global.volume = volume;
            state.global.muted = window_snapshot.muted;
            (window_snapshot, state.global)
        };

        info!(window_id = %window_id, volume, muted = window_snapshot.muted, "Volume set");
        self.store.save(&global_snapshot).await?;

        let summary = self.apply_to_window(window_id).await?;
        Ok((window_snapshot, summary))
    }

    /// Sets a window's mute flag, updates the global baseline, persists
    /// and re-applies.
    ///
    /// Muting forces the window and global volume to 0; unmuting leaves
    /// the volume wherever it last was.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] if the save fails; the in-memory change
    /// has already taken effect.
    pub async fn set_muted_for(
        &self,
        window_id: WindowId,
        muted: bool,
    ) -> Result<(AudioSettings, ApplySummary)> {
        let (window_snapshot, global_snapshot) = {
            let mut state = self.state.lock();
            let global = state.global;
            let entry = state.windows.entry(window_id).or_insert(global);
            entry.muted = muted;
            if muted {
                entry.volume = 0;
            }
            let window_snapshot = *entry;
            if muted {
                state.global.volume = 0;
            }
            state.global.muted = muted;
            (window_snapshot, state.global)
        };

        info!(window_id = %window_id, muted, "Mute set");
        self.store.save(&global_snapshot).await?;

        let summary = self.apply_to_window(window_id).await?;
        Ok((window_snapshot, summary))
    }
}

// ============================================================================
// Orchestrator - Command Dispatch
// ============================================================================

impl Orchestrator {
    /// Handles a typed command, never propagating an error across the
    /// messaging boundary.
    ///
    /// `sender_window` is the window of the sender's originating tab,
    /// when known; it backs window resolution for requests without an
    /// explicit target.
    pub async fn handle_request(
        &self,
        request: Request,
        sender_window: Option<WindowId>,
    ) -> Response {
        match self.dispatch(request, sender_window).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Request rejected");
                Response::failure(&e)
            }
        }
    }

    /// Handles a JSON-encoded command, returning the JSON response.
    ///
    /// Malformed input yields a protocol-error envelope.
    pub async fn handle_raw(&self, json: &str, sender_window: Option<WindowId>) -> String {
        let response = match serde_json::from_str::<Request>(json) {
            Ok(request) => self.handle_request(request, sender_window).await,
            Err(e) => Response::failure(&Error::protocol(format!("malformed request: {e}"))),
        };

        serde_json::to_string(&response)
            .unwrap_or_else(|_| r#"{"ok":false,"error":"response serialization failed"}"#.into())
    }

    /// Routes a request to its operation.
    async fn dispatch(&self, request: Request, sender_window: Option<WindowId>) -> Result<Response> {
        match request {
            Request::GetState { window_id } => {
                let window_id = self.resolve_window(window_id, sender_window).await?;
                Ok(Response::state(window_id, self.get_state(window_id)))
            }

            Request::ApplyToWindow { window_id } => {
                let window_id = self.resolve_window(window_id, sender_window).await?;
                let summary = self.apply_to_window(window_id).await?;
                Ok(Response::apply(window_id, summary))
            }

            Request::SetVolume { window_id, volume } => {
                let window_id = self.resolve_window(window_id, sender_window).await?;
                let (settings, summary) = self.set_volume_for(window_id, volume).await?;
                Ok(Response::settings(window_id, settings, summary))
            }

            Request::SetMuted { window_id, muted } => {
                let window_id = self.resolve_window(window_id, sender_window).await?;
                let (settings, summary) = self.set_muted_for(window_id, muted).await?;
                Ok(Response::settings(window_id, settings, summary))
            }
        }
    }

    /// Resolves the target window: explicit → sender's tab → focused.
    async fn resolve_window(
        &self,
        explicit: Option<WindowId>,
        sender_window: Option<WindowId>,
    ) -> Result<WindowId> {
        if let Some(window_id) = explicit {
            return Ok(window_id);
        }
        if let Some(window_id) = sender_window {
            return Ok(window_id);
        }
        self.host.focused_window().await
    }
}

// ============================================================================
// Orchestrator - Lifecycle Reconciliation
// ============================================================================

impl Orchestrator {
    /// Records a freshly created tab's window association.
    ///
    /// Tabs of windows that were never initialized are ignored; their
    /// window picks them up on its first state access + apply.
    pub fn on_tab_created(&self, tab: &TabInfo) {
        let mut state = self.state.lock();
        if state.windows.contains_key(&tab.window_id) {
            state.registry.map_tab(tab.id, tab.window_id);
        }
    }

    /// Reconciles a tab update.
    ///
    /// Re-applies control only when the load status completed, the URL
    /// changed, or the audible flag flipped; every other update is
    /// ignored to avoid redundant reapplication.
    pub async fn on_tab_updated(&self, tab: &TabInfo, change: &TabChange) {
        {
            let mut state = self.state.lock();
            if !state.windows.contains_key(&tab.window_id) {
                return;
            }
            state.registry.map_tab(tab.id, tab.window_id);
        }

        if !change.triggers_reapply() {
            return;
        }

        if let Err(e) = self.apply_to_tab(tab, None).await {
            warn!(tab_id = %tab.id, error = %e, "Failed to auto-apply to tab");
        }
    }

    /// Releases a removed tab's pipeline and drops its bookkeeping.
    pub async fn on_tab_removed(&self, tab_id: TabId) {
        self.cleanup_tab(tab_id).await;
    }

    /// Drops a removed window's state and cascades to its tabs.
    pub async fn on_window_removed(&self, window_id: WindowId) {
        let tabs = {
            let mut state = self.state.lock();
            state.windows.remove(&window_id);
            state.registry.tabs_mapped_to(window_id)
        };

        info!(window_id = %window_id, tabs = tabs.len(), "Window removed");
        for tab_id in tabs {
            self.cleanup_tab(tab_id).await;
        }
    }
}

// ============================================================================
// Orchestrator - Internal
// ============================================================================

impl Orchestrator {
    /// Ensures a tab has a live capture pipeline.
    ///
    /// Records the tab→window mapping, then attaches unless already
    /// attached. Returns `false` on acquisition failure; the next apply
    /// retries from scratch.
    async fn ensure_tab_attached(&self, tab_id: TabId, window_id: WindowId) -> bool {
        {
            let mut state = self.state.lock();
            state.registry.map_tab(tab_id, window_id);
            if state.registry.is_attached(tab_id) {
                return true;
            }
        }

        match self.attach_pipeline(tab_id).await {
            Ok(()) => {
                self.state.lock().registry.mark_attached(tab_id);
                debug!(tab_id = %tab_id, "Capture path attached");
                true
            }
            Err(e) => {
                warn!(tab_id = %tab_id, error = %e, "Unable to attach tab");
                self.state.lock().registry.clear_attached(tab_id);
                false
            }
        }
    }

    /// Acquires a stream handle and attaches it on the surface.
    async fn attach_pipeline(&self, tab_id: TabId) -> Result<()> {
        self.surface.ensure_created().await?;
        let stream_id = self.host.media_stream_id(tab_id).await?;
        self.surface.attach(tab_id, stream_id).await
    }

    /// Forgets a tab and releases its pipeline if it had one.
    ///
    /// Release failures are logged, never propagated; the bookkeeping is
    /// already gone and the next attach starts fresh.
    async fn cleanup_tab(&self, tab_id: TabId) {
        let was_attached = self.state.lock().registry.forget_tab(tab_id);
        if !was_attached {
            return;
        }

        if let Err(e) = self.surface.ensure_created().await {
            warn!(tab_id = %tab_id, error = %e, "Surface unavailable for release");
            return;
        }
        if let Err(e) = self.surface.release(tab_id).await {
            warn!(tab_id = %tab_id, error = %e, "Failed to release capture pipeline");
        }
    }
}

// ============================================================================
// OrchestratorBuilder
// ============================================================================

/// Builder wiring the engine's capability objects.
///
/// # Example
///
/// ```ignore
/// let engine = Orchestrator::builder()
///     .host(host)
///     .surface(surface)
///     .store(Arc::new(JsonFileStore::new("settings.json")))
///     .build()?;
/// ```
pub struct OrchestratorBuilder {
    /// Browser capabilities.
    host: Option<Arc<dyn BrowserHost>>,
    /// Capture pipeline surface.
    surface: Option<Arc<dyn CaptureSurface>>,
    /// Persisted settings storage.
    store: Option<Arc<dyn SettingsStore>>,
}

impl OrchestratorBuilder {
    /// Creates an empty builder.
    pub(crate) fn new() -> Self {
        Self {
            host: None,
            surface: None,
            store: None,
        }
    }

    /// Sets the browser capability object. Required.
    #[must_use]
    pub fn host(mut self, host: Arc<dyn BrowserHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// Sets the capture surface. Required.
    #[must_use]
    pub fn surface(mut self, surface: Arc<dyn CaptureSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Sets the settings store. Defaults to an in-memory store.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the host or surface capability is missing.
    pub fn build(self) -> Result<Orchestrator> {
        let host = self
            .host
            .ok_or_else(|| Error::config("missing browser host capability"))?;
        let surface = self
            .surface
            .ok_or_else(|| Error::config("missing capture surface capability"))?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn SettingsStore>);

        Ok(Orchestrator {
            host,
            surface,
            store,
            state: Mutex::new(EngineState {
                global: AudioSettings::default(),
                windows: FxHashMap::default(),
                registry: TabWindowRegistry::new(),
            }),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
