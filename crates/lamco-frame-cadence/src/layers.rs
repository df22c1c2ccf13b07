//! Layer quality convergence tracking
//!
//! Each spatial or simulcast layer reports whether its encoder output has
//! converged to the target quality. The zero-hertz scheduler repeats frames
//! quickly until every enabled layer has converged, then falls back to the
//! idle repeat rate.

use tracing::debug;

/// Highest number of layers tracked; feedback for later indices is ignored
pub const MAX_TRACKED_LAYERS: usize = 32;

/// State of a single layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayerState {
    /// Whether the layer is currently being encoded
    pub enabled: bool,

    /// Whether the layer's quality has converged
    pub converged: bool,
}

/// Per-layer enabled/converged flags
#[derive(Debug, Clone, Default)]
pub struct LayerConvergenceTracker {
    layers: Vec<LayerState>,
}

impl LayerConvergenceTracker {
    /// Create a tracker for `num_layers` disabled, unconverged layers
    pub fn new(num_layers: usize) -> Self {
        Self {
            layers: vec![LayerState::default(); num_layers.min(MAX_TRACKED_LAYERS)],
        }
    }

    /// Enable or disable a layer
    ///
    /// The layer always restarts unconverged. Disabling a layer also
    /// invalidates the convergence of the remaining layers, since the
    /// encoder redistributes its budget.
    pub fn set_layer_enabled(&mut self, index: usize, enabled: bool) {
        let Some(layer) = self.layer_mut(index) else {
            return;
        };
        *layer = LayerState {
            enabled,
            converged: false,
        };
        if !enabled {
            self.reset_convergence();
        }
    }

    /// Record quality convergence feedback for a layer
    pub fn set_layer_converged(&mut self, index: usize, converged: bool) {
        if let Some(layer) = self.layer_mut(index) {
            layer.converged = converged;
        }
    }

    /// Mark every enabled layer unconverged
    pub fn reset_convergence(&mut self) {
        for layer in self.layers.iter_mut().filter(|layer| layer.enabled) {
            layer.converged = false;
        }
    }

    /// True when at least one layer is enabled and all enabled layers have
    /// converged
    pub fn is_settled(&self) -> bool {
        let mut enabled = self.layers.iter().filter(|layer| layer.enabled).peekable();
        enabled.peek().is_some() && enabled.all(|layer| layer.converged)
    }

    /// Number of tracked layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True when no layers are tracked
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// State of a tracked layer
    pub fn layer(&self, index: usize) -> Option<LayerState> {
        self.layers.get(index).copied()
    }

    fn layer_mut(&mut self, index: usize) -> Option<&mut LayerState> {
        if index >= MAX_TRACKED_LAYERS {
            debug!("Ignoring feedback for layer {} beyond tracked range", index);
            return None;
        }
        if index >= self.layers.len() {
            self.layers.resize(index + 1, LayerState::default());
        }
        self.layers.get_mut(index)
    }
}
