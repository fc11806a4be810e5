use crate::models::{AnalysisSnapshot, ViewMode};
use std::sync::Arc;

/// One global slot and one current slot. Snapshots are replaced wholesale, never patched.
#[derive(Debug, Clone, Default)]
pub struct AnalysisCache {
    global: Option<Arc<AnalysisSnapshot>>,
    current: Option<Arc<AnalysisSnapshot>>,
    view_mode: ViewMode,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global(&self) -> Option<&Arc<AnalysisSnapshot>> {
        self.global.as_ref()
    }

    pub fn current(&self) -> Option<&Arc<AnalysisSnapshot>> {
        self.current.as_ref()
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn has_global(&self) -> bool {
        self.global.is_some()
    }

    /// Caches an unscoped snapshot; it only becomes current when the filters are still global.
    pub fn store_global(&mut self, snapshot: Arc<AnalysisSnapshot>, activate: bool) {
        self.global = Some(Arc::clone(&snapshot));
        if activate {
            self.current = Some(snapshot);
            self.view_mode = ViewMode::Global;
        }
    }

    /// Never touches the global slot.
    pub fn store_scoped(&mut self, snapshot: Arc<AnalysisSnapshot>) {
        self.current = Some(snapshot);
        self.view_mode = ViewMode::Scoped;
    }

    /// Reuses the cached global snapshot. Returns false when there is nothing to reuse.
    pub fn restore_global(&mut self) -> bool {
        match &self.global {
            Some(global) => {
                self.current = Some(Arc::clone(global));
                self.view_mode = ViewMode::Global;
                true
            }
            None => false,
        }
    }

    pub fn mark_global_view(&mut self) {
        self.view_mode = ViewMode::Global;
    }
}
