use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::ModuleResolver;

/// One installed revision of a module: what it provides, what it needs, and how it
/// wants to be activated.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ModuleRevision {
    symbolic_name: String,
    version: String,
    provides: Vec<String>,
    requires: Vec<String>,
    lazy_activation: bool,
}

impl ModuleRevision {
    pub fn new(symbolic_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            symbolic_name: symbolic_name.into(),
            version: version.into(),
            provides: Vec::new(),
            requires: Vec::new(),
            lazy_activation: false,
        }
    }

    pub fn provides(mut self, capability: impl Into<String>) -> Self {
        self.provides.push(capability.into());
        self
    }

    pub fn requires(mut self, capability: impl Into<String>) -> Self {
        self.requires.push(capability.into());
        self
    }

    /// Declare the lazy activation policy.
    pub fn lazy_activation(mut self, lazy: bool) -> Self {
        self.lazy_activation = lazy;
        self
    }

    pub fn symbolic_name(&self) -> &str {
        &self.symbolic_name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn provided_capabilities(&self) -> &[String] {
        &self.provides
    }

    pub fn required_capabilities(&self) -> &[String] {
        &self.requires
    }

    pub fn declares_lazy_activation(&self) -> bool {
        self.lazy_activation
    }
}

/// Revision history of a module plus the handle back to its container.
///
/// The newest revision is current. Mutation goes through a held
/// [`TransitionGuard`](super::TransitionGuard).
pub struct ModuleRevisions {
    revisions: RwLock<Vec<Arc<ModuleRevision>>>,
    uninstalled: AtomicBool,
    container: Weak<dyn ModuleResolver>,
}

impl ModuleRevisions {
    pub fn new(initial: ModuleRevision, container: Weak<dyn ModuleResolver>) -> Self {
        Self {
            revisions: RwLock::new(vec![Arc::new(initial)]),
            uninstalled: AtomicBool::new(false),
            container,
        }
    }

    /// Current revision, or `None` once the module is uninstalled.
    pub fn current(&self) -> Option<Arc<ModuleRevision>> {
        if self.is_uninstalled() {
            return None;
        }
        self.revisions.read().last().cloned()
    }

    /// All revisions, oldest first.
    pub fn all(&self) -> Vec<Arc<ModuleRevision>> {
        self.revisions.read().clone()
    }

    pub fn is_uninstalled(&self) -> bool {
        self.uninstalled.load(Ordering::Acquire)
    }

    /// The container's resolver, if the container is still alive.
    pub fn container(&self) -> Option<Arc<dyn ModuleResolver>> {
        self.container.upgrade()
    }

    pub(crate) fn push(&self, revision: ModuleRevision) -> Option<Arc<ModuleRevision>> {
        let mut revisions = self.revisions.write();
        let previous = revisions.last().cloned();
        revisions.push(Arc::new(revision));
        previous
    }

    pub(crate) fn mark_uninstalled(&self) {
        self.uninstalled.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for ModuleRevisions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRevisions")
            .field("revisions", &*self.revisions.read())
            .field("uninstalled", &self.is_uninstalled())
            .finish()
    }
}
