use tessera_domain::{Module, ModuleForest, ModuleNode};
use tracing::warn;

/// Builds a navigation forest from a flat module listing.
///
/// Modules with a missing or inactive parent become roots. Parent cycles are
/// cut and logged rather than reported as errors.
#[must_use]
pub fn build_module_tree(modules: Vec<Module>) -> Vec<ModuleNode> {
    let forest = ModuleForest::build(modules);

    for link in forest.broken_links() {
        warn!(
            module_id = %link.module_id,
            parent_id = %link.parent_id,
            "module hierarchy cycle detected, promoting module to root"
        );
    }

    forest.into_roots()
}
