use tessera_domain::{Module, ModuleNode};

use crate::build_module_tree;

use super::*;

impl PermissionResolver {
    /// Builds the navigation forest of all active modules.
    ///
    /// A missing modules table yields an empty forest.
    pub async fn module_hierarchy(&self) -> AppResult<Vec<ModuleNode>> {
        let modules = match self.data_store.fetch_all_modules().await {
            Ok(modules) => modules,
            Err(AppError::DataSourceUnavailable(detail)) => {
                warn!(detail = %detail, "modules source unavailable, returning empty hierarchy");
                Vec::new()
            }
            Err(error) => return Err(error),
        };

        let active: Vec<Module> = modules.into_iter().filter(Module::is_active).collect();
        Ok(build_module_tree(active))
    }
}
