use anyhow::{bail, Context};
use std::sync::Arc;

use crate::module::{InitCtx, Migration, Module};

/// Core module initialization order. Core modules not listed here are skipped
/// by the lifecycle methods.
const CORE_MODULE_ORDER: &[&str] = &[
    "db",   // Database pool must come up first
    "auth", // Token issuer and verifier
];

/// Module registry for managing module lifecycle with core/custom separation
pub struct ModuleRegistry {
    core_modules: Vec<Arc<dyn Module>>,
    custom_modules: Vec<Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create a new module registry
    pub fn new() -> Self {
        Self {
            core_modules: Vec::new(),
            custom_modules: Vec::new(),
        }
    }

    /// Register a core module with the registry
    pub fn register_core(&mut self, module: Arc<dyn Module>) -> anyhow::Result<()> {
        self.ensure_unique(module.name())?;
        self.core_modules.push(module);
        Ok(())
    }

    /// Register a custom module with the registry
    pub fn register_custom(&mut self, module: Arc<dyn Module>) -> anyhow::Result<()> {
        self.ensure_unique(module.name())?;
        self.custom_modules.push(module);
        Ok(())
    }

    fn ensure_unique(&self, name: &str) -> anyhow::Result<()> {
        if self.get_module(name).is_some() {
            bail!("module '{}' is already registered", name);
        }
        Ok(())
    }

    /// Get all registered modules (core + custom)
    pub fn modules(&self) -> Vec<&Arc<dyn Module>> {
        self.core_modules
            .iter()
            .chain(self.custom_modules.iter())
            .collect()
    }

    /// Get a module by name (searches both core and custom modules)
    pub fn get_module(&self, name: &str) -> Option<&Arc<dyn Module>> {
        self.core_modules
            .iter()
            .chain(self.custom_modules.iter())
            .find(|module| module.name() == name)
    }

    /// Get the number of core modules
    pub fn core_module_count(&self) -> usize {
        self.core_modules.len()
    }

    /// Get the number of custom modules
    pub fn custom_module_count(&self) -> usize {
        self.custom_modules.len()
    }

    fn ordered_core_modules(&self) -> impl DoubleEndedIterator<Item = &Arc<dyn Module>> {
        CORE_MODULE_ORDER.iter().filter_map(move |&name| {
            self.core_modules.iter().find(|m| m.name() == name)
        })
    }

    /// Initialize core modules in order, then custom modules
    pub async fn init_all(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!("initializing core modules in order: {:?}", CORE_MODULE_ORDER);
        for module in self.ordered_core_modules() {
            tracing::info!(module = module.name(), "initializing core module");
            module.init(ctx).await.with_context(|| {
                format!("failed to initialize core module '{}'", module.name())
            })?;
        }

        tracing::info!("initializing {} custom modules", self.custom_modules.len());
        for module in &self.custom_modules {
            tracing::info!(module = module.name(), "initializing custom module");
            module.init(ctx).await.with_context(|| {
                format!("failed to initialize custom module '{}'", module.name())
            })?;
        }

        Ok(())
    }

    /// Start core modules in order, then custom modules
    pub async fn start_all(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        for module in self.ordered_core_modules() {
            tracing::info!(module = module.name(), "starting core module");
            module
                .start(ctx)
                .await
                .with_context(|| format!("failed to start core module '{}'", module.name()))?;
        }

        for module in &self.custom_modules {
            tracing::info!(module = module.name(), "starting custom module");
            module
                .start(ctx)
                .await
                .with_context(|| format!("failed to start custom module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Stop custom modules in reverse registration order, then core modules in
    /// reverse initialization order
    pub async fn stop_all(&self) -> anyhow::Result<()> {
        for module in self.custom_modules.iter().rev() {
            tracing::info!(module = module.name(), "stopping custom module");
            module
                .stop()
                .await
                .with_context(|| format!("failed to stop custom module '{}'", module.name()))?;
        }

        for module in self.ordered_core_modules().rev() {
            tracing::info!(module = module.name(), "stopping core module");
            module
                .stop()
                .await
                .with_context(|| format!("failed to stop core module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Collect all migrations from all modules (core + custom)
    ///
    /// Ordering is deterministic: by module name, then by migration id.
    pub fn collect_migrations(&self) -> Vec<(String, Migration)> {
        let mut migrations: Vec<(String, Migration)> = self
            .modules()
            .into_iter()
            .flat_map(|module| {
                module
                    .migrations()
                    .into_iter()
                    .map(move |migration| (module.name().to_string(), migration))
            })
            .collect();

        migrations.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(b.1.id)));
        migrations
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use std::sync::Mutex;

    struct TestModule {
        name: &'static str,
        journal: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl Module for TestModule {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
            self.journal.lock().unwrap().push(format!("init {}", self.name));
            Ok(())
        }

        async fn stop(&self) -> anyhow::Result<()> {
            self.journal.lock().unwrap().push(format!("stop {}", self.name));
            Ok(())
        }

        fn migrations(&self) -> Vec<Migration> {
            vec![
                Migration {
                    id: "002_second",
                    up: "SELECT 2;",
                },
                Migration {
                    id: "001_init",
                    up: "SELECT 1;",
                },
            ]
        }
    }

    fn module(name: &'static str, journal: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Module> {
        Arc::new(TestModule {
            name,
            journal: journal.clone(),
        })
    }

    #[test]
    fn test_module_registry_creation() {
        let registry = ModuleRegistry::new();
        assert!(registry.modules().is_empty());
        assert!(registry.collect_migrations().is_empty());
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.register_core(module("db", &journal)).unwrap();
        assert!(registry.register_custom(module("db", &journal)).is_err());
        assert_eq!(registry.modules().len(), 1);
    }

    #[test]
    fn test_migration_collection_is_sorted() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.register_custom(module("books", &journal)).unwrap();
        registry.register_core(module("auth", &journal)).unwrap();

        let ids: Vec<(String, &str)> = registry
            .collect_migrations()
            .into_iter()
            .map(|(name, m)| (name, m.id))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("auth".to_string(), "001_init"),
                ("auth".to_string(), "002_second"),
                ("books".to_string(), "001_init"),
                ("books".to_string(), "002_second"),
            ]
        );
    }

    #[tokio::test]
    async fn test_module_lifecycle_ordering() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.register_core(module("auth", &journal)).unwrap();
        registry.register_core(module("db", &journal)).unwrap();
        registry.register_custom(module("books", &journal)).unwrap();

        let settings = Settings::default();
        let ctx = InitCtx {
            settings: &settings,
        };
        registry.init_all(&ctx).await.unwrap();
        registry.start_all(&ctx).await.unwrap();
        registry.stop_all().await.unwrap();

        let journal = journal.lock().unwrap().clone();
        assert_eq!(
            journal,
            vec![
                "init db",
                "init auth",
                "init books",
                "stop books",
                "stop auth",
                "stop db",
            ]
        );
    }
}
