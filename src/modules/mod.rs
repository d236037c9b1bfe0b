pub mod books;

use bookstore_authz::RoleGuard;
use bookstore_kernel::ModuleRegistry;

use books::service::BookService;

/// Register all project-specific modules with the registry
pub fn register_all(
    registry: &mut ModuleRegistry,
    service: BookService,
    guard: RoleGuard,
) -> anyhow::Result<()> {
    registry.register_custom(books::create_module(service, guard))
}
