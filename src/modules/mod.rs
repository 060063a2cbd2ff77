pub mod books;

use bookstore_kernel::ModuleRegistry;

use books::store::SharedStore;

/// Register all service modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, store: SharedStore) -> anyhow::Result<()> {
    registry.register(books::create_module(store))?;
    Ok(())
}
