pub mod books;

use bookstore_db::Database;
use bookstore_kernel::ModuleRegistry;

/// Register every module of the service with the registry
pub fn register_all(registry: &mut ModuleRegistry, db: &Database) -> anyhow::Result<()> {
    let repository = books::repository::BookRepository::new(db.pool().clone());
    registry.register(books::create_module(repository))?;
    Ok(())
}
