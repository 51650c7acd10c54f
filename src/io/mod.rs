//! External collaborators: content sniffing, the process registry and the item store.

mod registry;
mod sniff;
mod store;

pub use registry::{find_credentials, CommandRegistry, ProcessRegistry, TenantCredentials};
pub use sniff::is_png;
pub use store::{create_item_store, decode_item_id, ItemStore, PostgresItemStore};
