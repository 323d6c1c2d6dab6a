//! Concrete pipeline topologies built on the graph model.

mod crm_accounts;

pub use crm_accounts::{crm_accounts, units};
