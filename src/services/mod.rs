//! Use-case orchestrators: one module per operation in the system overview,
//! each a free async function taking a `&mut dyn UnitOfWork` and whatever
//! the operation needs, returning a domain value or a use-case-scoped error
//! enum that wraps the shared taxonomy in `domain::error`.

pub mod fx_events;
pub mod fx_ttl;
pub mod get_balance;
pub mod get_ledger;
pub mod parity_report;
pub mod post_transaction;
pub mod trading_balance;
