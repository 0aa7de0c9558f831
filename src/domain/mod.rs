//! Domain primitives: value objects, quantization, and the core error
//! taxonomy shared by validation, repositories, and use-cases.

pub mod account;
pub mod currency;
pub mod entry_line;
pub mod error;
pub mod fx_event;
pub mod journal;
pub mod money;

pub use account::{Account, AccountFullName, AccountId};
pub use currency::{Currency, CurrencyCode};
pub use entry_line::{EntryLine, Side};
pub use error::{DomainError, LedgerError, NotFoundError, TransientDatabaseError, ValidationError, VersionMismatch};
pub use fx_event::{ArchivedExchangeRateEvent, ExchangeRateEvent};
pub use journal::{Meta, Transaction, TransactionLine};
