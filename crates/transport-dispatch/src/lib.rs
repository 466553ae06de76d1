//! Session-aware dynamic dispatch over the remote automation-protocol
//! action table.
//!
//! The command runtime never talks to the remote endpoint directly. It goes
//! through [`TransportActions`], a thin view over an enumerable
//! [`ActionTable`]: one flat table of browser-level actions plus a nested
//! session-scoped sub-table whose entries are stamped with the active
//! session identifier at call time. The concrete wire transport stays behind
//! the [`Transport`] trait and is supplied by the embedding runner.

pub mod dispatcher;
pub mod errors;
pub mod table;
pub mod transport;

pub use dispatcher::{identity_callback, ActionArg, ActionCallback, SessionView, TransportActions};
pub use errors::{DispatchError, TransportError};
pub use table::{protocol_action, ActionFn, ActionTable, ActionTableBuilder};
pub use transport::{ActionRequest, DriverInfo, NoopTransport, StaticTransport, Transport};
