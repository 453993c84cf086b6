//! Durable dashboard state: session, cached devices and the lock overlay,
//! each stored as its own JSON file.

pub mod device;
pub mod records;
pub mod session;

pub use device::{Device, DeviceState};
pub use records::JsonRecord;
pub use session::{LockStates, Session, SessionStore};
