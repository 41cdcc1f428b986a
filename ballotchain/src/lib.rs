#[macro_use]
extern crate serde;

#[macro_use]
extern crate log;

mod audit;
mod ballot;
mod code;
mod config;
mod crypto;
mod election;
mod error;
mod ledger;
mod store;
mod transaction;
mod util;
mod verify;

pub use audit::*;
pub use ballot::*;
pub use code::*;
pub use config::*;
pub use crypto::*;
pub use election::*;
pub use error::*;
pub use ledger::*;
pub use store::*;
pub use transaction::*;
pub use util::*;
pub use verify::*;

#[cfg(test)]
mod tests;
