pub mod address_source;
pub mod base;
pub mod scanner;

pub use address_source::read_addresses;
pub use base::*;
pub use scanner::{attribute_outputs, build_rows, AddressOutcome, BatchBalanceScanner, ScanTarget};
