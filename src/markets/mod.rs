//! Market static data: currencies, indices and instruments.

pub mod currency;
pub mod index;
pub mod instrument;
pub mod listing;

pub use currency::Currency;
pub use index::{Index, IndexBus};
pub use instrument::{Fees, Instrument, InstrumentCode, expiry_code};
pub use listing::{Listing, default_listing};
