//! Status server HTTP handlers.

mod lookup;
mod status;

pub use lookup::{asn_handler, city_handler, lookup_handler};
pub use status::status_handler;
