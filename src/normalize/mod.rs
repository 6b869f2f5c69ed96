//! Pure normalization of raw snapshot data.
//!
//! Everything here is side-effect free so the stages can be tested without a
//! document store.

mod classes;
mod fields;
mod numeric;
mod server;

pub use classes::*;
pub use fields::*;
pub use numeric::*;
pub use server::*;
