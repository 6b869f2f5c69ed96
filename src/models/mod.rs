//! Core data models for the toplist pipeline.

mod checkpoint;
mod compact;
mod date_key;
mod guild;
mod player;
mod scope;
mod toplist;

pub use checkpoint::*;
pub use compact::*;
pub use date_key::*;
pub use guild::*;
pub use player::*;
pub use scope::*;
pub use toplist::*;
