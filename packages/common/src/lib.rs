//! # Blockspace Common
//!
//! Data model, realtime wire protocol and the role/permission table shared by
//! the editor core and the reference workspace backend.

pub mod error;
pub mod model;
pub mod permissions;
pub mod protocol;
pub mod result;

pub use error::*;
pub use model::*;
pub use permissions::*;
pub use protocol::*;
pub use result::*;
