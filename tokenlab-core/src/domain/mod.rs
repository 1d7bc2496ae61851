//! Domain identifiers shared by every data component.

pub mod ids;

pub use ids::{Cursor, EntityId};
