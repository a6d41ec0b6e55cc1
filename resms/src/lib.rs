//! Reading resources from Windows executables (PE and the older NE format) and turning icon and
//! cursor groups back into `.ico` and `.cur` files.


pub mod container;
mod error;
pub mod icon_group;
pub mod mz;
pub mod ne;
pub mod pe;
mod read_ext;
pub mod reassemble;
pub mod resource;


pub use crate::container::{materialize, materialize_with};
pub use crate::error::Error;
pub use crate::reassemble::{extract_cursors, extract_icons};
pub use crate::resource::{ResourceEntry, ResourceType};
