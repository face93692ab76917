pub mod accounts;
pub mod bindings;
pub mod data;
pub mod page;

pub use accounts::*;
pub use bindings::*;
pub use data::*;
pub use page::*;
