pub mod mime;
pub mod timestamp;
pub mod validation;
