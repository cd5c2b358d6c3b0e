pub mod events;
pub mod members;
pub mod rotation;
pub mod status;
