pub mod dispatch;
pub mod keygen;
pub mod pack;
pub mod verify;

pub use dispatch::dispatch;
