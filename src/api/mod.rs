pub mod echo;

pub use echo::{echo, health_check, secured_echo};
