//! Locomotion: steering/backend-driven движение + stuck recovery
//!
//! - steering: Movement (move_to / stop / look_at → forces)
//! - navigator: NavigationWrapper (stuck detection, predictive/jump checks)

pub mod navigator;
pub mod steering;

pub use navigator::{NavigationWrapper, StuckConfig};
pub use steering::{Movement, MovementConfig, Registration};
