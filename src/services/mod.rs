pub mod adaptive;
pub mod classifier;
pub mod gamification;
pub mod generation;
pub mod progress;
pub mod questions;
pub mod srs;
