//! SQLite persistence for biometric captures.

mod model;
mod repository;

pub use model::{BiometricCaptureDB, NewBiometricCaptureDB};
pub use repository::BiometricCaptureRepository;
