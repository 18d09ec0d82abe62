pub mod mocks;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use mocks::{RecordedEvent, RecordingEventRecorder, RecordingPushNotifier};
#[allow(unused_imports)]
pub use setup::{TestSetup, TestSetupBuilder, T0};
