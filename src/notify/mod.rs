// Public API
pub use dispatcher::{NotificationDispatcher, PushMessage};
pub use push::{LoggingPushNotifier, NotifyError, PushNotifier};
pub use recorder::{Actor, EventRecorder, TracingEventRecorder};

// Internal modules
mod dispatcher;
mod push;
mod recorder;
