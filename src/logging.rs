//! Side-effecting diagnostics sink. Per spec.md §6, a Logger never
//! affects conversion correctness — adapters and transducers hold an
//! `Option<Arc<dyn Logger>>` and simply skip logging when `None`.

use std::sync::Arc;

pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
    fn debug(&self, message: &str);
    fn error(&self, message: &str);
}

/// Default sink: forwards to the `log` facade, matching the teacher's
/// use of `log::error!` for library-internal diagnostics.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCrateLogger;

impl Logger for LogCrateLogger {
    fn info(&self, message: &str) {
        log::info!("{message}");
    }

    fn debug(&self, message: &str) {
        log::debug!("{message}");
    }

    fn error(&self, message: &str) {
        log::error!("{message}");
    }
}

pub fn default_logger() -> Arc<dyn Logger> {
    Arc::new(LogCrateLogger)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting(std::sync::atomic::AtomicUsize);

    impl Logger for Counting {
        fn info(&self, _m: &str) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
        fn debug(&self, _m: &str) {}
        fn error(&self, _m: &str) {}
    }

    #[test]
    fn logger_is_object_safe_and_shareable() {
        let counter = Arc::new(Counting(std::sync::atomic::AtomicUsize::new(0)));
        let logger: Arc<dyn Logger> = counter.clone();
        logger.info("hello");
        assert_eq!(counter.0.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
