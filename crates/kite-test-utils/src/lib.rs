//! Test utilities for kite.
//!
//! - [`stub`]: in-process transports and order-recording interceptors
//! - [`server`]: a wiremock-backed HTTP server for end-to-end tests
//! - [`assert_ok!`] / [`assert_err!`]: result assertions that hand back the
//!   inner value

pub mod server;
pub mod stub;

use std::sync::Once;

use tracing_subscriber::EnvFilter;

pub use server::TestHttpServer;
pub use stub::{recording_interceptor, stub_response, OrderLog, StubTransport};

/// Install a test tracing subscriber once per process.
///
/// Honours `RUST_LOG`; defaults to `warn,kite=debug`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,kite=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a Result is Err and return the error.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(e) => e,
        }
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_assert_ok_returns_value() {
        let value = assert_ok!(Ok::<_, String>(7));
        assert_eq!(value, 7);
    }

    #[test]
    fn test_assert_err_returns_error() {
        let err = assert_err!(Err::<(), _>("boom"));
        assert_eq!(err, "boom");
    }

    #[test]
    #[should_panic(expected = "Expected Ok")]
    fn test_assert_ok_panics_on_err() {
        let _: () = assert_ok!(Err::<(), _>("boom"));
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        super::init_tracing();
        super::init_tracing();
    }
}
