use std::sync::Once;

pub static INIT: Once = Once::new();

/// Setup function that is only run once, even if called multiple times. Log output is captured by
/// the test harness; set `RUST_LOG` to see it.
pub fn setup() {
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_default_env().is_test(true).try_init();
    });
}
