#[cfg(test)]
#[ctor::ctor]
fn init_tests() {
    // logger for tests only, driven by RUST_LOG
    let _ = env_logger::builder().is_test(true).try_init();
}
