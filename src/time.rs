use std::time::{SystemTime, UNIX_EPOCH};

pub fn create_timestamp() -> u64 {
    let start = SystemTime::now();
    let since_the_epoch = start.duration_since(UNIX_EPOCH)
        .expect("Time went backwards");
    return since_the_epoch.as_millis() as u64;
}

/// Server epoch as float seconds, the form carried by `set_time` frames.
pub fn create_epoch_seconds() -> f64 {
    create_timestamp() as f64 / 1000.0
}
