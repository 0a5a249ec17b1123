use chrono::Local;
use env_logger::Env;
use std::io::Write;

/// Timestamped log lines on stderr. Level comes from `RUST_LOG`, default `info`.
pub fn init() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {:<5} {}",
                Local::now().format("%H:%M:%S%.6f"),
                record.level(),
                record.args()
            )
        })
        .init();
}
