use crate::utils::config::Config;
use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::{self, File};
use std::io::Write;
use std::process;

pub fn init_logger(config: &Config) {
    let level = match &config.logger_level {
        level if level.eq_ignore_ascii_case("error") => LevelFilter::Error,
        level if level.eq_ignore_ascii_case("warn") => LevelFilter::Warn,
        level if level.eq_ignore_ascii_case("info") => LevelFilter::Info,
        level if level.eq_ignore_ascii_case("debug") => LevelFilter::Debug,
        level if level.eq_ignore_ascii_case("trace") => LevelFilter::Trace,
        _ => LevelFilter::Warn,
    };

    if let Err(e) = fs::create_dir_all(&config.logger_dir) {
        eprintln!("nexsh: cannot create log directory: {}", e);
        return;
    }
    let date = Local::now().format("%Y-%m-%d");
    let log_file = config.logger_dir.join(format!("nexsh_{}.log", date));
    let file = match File::create(&log_file) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("nexsh: cannot create log file: {}", e);
            return;
        }
    };

    // 日志只写文件，交互输出不经过 logger
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[PID:{}][{}] {} - {}",
                process::id(),
                record.level(),
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(file)))
        .filter(Some(config.name.as_str()), level)
        .filter(None, LevelFilter::Warn)
        .init();

    log::debug!("日志级别设置为: {}", level);
}
