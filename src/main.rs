mod shell;
mod utils;

use std::env;
use std::process;

use crate::shell::Shell;
use crate::utils::config::Config;
use crate::utils::log::init_logger;

fn main() {
    let config = Config::new();
    init_logger(&config);

    let mut shell = Shell::new(config);

    // 带参数时当作一条命令执行完就退出
    let args: Vec<String> = env::args().skip(1).collect();
    if !args.is_empty() {
        let status = shell.execute(&args.join(" "));
        process::exit(status);
    }

    if let Err(e) = shell.run() {
        eprintln!("nexsh: {}", e);
        process::exit(1);
    }
    process::exit(shell.exit_code());
}
