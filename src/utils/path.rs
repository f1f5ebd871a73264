use std::env;
use std::fs::read_dir;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use log::error;

/// 在 PATH 中查找可执行文件，找不到返回 None
pub fn find_executable(filename: &str) -> Option<PathBuf> {
    let env_path = match env::var("PATH") {
        Ok(x) => x,
        Err(e) => {
            error!("nexsh: error with env PATH: {:?}", e);
            return None;
        }
    };
    for p in env_path.split(':') {
        match read_dir(p) {
            Ok(list) => {
                for entry in list.flatten() {
                    if let Ok(name) = entry.file_name().into_string() {
                        if name != filename {
                            continue;
                        }

                        let meta = match entry.metadata() {
                            Ok(x) => x,
                            Err(e) => {
                                error!("nexsh: metadata error: {:?}", e);
                                continue;
                            }
                        };
                        let mode = meta.permissions().mode();
                        if mode & 0o111 == 0 {
                            // 没有可执行位
                            continue;
                        }

                        return Some(entry.path());
                    }
                }
            }
            Err(e) => {
                if e.kind() == ErrorKind::NotFound {
                    continue;
                }
                error!("nexsh: fs read_dir error: {}: {}", p, e);
            }
        }
    }
    None
}

pub fn current_dir() -> String {
    let dir = match env::current_dir() {
        Ok(x) => x,
        Err(e) => {
            error!("nexsh: env current_dir error: {}", e);
            return String::from("/");
        }
    };
    dir.to_string_lossy().to_string()
}
