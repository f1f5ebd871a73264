use log::debug;

// 整条命令完全匹配即拒绝
const DANGEROUS_COMMANDS: &[&str] = &[
    "rm -rf /",
    "rm -rf /*",
    "dd if=/dev/zero",
    "mkfs",
    "fdisk",
    "shutdown -h now",
    ":(){ :|:& };:",
    "chmod -R 777 /",
    "sudo rm -rf",
    "kill -9 -1",
];

// 出现在命令任意位置即拒绝
const DANGEROUS_PATTERNS: &[&str] = &["rm -rf", "dd if=", "mkfs.", "chown -R"];

// rm 命令碰到这些目录直接拒绝
const CRITICAL_DIRS: &[&str] = &["/bin", "/sbin", "/usr", "/lib", "/etc", "/boot"];

/// AI 给出的命令在执行前过一遍黑名单。
/// 规则宁可误杀：模型输出不可信，拒绝了用户还能自己敲
pub struct CommandValidator;

impl CommandValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn is_safe(&self, command: &str) -> bool {
        self.danger_reason(command).is_none()
    }

    /// 返回拒绝原因，安全则 None
    pub fn danger_reason(&self, command: &str) -> Option<String> {
        let trimmed = command.trim();

        for dangerous in DANGEROUS_COMMANDS {
            if trimmed.contains(dangerous) {
                debug!("命令命中黑名单 '{}': {}", dangerous, trimmed);
                return Some(format!("contains destructive command '{}'", dangerous));
            }
        }

        for pattern in DANGEROUS_PATTERNS {
            if trimmed.contains(pattern) {
                debug!("命令命中危险模式 '{}': {}", pattern, trimmed);
                return Some(format!("contains dangerous pattern '{}'", pattern));
            }
        }

        if trimmed.contains("rm") {
            for dir in CRITICAL_DIRS {
                if trimmed.contains(dir) {
                    debug!("rm 指向关键目录 {}: {}", dir, trimmed);
                    return Some(format!("removes files under critical directory {}", dir));
                }
            }
        }

        None
    }

    /// 对常见危险命令给出替代建议
    pub fn safer_alternative(&self, command: &str) -> Option<&'static str> {
        let trimmed = command.trim();
        if trimmed.starts_with("rm -rf") {
            return Some("move files to a trash directory instead, or pass an explicit path and add -i");
        }
        if trimmed.starts_with("dd if=/dev/zero") {
            return Some("use 'shred FILE' to wipe a single file");
        }
        if trimmed.starts_with("shutdown") || trimmed.starts_with("reboot") {
            return Some("schedule it instead: 'shutdown -h +5' can still be cancelled with 'shutdown -c'");
        }
        if trimmed.starts_with("chmod -R 777") {
            return Some("grant only the permissions needed, e.g. 'chmod -R u+rwX'");
        }
        None
    }
}

impl Default for CommandValidator {
    fn default() -> Self {
        Self::new()
    }
}
