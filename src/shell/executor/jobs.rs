use std::fmt;

use log::{debug, warn};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

#[derive(Debug, Clone)]
pub struct Job {
    pub pid: i32,
    pub index: usize,
    pub command: String,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.index, self.pid, self.command)
    }
}

/// 后台任务跟踪。注册的子进程在每次提示符之间非阻塞回收，
/// shell 退出前阻塞等完
#[derive(Default)]
pub struct Jobs {
    jobs: Vec<Job>,
}

impl Jobs {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    // 取最小可用编号，和任务列表习惯保持一致
    fn find_available_index(&self) -> usize {
        let mut index = 1;
        while self.jobs.iter().any(|job| job.index == index) {
            index += 1;
        }
        index
    }

    pub fn register(&mut self, pid: i32, command: String) -> usize {
        let index = self.find_available_index();
        debug!("注册后台任务: [{}] {} {}", index, pid, command);
        self.jobs.push(Job {
            pid,
            index,
            command,
        });
        index
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// 取出最近注册的任务（编号最大的那个）
    pub fn take_last(&mut self) -> Option<Job> {
        let pos = self
            .jobs
            .iter()
            .enumerate()
            .max_by_key(|(_, job)| job.index)
            .map(|(pos, _)| pos)?;
        Some(self.jobs.remove(pos))
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// 非阻塞轮询所有后台子进程，已结束的打一行通知并移除。
    /// 在每次读取输入前调用
    pub fn reap_finished(&mut self) {
        self.jobs.retain(|job| {
            match waitpid(Pid::from_raw(job.pid), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => true,
                Ok(WaitStatus::Exited(_, _)) | Ok(WaitStatus::Signaled(_, _, _)) => {
                    println!("[{}]+ Done\t{}", job.index, job.command);
                    false
                }
                Ok(_) => true,
                Err(e) => {
                    // ECHILD 等：进程已经不归我们管了
                    warn!("后台任务 {} 回收失败: {}", job.pid, e);
                    false
                }
            }
        });
    }

    /// 阻塞等待所有后台子进程，shell 关闭时调用
    pub fn wait_all(&mut self) {
        for job in self.jobs.drain(..) {
            debug!("等待后台任务结束: {}", job);
            let _ = waitpid(Pid::from_raw(job.pid), None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_allocation() {
        let mut jobs = Jobs::new();
        assert_eq!(jobs.register(100, "a".to_string()), 1);
        assert_eq!(jobs.register(200, "b".to_string()), 2);
        // 注意：100/200 不是我们的子进程，waitpid 会报错并移除
        jobs.reap_finished();
        assert!(jobs.is_empty());
        assert_eq!(jobs.register(300, "c".to_string()), 1);
    }
}
