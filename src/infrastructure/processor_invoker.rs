//! 外部处理器调用 - 基础设施层
//!
//! 只负责"在限定时间内运行一次处理器并收集输出"，不解析输出内容。

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::ProcessMode;

/// 处理器调用失败
#[derive(Debug, Error)]
pub enum InvokeError {
    /// 找不到可执行文件，不会自动重试
    #[error("processor executable not found: {program}")]
    ExecutableMissing { program: String },
    /// 超时，进程组已被终止，部分输出被丢弃
    #[error("processor timed out after {}s", .after.as_secs())]
    Timeout { after: Duration },
    /// 进程无法启动（权限等）
    #[error("processor could not be started: {source}")]
    LaunchFailed {
        #[source]
        source: std::io::Error,
    },
    /// 等待进程输出时出错
    #[error("failed to collect processor output: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
}

/// 一次调用的结果，产生后不再修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// 退出码，被信号终止时为 None
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ProcessOutcome {
    /// 非零退出即视为 Failed，但输出仍交给解析器
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// 外部处理器调用器
#[derive(Debug, Clone)]
pub struct ProcessorInvoker {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl ProcessorInvoker {
    /// 创建调用器
    ///
    /// # 参数
    /// - `program`: 可执行文件
    /// - `args`: 放在输入文件路径之前的固定参数
    /// - `timeout`: 单次调用的墙钟超时
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let invoker = Self::new(
            config.processor_program.clone(),
            config.processor_args.clone(),
            config.processor_timeout(),
        );
        match &config.processor_working_dir {
            Some(dir) => invoker.with_working_dir(dir),
            None => invoker,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 运行一次处理器
    ///
    /// 命令行为 `program [args...] <input> [--async]`，非交互运行（stdin 为空）。
    ///
    /// # 返回
    /// - `Ok(ProcessOutcome)`：进程已退出（退出码可能非零）
    /// - `Err(InvokeError)`：找不到程序、启动失败或超时
    pub async fn invoke(&self, input: &Path, mode: ProcessMode) -> Result<ProcessOutcome, InvokeError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(flag) = mode.flag() {
            command.arg(flag);
        }
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        // 独立进程组，超时时连同子进程一起终止
        #[cfg(unix)]
        command.process_group(0);

        debug!("启动处理器: {} {:?} {}", self.program, self.args, input.display());
        let started = Instant::now();

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("❌ 找不到处理器: {}", self.program);
                return Err(InvokeError::ExecutableMissing {
                    program: self.program.clone(),
                });
            }
            Err(source) => {
                warn!("❌ 处理器启动失败: {}", source);
                return Err(InvokeError::LaunchFailed { source });
            }
        };
        let pid = child.id();

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let outcome = ProcessOutcome {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    elapsed: started.elapsed(),
                };
                info!(
                    "🔍 处理器退出: code={:?}, 耗时 {:.1}s, stdout {} 字节",
                    outcome.exit_code,
                    outcome.elapsed.as_secs_f64(),
                    outcome.stdout.len()
                );
                Ok(outcome)
            }
            Ok(Err(source)) => Err(InvokeError::Io { source }),
            Err(_) => {
                warn!("⏱️ 处理器超时 ({}s)，终止进程组", self.timeout.as_secs());
                kill_process_group(pid);
                Err(InvokeError::Timeout {
                    after: self.timeout,
                })
            }
        }
    }

    /// 可执行文件是否可以找到（路径存在，或在 PATH 中）
    pub fn executable_available(&self) -> bool {
        let program = Path::new(&self.program);
        if program.components().count() > 1 {
            let resolved = match (&self.working_dir, program.is_relative()) {
                (Some(dir), true) => dir.join(program),
                _ => program.to_path_buf(),
            };
            return resolved.is_file();
        }
        std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
            .unwrap_or(false)
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid else {
        return;
    };
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: killpg 只发送信号，不涉及内存；进程组 id 来自我们自己创建的子进程
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!("killpg({}) 失败: {}", pgid, std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
