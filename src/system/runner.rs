//! 外部命令执行
//!
//! 所有对包管理器、服务管理器、数据库、certbot 等外部程序的调用都经过
//! [`CommandRunner`]，测试中用脚本化的实现替换。

use gitea_deploy_common::CommandError;
use std::io::Write;
use std::process::{Command, Stdio};

/// 命令执行结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// 命令行的可读形式，用于日志与错误
pub fn describe(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// 外部命令执行器
pub trait CommandRunner: Send + Sync {
    /// 执行命令，非零退出码不视为错误
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError>;

    /// 执行命令并把 `input` 写入标准输入
    fn run_with_input(
        &self,
        program: &str,
        args: &[&str],
        input: &str,
    ) -> Result<CommandOutput, CommandError>;

    /// 执行命令，非零退出码转为 [`CommandError::Failed`]，保留原始 stderr
    fn run_checked(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
        let output = self.run(program, args)?;
        if output.success() {
            Ok(output)
        } else {
            Err(failed(program, args, &output))
        }
    }

    /// 命令是否在 PATH 中
    fn command_exists(&self, command: &str) -> bool {
        self.run("which", &[command])
            .map(|output| output.success())
            .unwrap_or(false)
    }
}

/// 由失败的输出构造错误；stderr 为空时使用 stdout
pub fn failed(program: &str, args: &[&str], output: &CommandOutput) -> CommandError {
    let stderr = if output.stderr.trim().is_empty() {
        output.stdout.trim().to_string()
    } else {
        output.stderr.trim().to_string()
    };
    CommandError::Failed {
        command: describe(program, args),
        status: output.status,
        stderr,
    }
}

/// 真实系统上的执行器
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    fn spawn_error(program: &str, args: &[&str], err: std::io::Error) -> CommandError {
        CommandError::Spawn {
            command: describe(program, args),
            message: err.to_string(),
        }
    }

    fn collect(output: std::process::Output) -> CommandOutput {
        CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
        tracing::debug!(command = %describe(program, args), "running");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| Self::spawn_error(program, args, e))?;
        Ok(Self::collect(output))
    }

    fn run_with_input(
        &self,
        program: &str,
        args: &[&str],
        input: &str,
    ) -> Result<CommandOutput, CommandError> {
        tracing::debug!(command = %describe(program, args), "running with stdin");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::spawn_error(program, args, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .map_err(|e| Self::spawn_error(program, args, e))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Self::spawn_error(program, args, e))?;
        Ok(Self::collect(output))
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::Mutex;

    type Handler = Box<dyn Fn(&str, Option<&str>) -> CommandOutput + Send + Sync>;

    /// 脚本化执行器：记录所有调用，按命令行返回预设输出
    pub(crate) struct FakeRunner {
        handler: Handler,
        calls: Mutex<Vec<String>>,
        inputs: Mutex<Vec<String>>,
    }

    impl FakeRunner {
        pub(crate) fn new(
            handler: impl Fn(&str, Option<&str>) -> CommandOutput + Send + Sync + 'static,
        ) -> Self {
            Self {
                handler: Box::new(handler),
                calls: Mutex::new(Vec::new()),
                inputs: Mutex::new(Vec::new()),
            }
        }

        /// 所有命令都成功且无输出
        pub(crate) fn succeeding() -> Self {
            Self::new(|_, _| CommandOutput::default())
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn inputs(&self) -> Vec<String> {
            self.inputs.lock().unwrap().clone()
        }

        pub(crate) fn ok(stdout: &str) -> CommandOutput {
            CommandOutput {
                status: 0,
                stdout: stdout.to_string(),
                stderr: String::new(),
            }
        }

        pub(crate) fn fail(stderr: &str) -> CommandOutput {
            CommandOutput {
                status: 1,
                stdout: String::new(),
                stderr: stderr.to_string(),
            }
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
            let line = describe(program, args);
            self.calls.lock().unwrap().push(line.clone());
            Ok((self.handler)(&line, None))
        }

        fn run_with_input(
            &self,
            program: &str,
            args: &[&str],
            input: &str,
        ) -> Result<CommandOutput, CommandError> {
            let line = describe(program, args);
            self.calls.lock().unwrap().push(line.clone());
            self.inputs.lock().unwrap().push(input.to_string());
            Ok((self.handler)(&line, Some(input)))
        }
    }
}
