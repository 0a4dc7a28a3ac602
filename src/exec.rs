/*
 * Copyright 2026 Oxide Computer Company
 */

//! Running host commands.

use crate::common::*;
use std::io::{Seek, SeekFrom, Write};
use std::process::{Command, ExitStatus, Output, Stdio};
use std::sync::Arc;

pub const ZPOOL: &str = "/sbin/zpool";
pub const ZFS: &str = "/sbin/zfs";
pub const MOUNT: &str = "/sbin/mount";
pub const UMOUNT: &str = "/sbin/umount";
pub const FDISK: &str = "/usr/sbin/fdisk";
pub const FMTHARD: &str = "/usr/sbin/fmthard";
pub const PRTVTOC: &str = "/usr/sbin/prtvtoc";
pub const SWAP: &str = "/usr/sbin/swap";
pub const DUMPADM: &str = "/usr/sbin/dumpadm";
pub const MKFILE: &str = "/usr/sbin/mkfile";
pub const LOFIADM: &str = "/usr/sbin/lofiadm";
pub const NEWFS: &str = "/usr/sbin/newfs";
pub const IOSTAT: &str = "/usr/bin/iostat";

#[derive(Debug)]
pub struct CommandFailureInfo {
    pub command: String,
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl std::fmt::Display for CommandFailureInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "command [{}] failed with {}", self.command, self.status)?;
        if !self.stderr.is_empty() {
            write!(f, ": {}", self.stderr)?;
        } else if !self.stdout.is_empty() {
            write!(f, ": {}", self.stdout)?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ExecutionError {
    #[error("failed to start [{command}]: {err}")]
    ExecutionStart { command: String, err: std::io::Error },

    #[error("{0}")]
    CommandFailure(Box<CommandFailureInfo>),
}

impl ExecutionError {
    /**
     * The diagnostic text produced by a failed command, if it ran at all.
     */
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ExecutionError::CommandFailure(info) => Some(&info.stderr),
            ExecutionError::ExecutionStart { .. } => None,
        }
    }
}

/**
 * Render a command as it would be typed at a shell, program name included.
 */
pub fn command_to_string(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|s| s.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn output_to_exec_error(command: String, output: &Output) -> ExecutionError {
    ExecutionError::CommandFailure(Box::new(CommandFailureInfo {
        command,
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }))
}

/**
 * Something that can run a command to completion.  A command that runs but
 * exits unsuccessfully is reported as ExecutionError::CommandFailure.
 */
pub trait Executor: Send + Sync {
    fn execute(&self, cmd: &mut Command) -> Result<Output, ExecutionError>;
}

pub type BoxedExecutor = Arc<dyn Executor>;

pub struct HostExecutor {
    log: Logger,
}

impl HostExecutor {
    pub fn new(log: &Logger) -> Arc<HostExecutor> {
        Arc::new(HostExecutor { log: component(log, "exec") })
    }

    pub fn as_executor(self: Arc<Self>) -> BoxedExecutor {
        self
    }
}

impl Executor for HostExecutor {
    fn execute(&self, cmd: &mut Command) -> Result<Output, ExecutionError> {
        let command = command_to_string(cmd);
        debug!(self.log, "exec: {}", command);

        let output = cmd.env_clear().output().map_err(|err| {
            ExecutionError::ExecutionStart { command: command.clone(), err }
        })?;

        if !output.status.success() {
            let e = output_to_exec_error(command, &output);
            warn!(self.log, "exec failed: {}", e);
            return Err(e);
        }

        trace!(self.log, "exec ok: {}", command;
            "stdout" => String::from_utf8_lossy(&output.stdout).to_string());
        Ok(output)
    }
}

/**
 * Arrange for a command to read the given text on its standard input.  The
 * text is staged in an unlinked temporary file so that the command may be
 * run through any Executor.
 */
pub fn stdin_from(cmd: &mut Command, text: &str) -> Result<()> {
    let mut f = tempfile::tempfile()?;
    f.write_all(text.as_bytes())?;
    f.flush()?;
    f.seek(SeekFrom::Start(0))?;
    cmd.stdin(Stdio::from(f));
    Ok(())
}

/**
 * Stdout of a successful command, as text.
 */
pub fn stdout_string(output: &Output) -> Result<String> {
    Ok(String::from_utf8(output.stdout.clone())?)
}
