/*
 * Copyright 2026 Oxide Computer Company
 */

use crate::exec::{
    command_to_string, output_to_exec_error, BoxedExecutor, ExecutionError,
    Executor,
};
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus, Output};
use std::sync::{Arc, Mutex};

enum Reply {
    Stdout(String),
    Stderr(String),
}

/**
 * An executor which records each command line and answers with canned output.
 * The first rule whose prefix matches the command line is used; commands with
 * no matching rule succeed with no output.
 */
#[derive(Default)]
pub struct FakeExecutor {
    rules: Mutex<Vec<(String, Reply)>>,
    calls: Mutex<Vec<String>>,
}

impl FakeExecutor {
    pub fn new() -> Arc<FakeExecutor> {
        Arc::new(FakeExecutor::default())
    }

    pub fn as_executor(self: Arc<Self>) -> BoxedExecutor {
        self
    }

    pub fn reply(&self, prefix: &str, stdout: &str) {
        self.rules.lock().unwrap()
            .push((prefix.to_string(), Reply::Stdout(stdout.to_string())));
    }

    pub fn fail(&self, prefix: &str, stderr: &str) {
        self.rules.lock().unwrap()
            .push((prefix.to_string(), Reply::Stderr(stderr.to_string())));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Executor for FakeExecutor {
    fn execute(&self, cmd: &mut Command) -> Result<Output, ExecutionError> {
        let line = command_to_string(cmd);
        self.calls.lock().unwrap().push(line.clone());

        let rules = self.rules.lock().unwrap();
        let output = match rules.iter().find(|(p, _)| line.starts_with(p.as_str())) {
            Some((_, Reply::Stderr(e))) => Output {
                status: ExitStatus::from_raw(1 << 8),
                stdout: Vec::new(),
                stderr: e.as_bytes().to_vec(),
            },
            Some((_, Reply::Stdout(o))) => Output {
                status: ExitStatus::from_raw(0),
                stdout: o.as_bytes().to_vec(),
                stderr: Vec::new(),
            },
            None => Output {
                status: ExitStatus::from_raw(0),
                stdout: Vec::new(),
                stderr: Vec::new(),
            },
        };

        if !output.status.success() {
            return Err(output_to_exec_error(line, &output));
        }
        Ok(output)
    }
}
