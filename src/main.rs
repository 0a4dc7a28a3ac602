/*
 * Copyright 2026 Oxide Computer Company
 */

use std::ops::ControlFlow;
use std::process::exit;
use std::sync::Arc;

use install_target::common::*;
use install_target::config::{Config, CONFIG_PATH};
use install_target::exec::HostExecutor;
use install_target::progress::{ProgressEvent, ProgressFn};
use install_target::request::Request;
use install_target::storage::host::HostStorage;
use install_target::td::{Discovery, TargetKind};
use install_target::ti::{TiContext, TiErrorCode};
use install_target::zfs::host::HostZfs;
use install_target::{dryrun, logging};

fn usage(opts: &getopts::Options) {
    let s = opts.usage("usage: targetadm [-c CONFIG] discover KIND\n       \
        targetadm [-c CONFIG] plan REQUEST\n       \
        targetadm [-c CONFIG] [-n] create REQUEST");
    eprintln!("{}", s);
}

struct Host {
    storage: Arc<HostStorage>,
    zfs: Arc<HostZfs>,
    exec: Arc<HostExecutor>,
}

impl Host {
    fn new(log: &Logger) -> Host {
        let exec = HostExecutor::new(log);
        Host {
            storage: Arc::new(HostStorage::new(log, exec.clone())),
            zfs: Arc::new(HostZfs::new(log, exec.clone())),
            exec,
        }
    }

    fn context(&self, log: &Logger) -> TiContext {
        TiContext::new(log, self.exec.clone(), self.storage.clone(),
            self.zfs.clone())
    }
}

/**
 * Print every target of one kind as a line of JSON.
 */
fn cmd_discover(log: &Logger, args: &[String]) -> Result<i32> {
    let [kind] = args else {
        bail!("discover needs exactly one target kind");
    };
    let kind: TargetKind = kind.parse()?;

    let host = Host::new(log);
    let mut td = Discovery::new(log, host.storage.clone(), host.zfs.clone());

    let n = td.discover(kind)?;
    info!(log, "discovered {} {} target(s)", n, kind);
    for t in td.targets(kind)? {
        println!("{}", serde_json::to_string(t)?);
    }
    td.release();

    Ok(0)
}

fn cmd_plan(log: &Logger, args: &[String]) -> Result<i32> {
    let [path] = args else {
        bail!("plan needs exactly one request file");
    };
    let attrs = Request::load(path)?.to_attrs()?;

    let host = Host::new(log);
    match host.context(log).plan(&attrs) {
        Ok(steps) => {
            for (i, s) in steps.iter().enumerate() {
                println!("{}/{} {}", i + 1, steps.len(), s);
            }
            Ok(0)
        }
        Err(e) => {
            error!(log, "invalid request {}: {}", path, e);
            Ok(e.code() as i32)
        }
    }
}

/**
 * Carry out a request, printing each progress event as a line of JSON.  The
 * exit status is the numeric error code of the outcome.
 */
fn cmd_create(log: &Logger, args: &[String]) -> Result<i32> {
    let [path] = args else {
        bail!("create needs exactly one request file");
    };
    let req = Request::load(path)?;
    let attrs = req.to_attrs()?;

    let host = Host::new(log);
    let ctx = host.context(log);
    info!(log, "creating {} target from {}{}", req.target_type(), path,
        if ctx.dry_run() { " (dry run)" } else { "" });

    let cb: ProgressFn<'_> = Box::new(|ev: &ProgressEvent| {
        match ev.to_attrs().and_then(|a| Ok(serde_json::to_string(&a)?)) {
            Ok(s) => println!("{}", s),
            Err(e) => warn!(log, "could not render progress: {:?}", e),
        }
        ControlFlow::Continue(())
    });

    match ctx.create_target(&attrs, Some(cb)) {
        Ok(()) => {
            info!(log, "ok, {} target created", req.target_type());
            Ok(TiErrorCode::Success as i32)
        }
        Err(e) => {
            error!(log, "{} target failed: {}", req.target_type(), e);
            Ok(e.code() as i32)
        }
    }
}

fn run(log: &Logger) -> Result<i32> {
    let mut opts = getopts::Options::new();
    opts.parsing_style(getopts::ParsingStyle::StopAtFirstFree);
    opts.optopt("c", "config", "configuration file", "CONFIG");
    opts.optflag("n", "dry-run", "log commands instead of running them");
    opts.optflag("h", "help", "print this message");

    let mat = match opts.parse(std::env::args().skip(1)) {
        Ok(mat) => mat,
        Err(e) => {
            usage(&opts);
            bail!("invalid options: {}", e);
        }
    };
    if mat.opt_present("h") {
        usage(&opts);
        return Ok(0);
    }

    let path = mat.opt_str("c").unwrap_or_else(|| CONFIG_PATH.to_string());
    let config = Config::load(&path)
        .with_context(|| format!("loading configuration {}", path))?;
    logging::set_level(config.log_level()?);
    dryrun::set_dry_run(config.ti.dry_run || mat.opt_present("n"));

    let Some((cmd, args)) = mat.free.split_first() else {
        usage(&opts);
        bail!("missing command name");
    };

    match cmd.as_str() {
        "discover" => cmd_discover(log, args),
        "plan" => cmd_plan(log, args),
        "create" => cmd_create(log, args),
        n => {
            usage(&opts);
            bail!("invalid command: {}", n);
        }
    }
}

fn main() {
    let log = init_log();

    match run(&log) {
        Ok(code) => exit(code),
        Err(e) => {
            error!(log, "fatal error: {:?}", e);
            exit(1);
        }
    }
}
