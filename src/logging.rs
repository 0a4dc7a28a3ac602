/*
 * Copyright 2026 Oxide Computer Company
 */

//! Log facade: terminal or pluggable sink, behind a process-wide threshold.

use atty::Stream;
use slog::{o, Drain, Level, Logger, OwnedKVList, Record, KV};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/*
 * Numeric form of slog::Level::Info.  The threshold lives for the whole
 * process; set_level() may be called at any time and applies to every logger
 * built by this module, including those created before the call.
 */
const DEFAULT_LEVEL: usize = 4;

static THRESHOLD: AtomicUsize = AtomicUsize::new(DEFAULT_LEVEL);

pub const COMPONENT: &str = "component";

pub fn set_level(level: Level) {
    THRESHOLD.store(level.as_usize(), Ordering::Relaxed);
}

pub fn level() -> Level {
    Level::from_usize(THRESHOLD.load(Ordering::Relaxed)).unwrap_or(Level::Info)
}

pub fn parse_level(s: &str) -> anyhow::Result<Level> {
    Ok(match s.trim().to_ascii_lowercase().as_str() {
        "critical" | "crit" => Level::Critical,
        "error" => Level::Error,
        "warning" | "warn" => Level::Warning,
        "info" => Level::Info,
        "debug" => Level::Debug,
        "trace" => Level::Trace,
        _ => anyhow::bail!("unknown log level \"{}\"", s),
    })
}

struct Threshold<D>(D);

impl<D: Drain> Drain for Threshold<D> {
    type Ok = Option<D::Ok>;
    type Err = D::Err;

    fn log(
        &self,
        record: &Record,
        values: &OwnedKVList,
    ) -> Result<Self::Ok, Self::Err> {
        if record.level().is_at_least(level()) {
            self.0.log(record, values).map(Some)
        } else {
            Ok(None)
        }
    }
}

/**
 * Initialise a logger which writes to stdout, and which does the right thing on
 * both an interactive terminal and when stdout is not a tty.
 */
pub fn init_log() -> Logger {
    let dec = slog_term::TermDecorator::new().stdout().build();
    if atty::is(Stream::Stdout) {
        let dr = Mutex::new(slog_term::CompactFormat::new(dec)
            .build()).fuse();
        Logger::root(Threshold(dr).fuse(), o!())
    } else {
        let dr = Mutex::new(slog_term::FullFormat::new(dec)
            .use_original_order()
            .build()).fuse();
        Logger::root(Threshold(dr).fuse(), o!())
    }
}

struct ComponentKey(Option<String>);

impl slog::Serializer for ComponentKey {
    fn emit_arguments(
        &mut self,
        key: slog::Key,
        val: &std::fmt::Arguments,
    ) -> slog::Result {
        if self.0.is_none() && key == COMPONENT {
            self.0 = Some(val.to_string());
        }
        Ok(())
    }
}

struct Sink<F>(F);

impl<F> Drain for Sink<F>
where
    F: Fn(&str, Level, &str),
{
    type Ok = ();
    type Err = slog::Never;

    fn log(
        &self,
        record: &Record,
        values: &OwnedKVList,
    ) -> Result<(), slog::Never> {
        /*
         * Record-level pairs override those attached to the logger, so look
         * there first.
         */
        let mut c = ComponentKey(None);
        record.kv().serialize(record, &mut c).ok();
        values.serialize(record, &mut c).ok();

        let msg = record.msg().to_string();
        (self.0)(c.0.as_deref().unwrap_or(""), record.level(), &msg);
        Ok(())
    }
}

/**
 * Build a logger that hands each record at or above the threshold to the
 * provided write function as (component, level, message).
 */
pub fn sink_log<F>(f: F) -> Logger
where
    F: Fn(&str, Level, &str) + Send + 'static,
{
    let dr = Mutex::new(Sink(f)).fuse();
    Logger::root(Threshold(dr).fuse(), o!())
}

/**
 * Derive a logger tagged with a component name.
 */
pub fn component(log: &Logger, name: &'static str) -> Logger {
    log.new(o!(COMPONENT => name))
}
