/*
 * Copyright 2026 Oxide Computer Company
 */

pub use slog::{debug, error, info, o, trace, warn, Logger};
pub use anyhow::{anyhow, bail, Context, Result};

pub use crate::logging::{component, init_log};
