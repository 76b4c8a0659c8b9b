pub(crate) use anyhow::{Context as _, Error, Result, bail};
pub(crate) use tracing::{debug, info, trace, warn};
