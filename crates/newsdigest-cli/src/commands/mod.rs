pub mod auth;
pub mod preview;
pub mod run;

use anyhow::{bail, Result};

/// Non-zero exit when any digest job failed
pub fn ensure_no_failures(failed: usize, total: usize) -> Result<()> {
    if failed > 0 {
        bail!("{} of {} digest job(s) failed", failed, total);
    }
    Ok(())
}
