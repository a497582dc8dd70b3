//! `afrdctl restart`, `afrdctl stop` and `afrdctl reload`.

use anyhow::{Context, Result};

use afrdctl_daemon::{ControlPaths, ProcessController};

pub fn restart(paths: &ControlPaths) -> Result<()> {
    let controller = ProcessController::new(paths.clone());
    controller
        .restart()
        .context("failed to restart daemon")?;
    println!("restart requested: {}", controller.restart_command());
    Ok(())
}

pub fn stop(paths: &ControlPaths) -> Result<()> {
    let controller = ProcessController::new(paths.clone());
    if !controller.is_running() {
        println!("daemon is not running");
        return Ok(());
    }
    controller.stop().context("failed to stop daemon")?;
    println!("daemon stop requested");
    Ok(())
}

pub fn reload(paths: &ControlPaths) -> Result<()> {
    ProcessController::new(paths.clone()).reload();
    println!("reload requested: {}", paths.config.display());
    Ok(())
}
