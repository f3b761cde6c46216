//! Lifecycle of the external node process.

use crate::error::{Error, Result};
use ckb_logger::{debug, info, warn};
use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::{Duration, Instant};

const REAP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The node launched by the harness.
///
/// On Unix the child leads its own process group, so terminating the group
/// also stops whatever the launcher script spawned. Dropping the value
/// cancels the process.
pub struct NodeProcess {
    script: PathBuf,
    kill_grace: Duration,
    child: Option<Child>,
    kill_handle: KillHandle,
    reported_exit: bool,
}

/// Terminates the node's process group from another thread, e.g. a Ctrl-C hook.
///
/// A handle can be created before the node and attached with
/// [`NodeProcess::with_kill_handle`], so the hook covers the readiness wait too.
#[derive(Clone, Debug, Default)]
pub struct KillHandle(Arc<Mutex<Option<u32>>>);

impl KillHandle {
    pub fn new() -> Self {
        KillHandle::default()
    }

    fn set(&self, pid: Option<u32>) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = pid;
        }
    }

    /// Sends SIGTERM to the node's process group, if one is running.
    pub fn terminate(&self) {
        let pid = match self.0.lock() {
            Ok(slot) => *slot,
            Err(_) => return,
        };
        if let Some(pid) = pid {
            info!("Terminating node process group {}", pid);
            if let Err(err) = signal_group(pid, GroupSignal::Term) {
                warn!("Could not signal node process group {}: {}", pid, err);
            }
        }
    }
}

impl NodeProcess {
    pub fn new<P: Into<PathBuf>>(script: P) -> Self {
        NodeProcess {
            script: script.into(),
            kill_grace: Duration::from_secs(5),
            child: None,
            kill_handle: KillHandle::default(),
            reported_exit: false,
        }
    }

    /// Reports the pid of every later `start` to `handle`.
    pub fn with_kill_handle(mut self, handle: KillHandle) -> Self {
        self.kill_handle = handle;
        self
    }

    /// How long `cancel` waits after SIGTERM before escalating to SIGKILL.
    pub fn kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Launches the script without waiting for it. Both output streams go to
    /// the harness's stderr.
    pub fn start(&mut self) -> Result<()> {
        if self.child.is_some() {
            debug!("Node process is already started");
            return Ok(());
        }
        let launch_err = |source| Error::Launch {
            path: self.script.clone(),
            source,
        };

        let mut command = Command::new(&self.script);
        command
            .stdin(Stdio::null())
            .stdout(stderr_stdio().map_err(launch_err)?)
            .stderr(Stdio::inherit());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = command.spawn().map_err(launch_err)?;
        info!(
            "Started node process {} from {}",
            child.id(),
            self.script.display()
        );
        self.kill_handle.set(Some(child.id()));
        self.reported_exit = false;
        self.child = Some(child);
        Ok(())
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.try_exit_status(), Ok(None)) && self.child.is_some()
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Non-blocking check: `Some(status)` once the launched process has exited.
    pub fn try_exit_status(&mut self) -> Result<Option<ExitStatus>> {
        match self.child.as_mut() {
            Some(child) => {
                let status = child.try_wait()?;
                if let Some(status) = status {
                    if !self.reported_exit {
                        self.reported_exit = true;
                        info!("Node process exited with {}", status);
                    }
                }
                Ok(status)
            }
            None => Ok(None),
        }
    }

    pub fn kill_handle(&self) -> KillHandle {
        self.kill_handle.clone()
    }

    /// Stops the node and reaps it. Does nothing if it was never started, the
    /// start failed, or it was already cancelled.
    pub fn cancel(&mut self) {
        let mut child = match self.child.take() {
            Some(child) => child,
            None => return,
        };
        self.kill_handle.set(None);
        let pid = child.id();

        // the launcher may have exited while the node it spawned lives on
        if let Err(err) = signal_group(pid, GroupSignal::Term) {
            debug!("SIGTERM to node process group {}: {}", pid, err);
        }
        if let Err(err) = wait_with_grace(&mut child, self.kill_grace) {
            warn!("Failed to wait for node process {}: {}", pid, err);
        }
        let _ = signal_group(pid, GroupSignal::Kill);
        match child.try_wait() {
            Ok(Some(status)) => info!("Node process {} stopped with {}", pid, status),
            _ => {
                if let Err(err) = child.kill() {
                    debug!("Kill node process {}: {}", pid, err);
                }
                match child.wait() {
                    Ok(status) => info!("Node process {} killed with {}", pid, status),
                    Err(err) => warn!("Could not reap node process {}: {}", pid, err),
                }
            }
        }
    }
}

impl Drop for NodeProcess {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Waits until both the child is reaped and its process group is empty, or
/// `grace` runs out.
fn wait_with_grace(child: &mut Child, grace: Duration) -> io::Result<()> {
    let pid = child.id();
    let deadline = Instant::now() + grace;
    loop {
        // `try_wait` keeps returning the status once the child is reaped
        if child.try_wait()?.is_some() && !group_alive(pid) {
            return Ok(());
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            debug!("Node process group {} outlived the grace period", pid);
            return Ok(());
        }
        sleep(REAP_POLL_INTERVAL.min(remaining));
    }
}

enum GroupSignal {
    Term,
    Kill,
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: GroupSignal) -> io::Result<()> {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let pid = i32::try_from(pid).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    let signal = match signal {
        GroupSignal::Term => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };
    killpg(Pid::from_raw(pid), signal).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn signal_group(_pid: u32, _signal: GroupSignal) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

/// Whether any process is left in the group led by `pid`.
#[cfg(unix)]
fn group_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match i32::try_from(pid) {
        Ok(pid) => !matches!(
            killpg(Pid::from_raw(pid), None::<Signal>),
            Err(Errno::ESRCH)
        ),
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn group_alive(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
fn stderr_stdio() -> io::Result<Stdio> {
    use std::os::fd::AsFd;
    Ok(Stdio::from(io::stderr().as_fd().try_clone_to_owned()?))
}

#[cfg(not(unix))]
fn stderr_stdio() -> io::Result<Stdio> {
    Ok(Stdio::inherit())
}
