//! inotify-backed watcher, driven through [`AsyncFd`] so cancellation is
//! observed while waiting for the kernel.

use std::collections::HashMap;
use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::path::PathBuf;

use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify, InotifyEvent, WatchDescriptor};
use tokio::io::unix::AsyncFd;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::classify::classify;
use crate::archive::DEPLOYMENTS_DIR;
use crate::bus::Bus;
use crate::error::{Error, Result};
use crate::model::{Event, FsEvent, FsOp};

const COMPONENT: &str = "fswatch";

/// Lets tokio poll the inotify descriptor.
struct InotifyFd(Inotify);

impl AsRawFd for InotifyFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_fd().as_raw_fd()
    }
}

fn watch_mask() -> AddWatchFlags {
    AddWatchFlags::IN_CREATE
        | AddWatchFlags::IN_MODIFY
        | AddWatchFlags::IN_DELETE
        | AddWatchFlags::IN_MOVED_FROM
        | AddWatchFlags::IN_MOVED_TO
        | AddWatchFlags::IN_ATTRIB
}

pub(crate) fn op_from_mask(mask: AddWatchFlags) -> Option<FsOp> {
    if mask.intersects(AddWatchFlags::IN_CREATE | AddWatchFlags::IN_MOVED_TO) {
        Some(FsOp::Create)
    } else if mask.contains(AddWatchFlags::IN_MODIFY) {
        Some(FsOp::Write)
    } else if mask.contains(AddWatchFlags::IN_DELETE) {
        Some(FsOp::Remove)
    } else if mask.contains(AddWatchFlags::IN_MOVED_FROM) {
        Some(FsOp::Rename)
    } else if mask.contains(AddWatchFlags::IN_ATTRIB) {
        Some(FsOp::Chmod)
    } else {
        None
    }
}

pub struct FsSource {
    home: PathBuf,
}

impl FsSource {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Home first, then `<home>/deployments`.
    pub fn watched_dirs(&self) -> [PathBuf; 2] {
        [self.home.clone(), self.home.join(DEPLOYMENTS_DIR)]
    }

    fn setup(&self) -> Result<(AsyncFd<InotifyFd>, HashMap<WatchDescriptor, PathBuf>)> {
        let inotify = Inotify::init(InitFlags::IN_NONBLOCK | InitFlags::IN_CLOEXEC)
            .map_err(|e| Error::Watcher(format!("inotify init failed: {e}")))?;

        // create everything first so our own mkdir is not reported
        for dir in self.watched_dirs() {
            std::fs::create_dir_all(&dir)
                .map_err(|e| Error::Watcher(format!("create {}: {e}", dir.display())))?;
        }
        let mut dirs = HashMap::new();
        for dir in self.watched_dirs() {
            let wd = inotify
                .add_watch(&dir, watch_mask())
                .map_err(|e| Error::Watcher(format!("watch {}: {e}", dir.display())))?;
            dirs.insert(wd, dir);
        }

        let fd = AsyncFd::new(InotifyFd(inotify))
            .map_err(|e| Error::Watcher(format!("register inotify fd: {e}")))?;
        Ok((fd, dirs))
    }

    /// Runs until cancelled; read failures and queue overflow are terminal.
    pub async fn publish(self, bus: Bus, token: CancellationToken) -> Result<()> {
        let (fd, dirs) = self.setup()?;
        info!(component = COMPONENT, event = "watching", home = %self.home.display(), "watching home directory");

        loop {
            let mut guard = tokio::select! {
                _ = token.cancelled() => return Ok(()),
                guard = fd.readable() => match guard {
                    Ok(guard) => guard,
                    Err(e) => return fail(&bus, format!("inotify poll failed: {e}")).await,
                },
            };

            let events = match guard.try_io(|inner| {
                inner.get_ref().0.read_events().map_err(std::io::Error::from)
            }) {
                Ok(Ok(events)) => events,
                Ok(Err(e)) => return fail(&bus, format!("inotify read failed: {e}")).await,
                Err(_would_block) => continue,
            };

            for raw in events {
                if raw.mask.contains(AddWatchFlags::IN_Q_OVERFLOW) {
                    return fail(&bus, "inotify queue overflow, events were lost".to_string()).await;
                }
                let Some(event) = self.translate(&dirs, &raw) else {
                    continue;
                };
                tokio::select! {
                    _ = token.cancelled() => return Ok(()),
                    res = bus.publish(Event::Filesystem(event)) => { res?; }
                }
            }
        }
    }

    fn translate(&self, dirs: &HashMap<WatchDescriptor, PathBuf>, raw: &InotifyEvent) -> Option<FsEvent> {
        let dir = dirs.get(&raw.wd)?;
        let op = op_from_mask(raw.mask)?;
        let path = match &raw.name {
            Some(name) => dir.join(name),
            None => dir.clone(),
        };
        let class = classify(&self.home, &path);
        debug!(component = COMPONENT, event = "notify", path = %path.display(), op = %op, class = ?class);
        Some(FsEvent { path, op, class })
    }
}

/// Reports a watcher failure on the bus, then ends the source with it.
async fn fail(bus: &Bus, cause: String) -> Result<()> {
    // the bus may already be closed during shutdown
    let _ = bus.publish(Event::Error { cause: cause.clone() }).await;
    Err(Error::Watcher(cause))
}
