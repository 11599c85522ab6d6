//! Change notifications for the backlight's brightness attribute.

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify};
use std::os::fd::{AsFd, BorrowedFd};
use std::path::{Path, PathBuf};

use crate::logs::debug;

/// inotify watch on a single file.
///
/// The descriptor is non-blocking and meant to be polled by the event loop.
/// Every event is reported as one change, whatever its kind.
#[derive(Debug)]
pub struct Watcher {
    inotify: Inotify,
    path: PathBuf,
}

impl Watcher {
    /// Start watching `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the inotify instance cannot be created or the
    /// watch cannot be added, typically because `path` does not exist.
    pub fn new(path: &Path) -> Result<Self> {
        let inotify = Inotify::init(InitFlags::IN_NONBLOCK | InitFlags::IN_CLOEXEC)
            .context("Failed to initialize inotify")?;
        let mask = AddWatchFlags::IN_MODIFY
            | AddWatchFlags::IN_ATTRIB
            | AddWatchFlags::IN_DELETE_SELF
            | AddWatchFlags::IN_MOVE_SELF;
        inotify
            .add_watch(path, mask)
            .with_context(|| format!("Failed to watch {}", path.display()))?;

        Ok(Self {
            inotify,
            path: path.to_path_buf(),
        })
    }

    /// Path being watched.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every queued event and return how many there were.
    ///
    /// Returns `Ok(0)` when nothing is queued.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the inotify descriptor fails.
    pub fn drain(&self) -> Result<usize> {
        let mut count = 0;
        loop {
            match self.inotify.read_events() {
                Ok(events) => {
                    for event in &events {
                        debug(&format!("{}: {:?}", self.path().display(), event.mask));
                    }
                    count += events.len();
                }
                Err(Errno::EAGAIN) => return Ok(count),
                Err(Errno::EINTR) => {}
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to read events for {}", self.path().display()));
                }
            }
        }
    }
}

impl AsFd for Watcher {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inotify.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::poll::{PollFd, PollFlags, poll};
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use tempfile::TempDir;

    /// Overwrite the attribute in place, like the kernel does, without truncating.
    fn write_brightness(path: &Path, value: &str) -> Result<()> {
        OpenOptions::new()
            .write(true)
            .open(path)?
            .write_all(value.as_bytes())?;
        Ok(())
    }

    fn wait_readable(watcher: &Watcher) -> Result<bool> {
        let pollfd = PollFd::new(watcher.as_fd(), PollFlags::POLLIN);
        Ok(poll(&mut [pollfd], 1000_u16)? > 0)
    }

    #[test]
    fn test_no_events_without_changes() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("brightness");
        fs::write(&path, "100\n")?;

        let watcher = Watcher::new(&path)?;
        assert_eq!(watcher.path(), path);
        assert_eq!(watcher.drain()?, 0);
        Ok(())
    }

    #[test]
    fn test_write_produces_event() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("brightness");
        fs::write(&path, "100\n")?;

        let watcher = Watcher::new(&path)?;
        write_brightness(&path, "200\n")?;

        assert!(wait_readable(&watcher)?);
        assert_eq!(watcher.drain()?, 1);
        assert_eq!(watcher.drain()?, 0);
        Ok(())
    }

    #[test]
    fn test_attribute_change_produces_event() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("brightness");
        fs::write(&path, "100\n")?;

        let watcher = Watcher::new(&path)?;
        let mut permissions = fs::metadata(&path)?.permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&path, permissions)?;

        assert!(wait_readable(&watcher)?);
        assert!(watcher.drain()? >= 1);
        Ok(())
    }

    #[test]
    fn test_missing_file_fails() -> Result<()> {
        let dir = TempDir::new()?;
        assert!(Watcher::new(&dir.path().join("brightness")).is_err());
        Ok(())
    }
}
