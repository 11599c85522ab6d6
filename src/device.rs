//! Backlight device discovery.

use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the attribute file watched for changes.
const BRIGHTNESS_ATTRIBUTE: &str = "brightness";

/// The backlight device selected at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Directory entry name, e.g. `intel_backlight`.
    pub id: String,
    /// `<root>/<id>/brightness`, the file whose changes trigger updates.
    pub brightness_path: PathBuf,
}

impl Device {
    /// Build the device entry for `id` under `root`.
    #[must_use]
    pub fn new(root: &Path, id: &str) -> Self {
        Self {
            id: id.to_string(),
            brightness_path: root.join(id).join(BRIGHTNESS_ATTRIBUTE),
        }
    }
}

/// Select the first backlight device listed under `root`.
///
/// Entries are taken in the order the directory listing returns them, with
/// no sorting and no preference between devices. The brightness file itself
/// is not opened here.
///
/// # Arguments
///
/// * `root` - Backlight class directory, normally `/sys/class/backlight`
///
/// # Errors
///
/// Returns an error if:
/// - `root` cannot be listed
/// - An entry cannot be read or its name is not valid UTF-8
/// - `root` contains no entries at all
pub fn discover(root: &Path) -> Result<Device> {
    let mut entries = fs::read_dir(root)
        .with_context(|| format!("Failed to list backlight devices in {}", root.display()))?;

    let Some(entry) = entries.next() else {
        return Err(anyhow!(
            "No backlight devices found in {}",
            root.display()
        ));
    };
    let entry = entry.with_context(|| format!("Failed to read entry of {}", root.display()))?;
    let id = entry
        .file_name()
        .into_string()
        .map_err(|name| {
            anyhow!(
                "Backlight device name is not valid UTF-8: {}",
                name.display()
            )
        })?;

    Ok(Device::new(root, &id))
}
