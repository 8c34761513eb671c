//! Local account name resolution.

use std::path::Path;

#[cfg(unix)]
use nix::unistd::{geteuid, Gid, Group, Uid, User};

/// Name of the account running this process.
///
/// Falls back to `$USER` / `$USERNAME`, then to `"unknown"`.
pub fn current_user_name() -> String {
    #[cfg(unix)]
    {
        if let Some(name) = user_name(geteuid().as_raw()) {
            return name;
        }
    }
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Name of the account owning `path`, or its numeric uid when the uid has
/// no passwd entry.
#[cfg(unix)]
pub fn file_owner_name(path: &Path) -> std::io::Result<String> {
    use std::os::unix::fs::MetadataExt;

    let uid = std::fs::metadata(path)?.uid();
    Ok(user_name(uid).unwrap_or_else(|| uid.to_string()))
}

#[cfg(not(unix))]
pub fn file_owner_name(_path: &Path) -> std::io::Result<String> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "file ownership is not available on this platform",
    ))
}

/// passwd name for `uid`.
#[cfg(unix)]
pub fn user_name(uid: u32) -> Option<String> {
    User::from_uid(Uid::from_raw(uid))
        .ok()
        .flatten()
        .map(|user| user.name)
}

/// group name for `gid`.
#[cfg(unix)]
pub fn group_name(gid: u32) -> Option<String> {
    Group::from_gid(Gid::from_raw(gid))
        .ok()
        .flatten()
        .map(|group| group.name)
}
