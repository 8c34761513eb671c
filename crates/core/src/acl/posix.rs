//! POSIX access rules: owner and group permission bits plus the named
//! entries of the `system.posix_acl_access` extended attribute.

use std::path::Path;

use crate::errors::AclError;

use super::{AclRule, AclScanner};

/// Extended attribute holding the access ACL on Linux.
pub const ACL_XATTR: &str = "system.posix_acl_access";

const ACL_EA_VERSION: u32 = 2;
const ACL_USER: u16 = 0x02;
const ACL_GROUP: u16 = 0x08;

/// Scanner backed by the host's POSIX metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixAclScanner;

impl AclScanner for PosixAclScanner {
    #[cfg(unix)]
    fn rules_for(&self, path: &Path) -> Result<Vec<AclRule>, AclError> {
        use std::os::unix::fs::MetadataExt;

        use super::accounts::{group_name, user_name};

        let meta = std::fs::metadata(path).map_err(|source| AclError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        let mode = meta.mode();

        let mut rules = vec![
            AclRule::new(
                user_name(meta.uid()).unwrap_or_else(|| meta.uid().to_string()),
                rights_text(mode >> 6),
            ),
            AclRule::new(
                group_name(meta.gid()).unwrap_or_else(|| meta.gid().to_string()),
                rights_text(mode >> 3),
            ),
        ];

        match xattr::get(path, ACL_XATTR) {
            Ok(Some(blob)) => {
                let entries = parse_acl_xattr(&blob).map_err(|detail| AclError::Malformed {
                    path: path.display().to_string(),
                    detail,
                })?;
                for entry in entries {
                    let name = match entry.tag {
                        ACL_USER => user_name(entry.id),
                        ACL_GROUP => group_name(entry.id),
                        _ => continue,
                    };
                    rules.push(AclRule::new(
                        name.unwrap_or_else(|| entry.id.to_string()),
                        rights_text(u32::from(entry.perm)),
                    ));
                }
            }
            Ok(None) => {}
            // Filesystems without xattr support still have the mode bits.
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "no extended ACL"),
        }

        Ok(rules)
    }

    #[cfg(not(unix))]
    fn rules_for(&self, _path: &Path) -> Result<Vec<AclRule>, AclError> {
        Err(AclError::Unsupported)
    }
}

/// `rwx`-style rendering of the low three permission bits.
pub fn rights_text(bits: u32) -> String {
    let mut text = String::with_capacity(3);
    text.push(if bits & 0o4 != 0 { 'r' } else { '-' });
    text.push(if bits & 0o2 != 0 { 'w' } else { '-' });
    text.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    text
}

/// One raw entry of a POSIX ACL xattr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclXattrEntry {
    pub tag: u16,
    pub perm: u16,
    pub id: u32,
}

/// Decode the little-endian `posix_acl_xattr` layout: a `u32` version
/// header followed by 8-byte `(tag: u16, perm: u16, id: u32)` entries.
pub fn parse_acl_xattr(blob: &[u8]) -> Result<Vec<AclXattrEntry>, String> {
    if blob.len() < 4 {
        return Err(format!("blob too short ({} bytes)", blob.len()));
    }
    let (header, body) = blob.split_at(4);
    let version = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    if version != ACL_EA_VERSION {
        return Err(format!("unsupported ACL version {version}"));
    }
    if body.len() % 8 != 0 {
        return Err(format!("trailing {} bytes after last entry", body.len() % 8));
    }

    Ok(body
        .chunks_exact(8)
        .map(|chunk| AclXattrEntry {
            tag: u16::from_le_bytes([chunk[0], chunk[1]]),
            perm: u16::from_le_bytes([chunk[2], chunk[3]]),
            id: u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_bytes(tag: u16, perm: u16, id: u32) -> Vec<u8> {
        let mut bytes = tag.to_le_bytes().to_vec();
        bytes.extend_from_slice(&perm.to_le_bytes());
        bytes.extend_from_slice(&id.to_le_bytes());
        bytes
    }

    #[test]
    fn test_rights_text() {
        assert_eq!(rights_text(0o7), "rwx");
        assert_eq!(rights_text(0o5), "r-x");
        assert_eq!(rights_text(0o640 >> 6), "rw-");
        assert_eq!(rights_text(0), "---");
    }

    #[test]
    fn test_parse_acl_xattr() {
        let mut blob = ACL_EA_VERSION.to_le_bytes().to_vec();
        blob.extend(entry_bytes(0x01, 6, u32::MAX));
        blob.extend(entry_bytes(ACL_USER, 4, 1000));
        blob.extend(entry_bytes(ACL_GROUP, 5, 2000));

        let entries = parse_acl_xattr(&blob).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[1],
            AclXattrEntry {
                tag: ACL_USER,
                perm: 4,
                id: 1000
            }
        );
    }

    #[test]
    fn test_parse_acl_xattr_rejects_garbage() {
        assert!(parse_acl_xattr(&[1, 2]).is_err());
        assert!(parse_acl_xattr(&1u32.to_le_bytes()).is_err());

        let mut blob = ACL_EA_VERSION.to_le_bytes().to_vec();
        blob.extend_from_slice(&[0, 0, 0]);
        assert!(parse_acl_xattr(&blob).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_scanner_reports_owner_rule() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"x").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640)).unwrap();

        let rules = PosixAclScanner.rules_for(&path).unwrap();
        assert!(rules.len() >= 2);
        assert_eq!(rules[0].identity, crate::acl::accounts::file_owner_name(&path).unwrap());
        assert_eq!(rules[0].rights, "rw-");
        assert_eq!(rules[1].rights, "r--");
    }

    #[test]
    fn test_scanner_missing_path_is_an_error() {
        let result = PosixAclScanner.rules_for(Path::new("/nonexistent/r3sync/path"));
        assert!(result.is_err());
    }
}
