use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Moves the staged ciphertext into `archive_dir` and deletes the plaintext.
///
/// Today's artifact supersedes any earlier one of the same name. The plaintext
/// is only deleted once the ciphertext sits in the archive directory; if the
/// move fails both staged files stay where they are.
pub fn archive(encrypted: &Path, plaintext: &Path, archive_dir: &Path) -> Result<PathBuf> {
    let file_name = encrypted
        .file_name()
        .ok_or_else(|| std::io::Error::other(format!("{:?} has no file name", encrypted)))?;
    let destination = archive_dir.join(file_name);

    if destination.exists() {
        info!("Replacing earlier archive for today {:?}", destination);
        std::fs::remove_file(&destination)
            .map_err(Error::from)
            .with_msg(format!("Remove superseded archive {:?} failed", destination))?;
    }

    move_file(encrypted, &destination)
        .with_msg(format!("Move {:?} to {:?} failed", encrypted, destination))?;
    info!("Archived backup to {:?}", destination);

    sync_dir(archive_dir)
        .with_msg(format!("Sync archive dir {:?} failed", archive_dir))?;

    std::fs::remove_file(plaintext)
        .map_err(Error::from)
        .with_msg(format!("Remove plaintext {:?} failed", plaintext))?;
    info!("Removed plaintext {:?}", plaintext);

    Ok(destination)
}

/// `rename`, falling back to copy + fsync + rename for archive directories on
/// another device (network shares, separate mounts).
fn move_file(src: &Path, dst: &Path) -> Result<()> {
    let rename_err = match std::fs::rename(src, dst) {
        Ok(_) => return Ok(()),
        Err(e) => e,
    };
    warn!(
        "Rename {:?} to {:?} failed ({}), copying instead",
        src, dst, rename_err
    );

    let mut tmp_name = dst.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    copy_synced(src, &tmp)
        .and_then(|_| std::fs::rename(&tmp, dst).map_err(Error::from))
        .map_err(|mut e| {
            if tmp.exists() {
                if let Err(e2) = std::fs::remove_file(&tmp) {
                    e = e.chain(e2.into())
                }
            }
            e
        })?;

    std::fs::remove_file(src)
        .map_err(Error::from)
        .with_msg(format!("Remove staged ciphertext {:?} failed", src))
}

/// Persists the directory entry of a freshly moved file.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

fn copy_synced(src: &Path, dst: &Path) -> Result<()> {
    let mut reader = File::open(src)?;
    let mut writer = File::create(dst)?;
    std::io::copy(&mut reader, &mut writer)?;
    writer.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Dirs {
        _root: TempDir,
        staging: PathBuf,
        archive: PathBuf,
    }

    fn dirs() -> Dirs {
        let root = TempDir::new().unwrap();
        let staging = root.path().join("staging");
        let archive = root.path().join("archive");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::create_dir_all(&archive).unwrap();
        Dirs {
            _root: root,
            staging,
            archive,
        }
    }

    fn stage(dirs: &Dirs) -> (PathBuf, PathBuf) {
        let plaintext = dirs.staging.join("03-04-2025.bak");
        let encrypted = dirs.staging.join("03-04-2025.bak.encrypted");
        std::fs::write(&plaintext, b"plain").unwrap();
        std::fs::write(&encrypted, b"cipher").unwrap();
        (plaintext, encrypted)
    }

    #[test]
    fn test_archive_moves_and_removes_plaintext() {
        let dirs = dirs();
        let (plaintext, encrypted) = stage(&dirs);

        let destination = archive(&encrypted, &plaintext, &dirs.archive).unwrap();

        assert_eq!(destination, dirs.archive.join("03-04-2025.bak.encrypted"));
        assert_eq!(std::fs::read(&destination).unwrap(), b"cipher");
        assert!(!encrypted.exists());
        assert!(!plaintext.exists());
    }

    #[test]
    fn test_archive_supersedes_same_day_artifact() {
        let dirs = dirs();
        let (plaintext, encrypted) = stage(&dirs);
        let earlier = dirs.archive.join("03-04-2025.bak.encrypted");
        std::fs::write(&earlier, b"earlier attempt").unwrap();

        archive(&encrypted, &plaintext, &dirs.archive).unwrap();

        assert_eq!(std::fs::read(&earlier).unwrap(), b"cipher");
        assert_eq!(std::fs::read_dir(&dirs.archive).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_move_keeps_plaintext() {
        let dirs = dirs();
        let (plaintext, encrypted) = stage(&dirs);
        let previous_day = dirs.archive.join("03-03-2025.bak.encrypted");
        std::fs::write(&previous_day, b"yesterday").unwrap();
        let unreachable = dirs.archive.join("unmounted-share");

        assert!(archive(&encrypted, &plaintext, &unreachable).is_err());

        assert!(plaintext.exists());
        assert!(encrypted.exists());
        assert!(!unreachable.join("03-04-2025.bak.encrypted").exists());
        assert!(!unreachable.join("03-04-2025.bak.encrypted.tmp").exists());
        assert_eq!(std::fs::read(&previous_day).unwrap(), b"yesterday");
    }

    #[test]
    #[cfg(unix)]
    fn test_sync_dir() {
        let dirs = dirs();
        assert!(sync_dir(&dirs.archive).is_ok());
        assert!(sync_dir(&dirs.archive.join("unmounted-share")).is_err());
    }

    #[test]
    fn test_copy_synced_leaves_source() {
        let dirs = dirs();
        let (_, encrypted) = stage(&dirs);
        let dst = dirs.archive.join("03-04-2025.bak.encrypted");

        copy_synced(&encrypted, &dst).unwrap();

        assert_eq!(std::fs::read(&dst).unwrap(), b"cipher");
        assert!(encrypted.exists());
    }
}
