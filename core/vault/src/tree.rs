//! Recursive sealing and restoring of folder trees.
//!
//! A source folder maps onto a vault folder one-to-one: every directory is
//! recreated and every regular file `name` becomes `name.enc`. The walk
//! skips symlinks and other special files, so callers reject source folders
//! holding them via [`find_special_entry`] before sealing.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::ENCRYPTED_EXTENSION;
use crate::envelope::{EncryptedFileRecord, FileMetadata, SealedBlob};
use crate::layout::{create_private_dir, set_private_file};
use phantomvault_common::{Error, Result};
use phantomvault_crypto::{wipe_vec, EncryptionEngine, KeyDerivationConfig};

/// Totals for one sealed or restored tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeSummary {
    pub file_count: u64,
    pub total_size: u64,
}

/// Type of entry found while walking a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    File,
    Directory,
}

/// One entry of a walked tree, relative to its root.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub relative: PathBuf,
    pub node_type: NodeType,
}

/// Walk `root` depth-first, parents before children.
///
/// Symlinks are not followed and not reported.
pub fn walk(root: &Path) -> Result<Vec<TreeNode>> {
    let mut nodes = Vec::new();
    walk_into(root, Path::new(""), &mut nodes)?;
    Ok(nodes)
}

fn walk_into(root: &Path, relative: &Path, nodes: &mut Vec<TreeNode>) -> Result<()> {
    let mut entries = fs::read_dir(root.join(relative))?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let child = relative.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            nodes.push(TreeNode {
                relative: child.clone(),
                node_type: NodeType::Directory,
            });
            walk_into(root, &child, nodes)?;
        } else if file_type.is_file() {
            nodes.push(TreeNode {
                relative: child,
                node_type: NodeType::File,
            });
        } else {
            debug!(path = %child.display(), "Skipping non-regular entry");
        }
    }
    Ok(())
}

/// First entry under `root` that is neither a directory nor a regular file,
/// relative to `root`.
pub fn find_special_entry(root: &Path) -> Result<Option<PathBuf>> {
    find_special_in(root, Path::new(""))
}

fn find_special_in(root: &Path, relative: &Path) -> Result<Option<PathBuf>> {
    for entry in fs::read_dir(root.join(relative))? {
        let entry = entry?;
        let child = relative.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if let Some(found) = find_special_in(root, &child)? {
                return Ok(Some(found));
            }
        } else if !file_type.is_file() {
            return Ok(Some(child));
        }
    }
    Ok(None)
}

fn sealed_name(relative: &Path) -> PathBuf {
    let mut name = relative.as_os_str().to_os_string();
    name.push(".");
    name.push(ENCRYPTED_EXTENSION);
    PathBuf::from(name)
}

fn unsealed_name(relative: &Path) -> Option<PathBuf> {
    if relative.extension()? != ENCRYPTED_EXTENSION {
        return None;
    }
    Some(relative.with_extension(""))
}

/// Encrypt every regular file under `source` into `dest`.
///
/// `dest` must not exist yet. On error the caller removes `dest`; nothing
/// under `source` is modified either way.
///
/// # Errors
/// - `InvalidInput` if `source` is not a directory
/// - The first I/O or crypto error encountered; no partial result is returned
pub fn seal_tree(
    engine: &EncryptionEngine,
    source: &Path,
    dest: &Path,
    master_key: &[u8],
    kdf: &KeyDerivationConfig,
) -> Result<TreeSummary> {
    if !fs::symlink_metadata(source)?.is_dir() {
        return Err(Error::InvalidInput(format!(
            "Not a directory: {}",
            source.display()
        )));
    }
    create_private_dir(dest)?;

    let mut summary = TreeSummary::default();
    for node in walk(source)? {
        match node.node_type {
            NodeType::Directory => create_private_dir(&dest.join(&node.relative))?,
            NodeType::File => {
                let source_file = source.join(&node.relative);
                let mut plaintext = fs::read(&source_file)?;

                let sealed = FileMetadata::capture(&source_file, &plaintext).and_then(|metadata| {
                    SealedBlob::seal(engine, &plaintext, master_key, kdf)
                        .map(|blob| EncryptedFileRecord { blob, metadata })
                });
                let size = plaintext.len() as u64;
                wipe_vec(&mut plaintext);

                let target = dest.join(sealed_name(&node.relative));
                sealed?.write(&target)?;
                set_private_file(&target)?;

                summary.file_count += 1;
                summary.total_size += size;
            }
        }
    }

    debug!(
        files = summary.file_count,
        bytes = summary.total_size,
        "Folder tree sealed"
    );
    Ok(summary)
}

/// Decrypt every `*.enc` under `source` into `dest`, recreating directories.
///
/// Checksums are verified and file attributes restored. `dest` must not
/// exist yet; on error the caller removes it.
pub fn open_tree(
    engine: &EncryptionEngine,
    source: &Path,
    dest: &Path,
    master_key: &[u8],
) -> Result<TreeSummary> {
    fs::create_dir_all(dest)?;

    let mut summary = TreeSummary::default();
    for node in walk(source)? {
        match node.node_type {
            NodeType::Directory => fs::create_dir_all(dest.join(&node.relative))?,
            NodeType::File => {
                let Some(restored) = unsealed_name(&node.relative) else {
                    warn!(path = %node.relative.display(), "Ignoring unexpected file in vault");
                    continue;
                };
                let record = EncryptedFileRecord::read(&source.join(&node.relative))?;
                let mut plaintext = record.blob.open(engine, master_key)?;

                let written = record
                    .metadata
                    .verify_checksum(&plaintext)
                    .and_then(|()| {
                        let target = dest.join(&restored);
                        fs::write(&target, &plaintext)?;
                        record.metadata.apply(&target)
                    });
                let size = plaintext.len() as u64;
                wipe_vec(&mut plaintext);
                written?;

                summary.file_count += 1;
                summary.total_size += size;
            }
        }
    }

    debug!(files = summary.file_count, "Folder tree restored");
    Ok(summary)
}

/// Number of `*.enc` files under `dir`.
pub fn count_sealed_files(dir: &Path) -> Result<u64> {
    let count = walk(dir)?
        .iter()
        .filter(|n| n.node_type == NodeType::File && unsealed_name(&n.relative).is_some())
        .count();
    Ok(count as u64)
}

/// Path of some `*.enc` file under `dir`, if there is one.
pub fn first_sealed_file(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }
    Ok(walk(dir)?
        .into_iter()
        .find(|n| n.node_type == NodeType::File && unsealed_name(&n.relative).is_some())
        .map(|n| dir.join(n.relative)))
}

/// Total bytes of regular files under `dir`; zero if it does not exist.
pub fn disk_usage(dir: &Path) -> Result<u64> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut total = 0;
    for node in walk(dir)? {
        if node.node_type == NodeType::File {
            total += fs::symlink_metadata(dir.join(&node.relative))?.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn kdf() -> KeyDerivationConfig {
        KeyDerivationConfig::lightweight()
    }

    fn populate(root: &Path) {
        fs::create_dir_all(root.join("docs/empty")).unwrap();
        fs::write(root.join("top.txt"), b"0123456789").unwrap();
        fs::write(root.join("docs/report.txt"), b"quarterly numbers".repeat(20)).unwrap();
    }

    #[test]
    fn test_walk_order_and_types() {
        let temp = TempDir::new().unwrap();
        populate(temp.path());

        let nodes = walk(temp.path()).unwrap();
        let names: Vec<_> = nodes.iter().map(|n| n.relative.clone()).collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("docs"),
                PathBuf::from("docs/empty"),
                PathBuf::from("docs/report.txt"),
                PathBuf::from("top.txt"),
            ]
        );
        assert_eq!(nodes[0].node_type, NodeType::Directory);
        assert_eq!(nodes[3].node_type, NodeType::File);
    }

    #[test]
    fn test_sealed_names() {
        assert_eq!(sealed_name(Path::new("a/b.txt")), PathBuf::from("a/b.txt.enc"));
        assert_eq!(
            unsealed_name(Path::new("a/b.txt.enc")),
            Some(PathBuf::from("a/b.txt"))
        );
        assert_eq!(unsealed_name(Path::new("a/b.txt")), None);
    }

    #[test]
    fn test_seal_and_open_tree() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        let sealed = temp.path().join("sealed");
        let restored = temp.path().join("restored");
        populate(&source);

        let engine = EncryptionEngine::new();
        let summary = seal_tree(&engine, &source, &sealed, b"secret123", &kdf()).unwrap();
        assert_eq!(summary.file_count, 2);
        assert_eq!(summary.total_size, 10 + 17 * 20);
        assert_eq!(count_sealed_files(&sealed).unwrap(), 2);
        assert!(sealed.join("docs/report.txt.enc").exists());
        assert!(sealed.join("docs/empty").is_dir());

        let stored = fs::read(sealed.join("top.txt.enc")).unwrap();
        assert!(!String::from_utf8_lossy(&stored).contains("0123456789"));

        let opened = open_tree(&engine, &sealed, &restored, b"secret123").unwrap();
        assert_eq!(opened, summary);
        assert_eq!(fs::read(restored.join("top.txt")).unwrap(), b"0123456789");
        assert!(restored.join("docs/empty").is_dir());
    }

    #[test]
    fn test_open_tree_wrong_key_fails() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        let sealed = temp.path().join("sealed");
        populate(&source);

        let engine = EncryptionEngine::new();
        seal_tree(&engine, &source, &sealed, b"secret123", &kdf()).unwrap();

        let result = open_tree(&engine, &sealed, &temp.path().join("out"), b"wrong");
        assert!(matches!(result, Err(Error::Crypto(_))));
    }

    #[test]
    fn test_seal_rejects_file_source() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("plain.txt");
        fs::write(&file, b"x").unwrap();

        let engine = EncryptionEngine::new();
        let result = seal_tree(&engine, &file, &temp.path().join("out"), b"k", &kdf());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_find_special_entry() {
        let temp = TempDir::new().unwrap();
        populate(temp.path());
        assert_eq!(find_special_entry(temp.path()).unwrap(), None);

        std::os::unix::fs::symlink("../top.txt", temp.path().join("docs/shortcut")).unwrap();
        assert_eq!(
            find_special_entry(temp.path()).unwrap(),
            Some(PathBuf::from("docs/shortcut"))
        );
    }

    #[test]
    fn test_disk_usage_missing_dir() {
        let temp = TempDir::new().unwrap();
        assert_eq!(disk_usage(&temp.path().join("missing")).unwrap(), 0);
    }
}
