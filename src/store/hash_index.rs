use crate::error::Error;
use crate::hasher::{Digest, HashAlgorithm};
use rocksdb::{DBIteratorWithThreadMode, Direction, IteratorMode, Options, WriteOptions, DB};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// Key layout:
//   m                          -> bincode(IndexMeta)
//   g | len | digest | seq:u64 -> path bytes
//   e | seq:u64                -> path bytes
// `seq` is big-endian so each group's members iterate in arrival order.
const META_KEY: &[u8] = b"m";
const GROUP_TAG: u8 = b'g';
const ERROR_TAG: u8 = b'e';

pub const INDEX_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: u32,
    pub algorithm: HashAlgorithm,
    pub created_at: String,
    /// Set once the build that owns the index has consumed every hash result.
    pub completed: bool,
    pub hashed: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashGroup {
    pub digest: Digest,
    pub paths: Vec<PathBuf>,
}

/// Durable digest → paths table for one work session.
///
/// Only the build phase writes; every other phase opens it with
/// [`HashIndex::open_read_only`].
pub struct HashIndex {
    db: DB,
    write_options: WriteOptions,
    next_seq: u64,
    read_only: bool,
    meta: IndexMeta,
}

impl HashIndex {
    /// Create a fresh index. Fails if a store already exists at `location`.
    pub fn create(
        location: &Path,
        algorithm: HashAlgorithm,
        sync_writes: bool,
    ) -> Result<Self, Error> {
        let mut db_options = Options::default();
        db_options.create_if_missing(true);
        db_options.set_error_if_exists(true);
        let db = DB::open(&db_options, location)?;
        debug!("Created hash index at '{}'", location.display());

        let mut write_options = WriteOptions::default();
        write_options.set_sync(sync_writes);

        let meta = IndexMeta {
            version: INDEX_VERSION,
            algorithm,
            created_at: chrono::Local::now().to_rfc3339(),
            completed: false,
            hashed: 0,
            errors: 0,
        };
        let index = HashIndex {
            db,
            write_options,
            next_seq: 0,
            read_only: false,
            meta,
        };
        index.put_meta()?;
        Ok(index)
    }

    pub fn open_read_only(location: &Path) -> Result<Self, Error> {
        if !location.is_dir() {
            return Err(Error::SessionMissing(location.to_path_buf()));
        }
        let db = DB::open_for_read_only(&Options::default(), location, false)?;
        let meta: IndexMeta = match db.get(META_KEY)? {
            Some(value) => bincode::deserialize(&value)?,
            None => return Err(Error::CorruptIndex("missing index metadata".to_string())),
        };
        if meta.version != INDEX_VERSION {
            return Err(Error::CorruptIndex(format!(
                "unsupported index version {}",
                meta.version
            )));
        }
        if !meta.completed {
            warn!(
                "Hash index at '{}' is from an unfinished build; \
                 results cover only the files hashed before it stopped",
                location.display()
            );
        }

        Ok(HashIndex {
            db,
            write_options: WriteOptions::default(),
            next_seq: 0,
            read_only: true,
            meta,
        })
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    /// Append `path` to the group for `digest`, or to the error list when there
    /// is no digest. The write has reached the log when this returns.
    pub fn add(&mut self, digest: Option<&Digest>, path: &Path) -> Result<(), Error> {
        if self.read_only {
            return Err(Error::ReadOnlyIndex);
        }
        let seq = self.next_seq;
        let key = match digest {
            Some(digest) => group_key(digest, seq)?,
            None => error_key(seq),
        };
        self.db.put_opt(key, encode_path(path), &self.write_options)?;
        self.next_seq += 1;
        match digest {
            Some(_) => self.meta.hashed += 1,
            None => self.meta.errors += 1,
        }
        Ok(())
    }

    /// Mark the index complete and flush memtables to disk.
    pub fn finish(&mut self) -> Result<(), Error> {
        if self.read_only {
            return Err(Error::ReadOnlyIndex);
        }
        self.meta.completed = true;
        self.put_meta()?;
        self.db.flush()?;
        debug!(
            "Hash index finished: {} hashed, {} errors",
            self.meta.hashed, self.meta.errors
        );
        Ok(())
    }

    /// Every digest group, ordered by digest; members in arrival order.
    pub fn groups(&self) -> Groups<'_> {
        Groups {
            inner: self
                .db
                .iterator(IteratorMode::From(&[GROUP_TAG], Direction::Forward)),
            pending: None,
            done: false,
        }
    }

    /// Paths whose hashing failed, in arrival order.
    pub fn errors(&self) -> Errors<'_> {
        Errors {
            inner: self
                .db
                .iterator(IteratorMode::From(&[ERROR_TAG], Direction::Forward)),
            done: false,
        }
    }

    fn put_meta(&self) -> Result<(), Error> {
        let value = bincode::serialize(&self.meta)?;
        let mut write_options = WriteOptions::default();
        write_options.set_sync(true);
        self.db.put_opt(META_KEY, value, &write_options)?;
        Ok(())
    }
}

pub struct Groups<'a> {
    inner: DBIteratorWithThreadMode<'a, DB>,
    pending: Option<(Digest, PathBuf)>,
    done: bool,
}

impl Iterator for Groups<'_> {
    type Item = Result<HashGroup, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut group = self.pending.take().map(|(digest, path)| HashGroup {
            digest,
            paths: vec![path],
        });

        loop {
            let (key, value) = match self.inner.next() {
                Some(Ok(item)) => item,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.done = true;
                    return group.map(Ok);
                }
            };
            if key.first() != Some(&GROUP_TAG) {
                self.done = true;
                return group.map(Ok);
            }
            let digest = match decode_group_key(&key) {
                Ok(digest) => digest,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            let path = decode_path(&value);

            match group.as_ref().map(|g| g.digest == digest) {
                Some(true) => {
                    if let Some(g) = group.as_mut() {
                        g.paths.push(path);
                    }
                }
                Some(false) => {
                    self.pending = Some((digest, path));
                    return group.map(Ok);
                }
                None => {
                    group = Some(HashGroup {
                        digest,
                        paths: vec![path],
                    });
                }
            }
        }
    }
}

pub struct Errors<'a> {
    inner: DBIteratorWithThreadMode<'a, DB>,
    done: bool,
}

impl Iterator for Errors<'_> {
    type Item = Result<PathBuf, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next() {
            Some(Ok((key, value))) if key.first() == Some(&ERROR_TAG) => {
                Some(Ok(decode_path(&value)))
            }
            Some(Ok(_)) | None => {
                self.done = true;
                None
            }
            Some(Err(e)) => {
                self.done = true;
                Some(Err(e.into()))
            }
        }
    }
}

fn group_key(digest: &Digest, seq: u64) -> Result<Vec<u8>, Error> {
    let bytes = digest.as_bytes();
    let len = u8::try_from(bytes.len())
        .map_err(|_| Error::CorruptIndex(format!("digest of {} bytes is too wide", bytes.len())))?;
    let mut key = Vec::with_capacity(2 + bytes.len() + 8);
    key.push(GROUP_TAG);
    key.push(len);
    key.extend_from_slice(bytes);
    key.extend_from_slice(&seq.to_be_bytes());
    Ok(key)
}

fn error_key(seq: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(ERROR_TAG);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn decode_group_key(key: &[u8]) -> Result<Digest, Error> {
    let len = *key
        .get(1)
        .ok_or_else(|| Error::CorruptIndex("truncated group key".to_string()))? as usize;
    if key.len() != 2 + len + 8 {
        return Err(Error::CorruptIndex(format!(
            "group key of {} bytes does not match digest width {}",
            key.len(),
            len
        )));
    }
    Ok(Digest::from_bytes(&key[2..2 + len]))
}

#[cfg(unix)]
fn encode_path(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(unix)]
fn decode_path(bytes: &[u8]) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn encode_path(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(not(unix))]
fn decode_path(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn digest(byte: u8) -> Digest {
        Digest::from_bytes(vec![byte; 32])
    }

    #[test]
    fn test_groups_keep_arrival_order() {
        let tmp = tempdir().unwrap();
        let location = tmp.path().join("hash");
        let mut index = HashIndex::create(&location, HashAlgorithm::Blake3, false).unwrap();

        index.add(Some(&digest(2)), Path::new("/z/late")).unwrap();
        index.add(Some(&digest(1)), Path::new("/b")).unwrap();
        index.add(None, Path::new("/broken")).unwrap();
        index.add(Some(&digest(2)), Path::new("/a/early")).unwrap();
        index.add(Some(&digest(1)), Path::new("/a")).unwrap();

        let groups: Vec<HashGroup> = index.groups().collect::<Result<_, _>>().unwrap();
        assert_eq!(
            groups,
            vec![
                HashGroup {
                    digest: digest(1),
                    paths: vec![PathBuf::from("/b"), PathBuf::from("/a")],
                },
                HashGroup {
                    digest: digest(2),
                    paths: vec![PathBuf::from("/z/late"), PathBuf::from("/a/early")],
                },
            ]
        );
        let errors: Vec<PathBuf> = index.errors().collect::<Result<_, _>>().unwrap();
        assert_eq!(errors, vec![PathBuf::from("/broken")]);
    }

    #[test]
    fn test_reopen_read_only_round_trip() {
        let tmp = tempdir().unwrap();
        let location = tmp.path().join("hash");
        {
            let mut index = HashIndex::create(&location, HashAlgorithm::Xxh64, true).unwrap();
            index.add(Some(&Digest::from_bytes(vec![9; 8])), Path::new("/x")).unwrap();
            index.add(Some(&Digest::from_bytes(vec![9; 8])), Path::new("/y")).unwrap();
            index.add(None, Path::new("/e")).unwrap();
            index.finish().unwrap();
        }

        let mut index = HashIndex::open_read_only(&location).unwrap();
        assert!(index.meta().completed);
        assert_eq!(index.meta().algorithm, HashAlgorithm::Xxh64);
        assert_eq!(index.meta().hashed, 2);
        assert_eq!(index.meta().errors, 1);

        let groups: Vec<HashGroup> = index.groups().collect::<Result<_, _>>().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].paths, vec![PathBuf::from("/x"), PathBuf::from("/y")]);

        assert!(matches!(
            index.add(None, Path::new("/nope")),
            Err(Error::ReadOnlyIndex)
        ));
    }

    #[test]
    fn test_unfinished_index_is_readable() {
        let tmp = tempdir().unwrap();
        let location = tmp.path().join("hash");
        {
            let mut index = HashIndex::create(&location, HashAlgorithm::Blake3, false).unwrap();
            index.add(Some(&digest(7)), Path::new("/only")).unwrap();
        }

        let index = HashIndex::open_read_only(&location).unwrap();
        assert!(!index.meta().completed);
        assert_eq!(index.groups().count(), 1);
    }

    #[test]
    fn test_abandoned_build_recovered_from_log() {
        let tmp = tempdir().unwrap();
        let location = tmp.path().join("hash");
        let mut index = HashIndex::create(&location, HashAlgorithm::Blake3, false).unwrap();
        index.add(Some(&digest(3)), Path::new("/k/one")).unwrap();
        index.add(None, Path::new("/k/bad")).unwrap();
        index.add(Some(&digest(3)), Path::new("/k/two")).unwrap();
        index.add(Some(&digest(4)), Path::new("/k/three")).unwrap();
        // No flush, no close: only the write-ahead log holds the entries.
        std::mem::forget(index);

        let index = HashIndex::open_read_only(&location).unwrap();
        assert!(!index.meta().completed);
        let groups: Vec<HashGroup> = index.groups().collect::<Result<_, _>>().unwrap();
        assert_eq!(
            groups,
            vec![
                HashGroup {
                    digest: digest(3),
                    paths: vec![PathBuf::from("/k/one"), PathBuf::from("/k/two")],
                },
                HashGroup {
                    digest: digest(4),
                    paths: vec![PathBuf::from("/k/three")],
                },
            ]
        );
        let errors: Vec<PathBuf> = index.errors().collect::<Result<_, _>>().unwrap();
        assert_eq!(errors, vec![PathBuf::from("/k/bad")]);
    }

    #[test]
    fn test_create_refuses_existing_store() {
        let tmp = tempdir().unwrap();
        let location = tmp.path().join("hash");
        drop(HashIndex::create(&location, HashAlgorithm::Blake3, false).unwrap());
        assert!(HashIndex::create(&location, HashAlgorithm::Blake3, false).is_err());
    }

    #[test]
    fn test_open_missing_store() {
        let tmp = tempdir().unwrap();
        assert!(matches!(
            HashIndex::open_read_only(&tmp.path().join("absent")),
            Err(Error::SessionMissing(_))
        ));
    }

    #[test]
    fn test_empty_index_has_no_groups() {
        let tmp = tempdir().unwrap();
        let index =
            HashIndex::create(&tmp.path().join("hash"), HashAlgorithm::Blake3, false).unwrap();
        assert_eq!(index.groups().count(), 0);
        assert_eq!(index.errors().count(), 0);
    }
}
