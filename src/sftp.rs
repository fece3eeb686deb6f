//! File-transfer session emulation.
//!
//! [`MockSftpClient`] works against the connected host's remote namespace
//! plus the environment's shared local namespace. Open-for-write handles
//! buffer privately and commit to the store on close (or drop), so a store
//! never observes a half-written file.

use crate::environ::{HostKey, MockEnviron};
use crate::error::FileError;
use crate::fs::{FileAttributes, FileRecord};
use std::io::{Cursor, Read, Write};
use tracing::debug;

/// Open mode for a remote file handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read from the start; the record must exist.
    Read,
    /// Truncate-and-write; creates the record if missing.
    Write,
    /// Write starting after the existing content; creates if missing.
    Append,
}

impl OpenMode {
    /// Parse a flag string (`r`, `rb`, `w`, `wb`, `a`, `ab`).
    pub fn from_flags(flags: &str) -> Result<Self, FileError> {
        match flags {
            "r" | "rb" => Ok(Self::Read),
            "w" | "wb" => Ok(Self::Write),
            "a" | "ab" => Ok(Self::Append),
            other => Err(FileError::InvalidMode {
                flags: other.to_string(),
            }),
        }
    }

    fn writes(self) -> bool {
        matches!(self, Self::Write | Self::Append)
    }
}

/// File-transfer session bound to one host's remote namespace.
///
/// ```
/// use sshmock::{FileRecord, MockEnviron, ResponseSet};
/// use std::io::Read;
///
/// let env = MockEnviron::new();
/// env.add_responses_for_host("h", 22, ResponseSet::new()).unwrap();
/// env.add_mock_file_for_host("h", 22, "/etc/hostname", FileRecord::from("h\n"))
///     .unwrap();
///
/// let mut client = env.client();
/// client.connect("h", 22).unwrap();
/// let sftp = client.open_sftp().unwrap();
/// let mut handle = sftp.open("/etc/hostname", "r").unwrap();
/// let mut content = String::new();
/// handle.read_to_string(&mut content).unwrap();
/// assert_eq!(content, "h\n");
/// ```
#[derive(Debug)]
pub struct MockSftpClient {
    env: MockEnviron,
    key: HostKey,
}

impl MockSftpClient {
    pub(crate) fn new(env: &MockEnviron, key: HostKey) -> Self {
        Self {
            env: env.clone(),
            key,
        }
    }

    /// Open a remote file handle with a flag string.
    pub fn open(&self, path: &str, flags: &str) -> Result<MockSftpFile, FileError> {
        self.open_with(path, OpenMode::from_flags(flags)?)
    }

    /// Open a remote file handle with an explicit mode.
    pub fn open_with(&self, path: &str, mode: OpenMode) -> Result<MockSftpFile, FileError> {
        debug!("sftp open {:?} {} on {}", mode, path, self.key);
        let existing = match self.env.remote_read(&self.key, path) {
            Ok(record) => Some(record),
            Err(FileError::NotFound { .. }) if mode.writes() => None,
            Err(err) => return Err(err),
        };
        Ok(MockSftpFile::new(
            self.env.clone(),
            self.key.clone(),
            path.to_string(),
            mode,
            existing,
        ))
    }

    /// Copy a remote record's content to the local namespace.
    pub fn get(&self, remote_path: &str, local_path: &str) -> Result<(), FileError> {
        self.env.transfer_get(&self.key, remote_path, local_path)
    }

    /// Copy a local record's content to the remote namespace.
    pub fn put(&self, local_path: &str, remote_path: &str) -> Result<(), FileError> {
        self.env.transfer_put(&self.key, local_path, remote_path)
    }

    /// Stat a remote record.
    pub fn stat(&self, path: &str) -> Result<FileAttributes, FileError> {
        Ok(self.env.remote_read(&self.key, path)?.attributes())
    }

    /// Sorted relative paths of remote records under `prefix`.
    pub fn list_dir(&self, prefix: &str) -> Result<Vec<String>, FileError> {
        self.env.remote_list(&self.key, prefix)
    }

    /// Create a remote directory.
    ///
    /// Directories have no stored representation; this succeeds as a no-op
    /// unless the host was registered with a mkdir failure.
    pub fn mkdir(&self, path: &str) -> Result<(), FileError> {
        if self.env.mkdir_allowed(&self.key)? {
            debug!("sftp mkdir {} on {}", path, self.key);
            Ok(())
        } else {
            Err(FileError::MkdirFailed {
                path: path.to_string(),
            })
        }
    }

    /// Remove a remote record.
    pub fn remove(&self, path: &str) -> Result<(), FileError> {
        self.env.remote_remove(&self.key, path)
    }

    /// End the transfer session. Open handles stay valid on their own.
    pub fn close(self) {}
}

/// One open remote file handle.
///
/// Read handles stream the record content captured at open time. Write and
/// append handles buffer locally and commit on [`MockSftpFile::close`]; a
/// dropped uncommitted write handle commits as a fallback.
#[derive(Debug)]
pub struct MockSftpFile {
    env: MockEnviron,
    key: HostKey,
    path: String,
    mode: OpenMode,
    reader: Cursor<Vec<u8>>,
    buffer: Vec<u8>,
    permissions: Option<u32>,
    committed: bool,
}

impl MockSftpFile {
    fn new(
        env: MockEnviron,
        key: HostKey,
        path: String,
        mode: OpenMode,
        existing: Option<FileRecord>,
    ) -> Self {
        let permissions = existing.as_ref().map(|record| record.permissions);
        let (reader, buffer) = match (mode, existing) {
            (OpenMode::Read, Some(record)) => (Cursor::new(record.content), Vec::new()),
            (OpenMode::Append, Some(record)) => (Cursor::new(Vec::new()), record.content),
            _ => (Cursor::new(Vec::new()), Vec::new()),
        };
        Self {
            env,
            key,
            path,
            mode,
            reader,
            buffer,
            permissions,
            committed: false,
        }
    }

    /// The path this handle is bound to.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn commit(&mut self) -> Result<(), FileError> {
        if self.committed || !self.mode.writes() {
            return Ok(());
        }
        let mut record = FileRecord::new(std::mem::take(&mut self.buffer));
        if let Some(permissions) = self.permissions {
            record = record.with_permissions(permissions);
        }
        self.committed = true;
        self.env.remote_commit(&self.key, &self.path, record)
    }

    /// Commit buffered writes (write/append modes) and release the handle.
    pub fn close(mut self) -> Result<(), FileError> {
        self.commit()
    }
}

impl Read for MockSftpFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.mode != OpenMode::Read {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                FileError::NotReadable {
                    path: self.path.clone(),
                }
                .to_string(),
            ));
        }
        self.reader.read(buf)
    }
}

impl Write for MockSftpFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if !self.mode.writes() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                FileError::NotWritable {
                    path: self.path.clone(),
                }
                .to_string(),
            ));
        }
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for MockSftpFile {
    fn drop(&mut self) {
        // Fallback for handles never explicitly closed; errors are dropped
        // because the environment may already be cleaned up.
        let _ = self.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ResponseSet;

    fn session() -> (MockEnviron, MockSftpClient) {
        let env = MockEnviron::new();
        env.add_responses_for_host("h", 22, ResponseSet::new()).unwrap();
        let mut client = env.client();
        client.connect("h", 22).unwrap();
        let sftp = client.open_sftp().unwrap();
        (env, sftp)
    }

    #[test]
    fn test_open_mode_parsing() {
        assert_eq!(OpenMode::from_flags("r").unwrap(), OpenMode::Read);
        assert_eq!(OpenMode::from_flags("rb").unwrap(), OpenMode::Read);
        assert_eq!(OpenMode::from_flags("wb").unwrap(), OpenMode::Write);
        assert_eq!(OpenMode::from_flags("ab").unwrap(), OpenMode::Append);
        assert!(matches!(
            OpenMode::from_flags("r+"),
            Err(FileError::InvalidMode { .. })
        ));
    }

    #[test]
    fn test_read_missing_file_fails_at_open() {
        let (_env, sftp) = session();
        assert!(matches!(
            sftp.open("/nope", "r"),
            Err(FileError::NotFound { .. })
        ));
    }

    #[test]
    fn test_write_then_read_back() {
        let (env, sftp) = session();
        let mut handle = sftp.open("/tmp/out.txt", "w").unwrap();
        handle.write_all(b"line one\n").unwrap();
        handle.write_all(b"line two\n").unwrap();
        handle.close().unwrap();

        let record = env.get_mock_file_for_host("h", 22, "/tmp/out.txt").unwrap();
        assert_eq!(record.content_text(), "line one\nline two\n");
    }

    #[test]
    fn test_write_not_visible_until_close() {
        let (env, sftp) = session();
        let mut handle = sftp.open("/tmp/pending", "w").unwrap();
        handle.write_all(b"half").unwrap();
        assert!(env.get_mock_file_for_host("h", 22, "/tmp/pending").is_err());
        handle.close().unwrap();
        assert!(env.get_mock_file_for_host("h", 22, "/tmp/pending").is_ok());
    }

    #[test]
    fn test_drop_commits_pending_write() {
        let (env, sftp) = session();
        {
            let mut handle = sftp.open("/tmp/dropped", "w").unwrap();
            handle.write_all(b"content").unwrap();
        }
        let record = env.get_mock_file_for_host("h", 22, "/tmp/dropped").unwrap();
        assert_eq!(record.content_text(), "content");
    }

    #[test]
    fn test_append_preserves_existing_content() {
        let (env, sftp) = session();
        env.add_mock_file_for_host("h", 22, "/var/log/app", FileRecord::from("old\n"))
            .unwrap();
        let mut handle = sftp.open("/var/log/app", "a").unwrap();
        handle.write_all(b"new\n").unwrap();
        handle.close().unwrap();
        let record = env.get_mock_file_for_host("h", 22, "/var/log/app").unwrap();
        assert_eq!(record.content_text(), "old\nnew\n");
    }

    #[test]
    fn test_write_truncates_existing_content() {
        let (env, sftp) = session();
        env.add_mock_file_for_host("h", 22, "/f", FileRecord::from("long old content"))
            .unwrap();
        let mut handle = sftp.open("/f", "w").unwrap();
        handle.write_all(b"new").unwrap();
        handle.close().unwrap();
        assert_eq!(
            env.get_mock_file_for_host("h", 22, "/f").unwrap().content_text(),
            "new"
        );
    }

    #[test]
    fn test_overwrite_preserves_permissions() {
        let (env, sftp) = session();
        env.add_mock_file_for_host(
            "h",
            22,
            "/bin/tool",
            FileRecord::from("#!/bin/sh\n").with_permissions(0o755),
        )
        .unwrap();
        let mut handle = sftp.open("/bin/tool", "w").unwrap();
        handle.write_all(b"#!/bin/sh\nexit 1\n").unwrap();
        handle.close().unwrap();
        let record = env.get_mock_file_for_host("h", 22, "/bin/tool").unwrap();
        assert_eq!(record.permissions, 0o755);
    }

    #[test]
    fn test_read_on_write_handle_rejected() {
        let (_env, sftp) = session();
        let mut handle = sftp.open("/tmp/w", "w").unwrap();
        let mut buf = [0u8; 4];
        assert!(handle.read(&mut buf).is_err());
    }

    #[test]
    fn test_write_on_read_handle_rejected() {
        let (env, sftp) = session();
        env.add_mock_file_for_host("h", 22, "/r", FileRecord::from("x"))
            .unwrap();
        let mut handle = sftp.open("/r", "r").unwrap();
        assert!(handle.write(b"y").is_err());
        drop(handle);
        // The read handle never commits.
        assert_eq!(
            env.get_mock_file_for_host("h", 22, "/r").unwrap().content_text(),
            "x"
        );
    }

    #[test]
    fn test_get_copies_remote_to_local() {
        let (env, sftp) = session();
        env.add_mock_file_for_host("h", 22, "/remote/data", FileRecord::from("payload"))
            .unwrap();
        sftp.get("/remote/data", "/local/data").unwrap();
        assert_eq!(env.get_local_file("/local/data").unwrap().content_text(), "payload");
    }

    #[test]
    fn test_put_copies_local_to_remote() {
        let (env, sftp) = session();
        env.add_local_file("/local/up", FileRecord::from("up"));
        sftp.put("/local/up", "/remote/up").unwrap();
        assert_eq!(
            env.get_mock_file_for_host("h", 22, "/remote/up").unwrap().content_text(),
            "up"
        );
    }

    #[test]
    fn test_get_missing_remote_fails() {
        let (_env, sftp) = session();
        assert!(matches!(
            sftp.get("/missing", "/local/x"),
            Err(FileError::NotFound { .. })
        ));
    }

    #[test]
    fn test_stat_and_list() {
        let (env, sftp) = session();
        env.add_mock_file_for_host("h", 22, "/data/a.bin", FileRecord::new(vec![0u8; 16]))
            .unwrap();
        env.add_mock_file_for_host("h", 22, "/data/b.bin", FileRecord::empty())
            .unwrap();

        assert_eq!(sftp.stat("/data/a.bin").unwrap().size, 16);
        assert_eq!(sftp.list_dir("/data").unwrap(), vec!["a.bin", "b.bin"]);
    }

    #[test]
    fn test_mkdir_failure_injection() {
        let env = MockEnviron::new();
        env.register(
            "h",
            22,
            crate::environ::HostSetup::new(ResponseSet::new()).with_mkdir_failure(),
        )
        .unwrap();
        let mut client = env.client();
        client.connect("h", 22).unwrap();
        let sftp = client.open_sftp().unwrap();
        assert!(matches!(
            sftp.mkdir("/new/dir"),
            Err(FileError::MkdirFailed { .. })
        ));
    }

    #[test]
    fn test_mkdir_default_noop() {
        let (_env, sftp) = session();
        sftp.mkdir("/anywhere").unwrap();
    }

    #[test]
    fn test_remove() {
        let (env, sftp) = session();
        env.add_mock_file_for_host("h", 22, "/gone", FileRecord::from("x"))
            .unwrap();
        sftp.remove("/gone").unwrap();
        assert!(matches!(
            sftp.remove("/gone"),
            Err(FileError::NotFound { .. })
        ));
    }
}
