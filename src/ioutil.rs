//! Low-level file plumbing shared by the recovery engines.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use crate::error::RescueError;

/// Streaming buffer size used by every engine.
pub const BUFFER_SIZE: usize = 64 * 1024;

/// Read until `buf` is full or EOF is reached, retrying interrupted
/// reads. Returns the number of bytes read; a short count means EOF.
pub fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut sz = 0;
    while sz < buf.len() {
        match reader.read(&mut buf[sz..]) {
            Ok(0) => break,
            Ok(n) => sz += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(sz)
}

/// Copy up to `size` bytes from `reader` to `writer` through a 64 KiB
/// buffer, stopping early at EOF. Returns the number of bytes copied.
pub fn copy_bytes<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    size: u64,
) -> io::Result<u64> {
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut rest = size;
    let mut copied = 0u64;
    while rest > 0 {
        let want = rest.min(BUFFER_SIZE as u64) as usize;
        let rd = read_full(reader, &mut buffer[..want])?;
        if rd > 0 {
            writer.write_all(&buffer[..rd])?;
            copied += rd as u64;
            rest -= rd as u64;
        }
        if rd < want {
            break; // EOF
        }
    }
    Ok(copied)
}

/// Open an input file for reading; only regular files are accepted.
pub fn open_instream(path: &Path) -> Result<File, RescueError> {
    let file = File::open(path).map_err(|source| RescueError::OpenInput {
        path: path.to_path_buf(),
        source,
    })?;
    let meta = file.metadata().map_err(|source| RescueError::OpenInput {
        path: path.to_path_buf(),
        source,
    })?;
    if !meta.is_file() {
        return Err(RescueError::NotRegular {
            path: path.to_path_buf(),
        });
    }
    Ok(file)
}

/// Create the read-write output image. Without `force` an existing file
/// is an error rather than silently clobbered.
pub fn open_outstream(path: &Path, force: bool) -> Result<File, RescueError> {
    let mut opts = OpenOptions::new();
    opts.read(true).write(true);
    if force {
        opts.create(true).truncate(true);
    } else {
        opts.create_new(true);
    }
    opts.open(path).map_err(|source| {
        if source.kind() == io::ErrorKind::AlreadyExists {
            RescueError::OutputExists {
                path: path.to_path_buf(),
            }
        } else {
            RescueError::CreateOutput {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_full_reports_short_count_at_eof() {
        let mut src = Cursor::new(vec![7u8; 10]);
        let mut buf = [0u8; 16];
        assert_eq!(read_full(&mut src, &mut buf).unwrap(), 10);
        assert_eq!(&buf[..10], &[7u8; 10]);
    }

    #[test]
    fn copy_bytes_respects_the_size_bound() {
        let data: Vec<u8> = (0..200_000u32).map(|i| i as u8).collect();
        let mut src = Cursor::new(&data);
        let mut dst = Vec::new();
        assert_eq!(copy_bytes(&mut src, &mut dst, 70_000).unwrap(), 70_000);
        assert_eq!(dst, &data[..70_000]);
    }

    #[test]
    fn copy_bytes_stops_at_eof() {
        let data = vec![3u8; 1000];
        let mut src = Cursor::new(&data);
        let mut dst = Vec::new();
        assert_eq!(copy_bytes(&mut src, &mut dst, u64::MAX).unwrap(), 1000);
        assert_eq!(dst, data);
    }
}
