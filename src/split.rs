//! Split a multimember file into one file per member.
//!
//! Streaming one-pass scan over a rolling window. A member boundary is
//! only accepted when the four magic bytes are preceded by an 8-byte
//! little-endian integer equal to the exact byte distance accumulated
//! since the previous boundary; coded data that happens to contain the
//! magic string fails that second check, so false splits are improbable.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};

use crate::error::RescueError;
use crate::ioutil::{open_instream, open_outstream, read_full, BUFFER_SIZE};
use crate::member::{FormatError, Header, HEADER_SIZE, MAGIC, TRAILER_SIZE};

/// Advance the numeric part of a `recNNNNN` prefix. Returns false when
/// the five digits are exhausted.
fn next_prefix(prefix: &mut [u8; 8]) -> bool {
    for i in (3..=7).rev() {
        if prefix[i] < b'9' {
            prefix[i] += 1;
            return true;
        }
        prefix[i] = b'0';
    }
    false
}

fn output_name(prefix: &[u8; 8], suffix: &str) -> PathBuf {
    let mut name = String::from_utf8_lossy(prefix).into_owned();
    name.push_str(suffix);
    PathBuf::from(name)
}

/// Split `input_filename` into sequentially named single-member files
/// `rec00001<suffix>`, `rec00002<suffix>`, ...
pub fn split_file(
    input_filename: &Path,
    suffix: &str,
    force: bool,
    verbosity: i32,
) -> Result<(), RescueError> {
    // the window keeps one trailer before and one header after the live
    // 64 KiB region, so a boundary near a window edge stays decidable
    let mut base = vec![0u8; TRAILER_SIZE + BUFFER_SIZE + HEADER_SIZE];

    let mut infile = open_instream(input_filename)?;
    let rd = read_full(&mut infile, &mut base[TRAILER_SIZE..]).map_err(RescueError::ReadInput)?;
    let first_size = rd as i64 - HEADER_SIZE as i64;
    if first_size <= TRAILER_SIZE as i64 {
        return Err(FormatError::TooShort.into());
    }
    let mut size = first_size as usize;
    let mut at_stream_end = size < BUFFER_SIZE;

    Header::from_slice(&base[TRAILER_SIZE..TRAILER_SIZE + HEADER_SIZE]).verify()?;

    let mut prefix = *b"rec00001";
    let mut members = 1u64;
    let mut out = open_outstream(&output_name(&prefix, suffix), force)?;

    let mut partial_member_size: u64 = 0;
    loop {
        let mut pos: usize = 0;
        for newpos in 1..=size {
            if &base[TRAILER_SIZE + newpos..TRAILER_SIZE + newpos + 4] == MAGIC {
                let member_size =
                    LittleEndian::read_u64(&base[TRAILER_SIZE + newpos - 8..TRAILER_SIZE + newpos]);
                if partial_member_size + (newpos - pos) as u64 == member_size {
                    // boundary confirmed
                    write_region(&mut out, &base[TRAILER_SIZE + pos..TRAILER_SIZE + newpos])?;
                    if !next_prefix(&mut prefix) {
                        return Err(RescueError::TooManyMembers);
                    }
                    out = open_outstream(&output_name(&prefix, suffix), force)?;
                    members += 1;
                    partial_member_size = 0;
                    pos = newpos;
                }
            }
        }

        if at_stream_end {
            write_region(&mut out, &base[TRAILER_SIZE + pos..TRAILER_SIZE + size + HEADER_SIZE])?;
            break;
        }
        if pos < BUFFER_SIZE {
            partial_member_size += (BUFFER_SIZE - pos) as u64;
            write_region(&mut out, &base[TRAILER_SIZE + pos..TRAILER_SIZE + BUFFER_SIZE])?;
        }
        // slide the trailing trailer-plus-header bytes to the front
        base.copy_within(BUFFER_SIZE..BUFFER_SIZE + TRAILER_SIZE + HEADER_SIZE, 0);
        let rd = read_full(
            &mut infile,
            &mut base[TRAILER_SIZE + HEADER_SIZE..TRAILER_SIZE + HEADER_SIZE + BUFFER_SIZE],
        )
        .map_err(RescueError::ReadInput)?;
        size = rd;
        at_stream_end = size < BUFFER_SIZE;
    }

    if verbosity >= 1 {
        println!("Input file split into {members} member file(s).");
    }
    Ok(())
}

fn write_region(out: &mut File, region: &[u8]) -> Result<(), RescueError> {
    out.write_all(region).map_err(RescueError::WriteOutput)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_carry_propagates() {
        let mut p = *b"rec00001";
        assert!(next_prefix(&mut p));
        assert_eq!(&p, b"rec00002");

        let mut p = *b"rec00009";
        assert!(next_prefix(&mut p));
        assert_eq!(&p, b"rec00010");

        let mut p = *b"rec09999";
        assert!(next_prefix(&mut p));
        assert_eq!(&p, b"rec10000");
    }

    #[test]
    fn prefix_overflow_is_detected() {
        let mut p = *b"rec99999";
        assert!(!next_prefix(&mut p));
    }

    #[test]
    fn output_name_appends_suffix() {
        let p = *b"rec00001";
        assert_eq!(output_name(&p, "archive.lz"), PathBuf::from("rec00001archive.lz"));
    }
}
