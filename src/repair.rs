//! Repair engine: search for a one-byte corruption in a single member.
//!
//! Range-coded streams propagate damage forward, so the corrupt byte
//! always lies at or before the position where decoding stalled. The
//! search walks backward from there, trying all 255 replacement values
//! at each position, and is bounded to the 1000 bytes before the stall.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::RescueError;
use crate::ioutil::{copy_bytes, open_instream, open_outstream};
use crate::member::{verify_single_member, FormatError, HEADER_SIZE, MIN_MEMBER_SIZE};
use crate::trial::{try_decode, Trial};

/// Try to repair a small error in `input_filename`, writing the repaired
/// copy to `output_filename`.
///
/// Returns `Ok(())` both after a successful repair and when the input
/// already decodes cleanly (no output file is produced then).
pub fn repair_file(
    input_filename: &Path,
    output_filename: &Path,
    force: bool,
    verbosity: i32,
) -> Result<(), RescueError> {
    let mut infile = open_instream(input_filename)?;
    let isize = infile
        .seek(SeekFrom::End(0))
        .map_err(|source| RescueError::NotSeekable {
            path: input_filename.to_path_buf(),
            source,
        })?;
    if isize < MIN_MEMBER_SIZE {
        return Err(FormatError::TooShort.into());
    }
    verify_single_member(&mut infile, isize)?;

    infile.seek(SeekFrom::Start(0)).map_err(RescueError::Seek)?;
    let failure_pos = match try_decode(&mut infile, isize) {
        Trial::Good => {
            if verbosity >= 1 {
                println!("Input file has no errors. Recovery is not needed.");
            }
            return Ok(());
        }
        Trial::Bad { failure_pos } => failure_pos.unwrap_or(0),
    };
    // the last 8 bytes are the trailer's member-size field; the coded
    // stream cannot stall past them
    let failure_pos = failure_pos.min(isize - 9);
    if failure_pos < HEADER_SIZE as u64 {
        return Err(RescueError::Unrepairable);
    }

    let mut out = open_outstream(output_filename, force)?;
    match run_repair(&mut infile, &mut out, isize, failure_pos, verbosity) {
        Ok(()) => {
            if verbosity >= 1 {
                println!("Copy of input file repaired successfully.");
            }
            Ok(())
        }
        Err(e) => {
            drop(out);
            let _ = fs::remove_file(output_filename);
            Err(e)
        }
    }
}

fn run_repair(
    infile: &mut File,
    out: &mut File,
    isize: u64,
    failure_pos: u64,
    verbosity: i32,
) -> Result<(), RescueError> {
    infile.seek(SeekFrom::Start(0)).map_err(RescueError::Seek)?;
    copy_bytes(infile, out, u64::MAX).map_err(RescueError::WriteOutput)?;

    let min_pos = (HEADER_SIZE as u64).max(failure_pos.saturating_sub(1000));
    let mut pos = failure_pos;
    while pos >= min_pos {
        if verbosity >= 1 {
            print!("Trying position {pos} \r");
            let _ = io::stdout().flush();
        }
        let mut byte = [0u8; 1];
        out.seek(SeekFrom::Start(pos)).map_err(RescueError::Seek)?;
        out.read_exact(&mut byte).map_err(RescueError::ReadOutput)?;
        for _ in 0..255 {
            byte[0] = byte[0].wrapping_add(1);
            out.seek(SeekFrom::Start(pos)).map_err(RescueError::Seek)?;
            out.write_all(&byte).map_err(RescueError::WriteOutput)?;
            out.seek(SeekFrom::Start(0)).map_err(RescueError::Seek)?;
            if try_decode(out, isize).is_good() {
                // the winning byte stays in place
                if verbosity >= 1 {
                    println!();
                }
                return Ok(());
            }
        }
        // the 256th increment restores the original value
        byte[0] = byte[0].wrapping_add(1);
        out.seek(SeekFrom::Start(pos)).map_err(RescueError::Seek)?;
        out.write_all(&byte).map_err(RescueError::WriteOutput)?;
        pos -= 1;
    }
    if verbosity >= 1 {
        println!();
    }
    Err(RescueError::DamageTooLarge)
}
