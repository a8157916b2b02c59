//! Merge engine: rebuild a clean member from several damaged copies.
//!
//! Damaged regions are located by diffing the copies; every assignment
//! of regions to copies is then tried until one image decodes. With a
//! single merged region the true per-copy damage boundary inside it is
//! unknown, so the region is split into an adjacent pair whose boundary
//! is swept across the region between enumeration rounds.

use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::diff::{copy_and_diff, Block};
use crate::error::RescueError;
use crate::ioutil::{copy_bytes, open_instream, open_outstream};
use crate::member::{verify_single_member, FormatError, MIN_MEMBER_SIZE};
use crate::trial::try_decode;

/// Saturating integer power, capped at `i32::MAX`.
fn ipow(base: u64, exponent: u32) -> u64 {
    let mut result: u64 = 1;
    for _ in 0..exponent {
        result = result.saturating_mul(base);
        if result >= i32::MAX as u64 {
            return i32::MAX as u64;
        }
    }
    result
}

/// Correct errors in a file using several copies of it.
///
/// Returns `Ok(())` both after a successful merge and when one of the
/// copies already decodes cleanly (no output file is produced then).
pub fn merge_files(
    filenames: &[PathBuf],
    output_filename: &Path,
    force: bool,
    verbosity: i32,
) -> Result<(), RescueError> {
    let mut infiles = Vec::with_capacity(filenames.len());
    for name in filenames {
        infiles.push(open_instream(name)?);
    }

    let mut isize = 0u64;
    for (i, file) in infiles.iter_mut().enumerate() {
        let size = file
            .seek(SeekFrom::End(0))
            .map_err(|source| RescueError::NotSeekable {
                path: filenames[i].clone(),
                source,
            })?;
        if i == 0 {
            isize = size;
        } else if isize != size {
            return Err(RescueError::SizeMismatch);
        }
    }
    if isize < MIN_MEMBER_SIZE {
        return Err(FormatError::TooShort.into());
    }
    for file in infiles.iter_mut() {
        verify_single_member(file, isize)?;
    }
    for (i, file) in infiles.iter_mut().enumerate() {
        file.seek(SeekFrom::Start(0)).map_err(RescueError::Seek)?;
        if try_decode(file, isize).is_good() {
            if verbosity >= 1 {
                println!(
                    "File '{}' has no errors. Recovery is not needed.",
                    filenames[i].display()
                );
            }
            return Ok(());
        }
    }

    let mut out = open_outstream(output_filename, force)?;
    for file in infiles.iter_mut() {
        file.seek(SeekFrom::Start(0)).map_err(RescueError::Seek)?;
    }
    match run_merge(&mut infiles, &mut out, isize, verbosity) {
        Ok(()) => {
            if verbosity >= 1 {
                println!("Input files merged successfully.");
            }
            Ok(())
        }
        Err(e) => {
            // leave no half-written image behind
            drop(out);
            let _ = fs::remove_file(output_filename);
            Err(e)
        }
    }
}

fn run_merge(
    infiles: &mut [File],
    out: &mut File,
    isize: u64,
    verbosity: i32,
) -> Result<(), RescueError> {
    let mut blocks = copy_and_diff(infiles, out)?;

    if blocks.is_empty() {
        return Err(RescueError::IdenticalInputs);
    }
    let single_block = blocks.len() == 1;
    if single_block && blocks[0].size() < 2 {
        return Err(RescueError::SharedDamagedByte);
    }

    let n = infiles.len() as u64;
    if ipow(n, blocks.len() as u32) >= i32::MAX as u64
        || (single_block && ipow(n, 2) >= i32::MAX as u64 / blocks[0].size())
    {
        return Err(RescueError::TooDamaged);
    }

    let shifts = if single_block { blocks[0].size() - 1 } else { 1 };
    if single_block {
        // sweep the unknown damage boundary inside the lone block
        let tail = Block::new(blocks[0].pos() + 1, blocks[0].size() - 1);
        blocks[0].set_size(1);
        blocks.push(tail);
    }

    let base_variations = ipow(n, blocks.len() as u32);
    let variations = base_variations * shifts - 2;
    let mut done = false;
    for var in 1..=variations {
        if verbosity >= 1 {
            print!("Trying variation {var} of {variations} \r");
            let _ = io::stdout().flush();
        }
        let mut tmp = var;
        for block in &blocks {
            let infile = &mut infiles[(tmp % n) as usize];
            tmp /= n;
            infile
                .seek(SeekFrom::Start(block.pos()))
                .map_err(RescueError::Seek)?;
            out.seek(SeekFrom::Start(block.pos()))
                .map_err(RescueError::Seek)?;
            copy_bytes(infile, out, block.size()).map_err(RescueError::WriteOutput)?;
        }
        out.seek(SeekFrom::Start(0)).map_err(RescueError::Seek)?;
        if try_decode(out, isize).is_good() {
            done = true;
            break;
        }
        if var % base_variations == 0 {
            let (head, tail) = blocks.split_at_mut(1);
            head[0].shift(&mut tail[0]);
        }
    }
    if verbosity >= 1 {
        println!();
    }
    if done {
        Ok(())
    } else {
        Err(RescueError::OverlappingDamage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipow_small_powers() {
        assert_eq!(ipow(2, 0), 1);
        assert_eq!(ipow(2, 10), 1024);
        assert_eq!(ipow(3, 2), 9);
    }

    #[test]
    fn ipow_saturates_at_int_max() {
        assert_eq!(ipow(2, 31), i32::MAX as u64);
        assert_eq!(ipow(2, 200), i32::MAX as u64);
        assert_eq!(ipow(10, 30), i32::MAX as u64);
    }
}
