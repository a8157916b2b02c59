//! Trial-decode oracle over a candidate member image.

use std::io::{self, Read};
use std::process;

use crate::lzma::{LzDecoder, MemberStatus, RangeDecoder};
use crate::member::{Header, HEADER_SIZE};

/// Verdict of one trial decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trial {
    /// The first `expected_size` bytes form one clean version-1 member.
    Good,
    /// Decoding failed. `failure_pos` is the offset at which the decoder
    /// stopped consuming input, when decoding got far enough to say.
    Bad { failure_pos: Option<u64> },
}

impl Trial {
    pub fn is_good(self) -> bool {
        matches!(self, Trial::Good)
    }
}

/// Run one trial decode of `source`, which must be positioned at the
/// start of the candidate member.
///
/// A fresh decoder pair is built per call, so repeated trials never
/// observe stale buffered state. The source itself is only read, never
/// written; I/O errors during a trial fail that trial.
pub fn try_decode<R: Read>(source: &mut R, expected_size: u64) -> Trial {
    match run_trial(source, expected_size) {
        Ok(verdict) => verdict,
        Err(_) => Trial::Bad { failure_pos: None },
    }
}

fn run_trial<R: Read>(source: &mut R, expected_size: u64) -> io::Result<Trial> {
    let mut rdec = RangeDecoder::new(source);
    let mut data = [0u8; HEADER_SIZE];
    for b in &mut data {
        *b = rdec.get_byte()?;
    }
    let header = Header::from_bytes(data);
    if rdec.finished()? || !header.verify_magic() || header.version() != 1 {
        return Ok(Trial::Bad { failure_pos: None });
    }
    let dict_size = match header.dictionary_size() {
        Some(size) => size,
        None => return Ok(Trial::Bad { failure_pos: None }),
    };
    let mut decoder = match LzDecoder::new(dict_size) {
        Ok(decoder) => decoder,
        Err(_) => {
            // Allocation failure is terminal, not a failed trial.
            eprintln!("lzrescue: not enough memory for the decoder dictionary");
            process::exit(1);
        }
    };
    let status = decoder.decode_member(&mut rdec)?;
    if status == MemberStatus::Done && rdec.member_position() == expected_size {
        return Ok(Trial::Good);
    }
    Ok(Trial::Bad {
        failure_pos: Some(rdec.member_position()),
    })
}
