//! lzip container framing: member header and trailer records.
//!
//! A member is `magic(4) + version(1) + dict-byte(1) + coded stream +
//! trailer(20)`. The trailer carries the CRC32 and length of the
//! uncompressed data plus the total member size, all little-endian.

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

use crate::error::RescueError;

pub const MAGIC: &[u8; 4] = b"LZIP";
pub const HEADER_SIZE: usize = 6;
pub const TRAILER_SIZE: usize = 20;
/// Smallest well-formed member: header, empty LZMA stream, trailer.
pub const MIN_MEMBER_SIZE: u64 = 36;

pub const MIN_DICTIONARY_SIZE: u32 = 1 << 12;
pub const MAX_DICTIONARY_SIZE: u32 = 1 << 29;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("bad magic number (file not in lzip format)")]
    BadMagic,
    #[error("version 0 member format can't be recovered")]
    Version0,
    #[error("version {0} member format not supported")]
    UnsupportedVersion(u8),
    #[error("member size in input file trailer is corrupt")]
    CorruptTrailer,
    #[error("input file has more than 1 member, split it first")]
    MultiMember,
    #[error("input file is too short")]
    TooShort,
}

/// Decode the dictionary-size byte: bits 4..0 hold the base-2 log of the
/// base size (12 to 29), bits 7..5 the number of sixteenths of the base
/// size to subtract from it.
pub fn decode_dict_size(encoded: u8) -> Option<u32> {
    let base_log2 = u32::from(encoded & 0x1F);
    let fraction = u32::from(encoded >> 5);
    if !(12..=29).contains(&base_log2) {
        return None;
    }
    let base = 1u32 << base_log2;
    let size = base - (base >> 4) * fraction;
    if (MIN_DICTIONARY_SIZE..=MAX_DICTIONARY_SIZE).contains(&size) {
        Some(size)
    } else {
        None
    }
}

/// The 6-byte record at the start of each member.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub data: [u8; HEADER_SIZE],
}

impl Header {
    pub fn from_bytes(data: [u8; HEADER_SIZE]) -> Self {
        Self { data }
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut data = [0u8; HEADER_SIZE];
        data.copy_from_slice(&bytes[..HEADER_SIZE]);
        Self { data }
    }

    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut data = [0u8; HEADER_SIZE];
        reader.read_exact(&mut data)?;
        Ok(Self { data })
    }

    pub fn verify_magic(&self) -> bool {
        &self.data[..4] == MAGIC
    }

    pub fn version(&self) -> u8 {
        self.data[4]
    }

    pub fn dictionary_size(&self) -> Option<u32> {
        decode_dict_size(self.data[5])
    }

    /// Magic and version gate for recovery operations. Version 0 members
    /// get their own diagnostic, distinct from other unsupported versions.
    pub fn verify(&self) -> Result<(), FormatError> {
        if !self.verify_magic() {
            return Err(FormatError::BadMagic);
        }
        match self.version() {
            1 => Ok(()),
            0 => Err(FormatError::Version0),
            v => Err(FormatError::UnsupportedVersion(v)),
        }
    }
}

/// The 20-byte record at the end of each member.
#[derive(Debug, Clone, Copy)]
pub struct Trailer {
    pub data: [u8; TRAILER_SIZE],
}

impl Trailer {
    pub fn from_bytes(data: [u8; TRAILER_SIZE]) -> Self {
        Self { data }
    }

    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut data = [0u8; TRAILER_SIZE];
        reader.read_exact(&mut data)?;
        Ok(Self { data })
    }

    /// CRC32 of the uncompressed data.
    pub fn data_crc(&self) -> u32 {
        LittleEndian::read_u32(&self.data[0..4])
    }

    /// Length of the uncompressed data.
    pub fn data_size(&self) -> u64 {
        LittleEndian::read_u64(&self.data[4..12])
    }

    /// Total member length: header plus coded stream plus trailer.
    pub fn member_size(&self) -> u64 {
        LittleEndian::read_u64(&self.data[12..20])
    }
}

/// Check that `file` holds exactly one member: a valid header up front
/// and a trailer whose member-size field equals the file size.
///
/// When the trailer claims a smaller member, a second header is probed
/// at `file_size - member_size` to tell a multimember file apart from a
/// corrupt trailer.
pub fn verify_single_member<F: Read + Seek>(
    file: &mut F,
    file_size: u64,
) -> Result<(), RescueError> {
    file.seek(SeekFrom::Start(0)).map_err(RescueError::Seek)?;
    let header = Header::read(file).map_err(RescueError::ReadInput)?;
    header.verify()?;

    file.seek(SeekFrom::End(-(TRAILER_SIZE as i64)))
        .map_err(RescueError::Seek)?;
    let trailer = Trailer::read(file).map_err(RescueError::ReadInput)?;
    let member_size = trailer.member_size();
    if member_size == file_size {
        return Ok(());
    }
    if member_size < file_size
        && file.seek(SeekFrom::Start(file_size - member_size)).is_ok()
    {
        if let Ok(second) = Header::read(file) {
            if second.verify().is_ok() {
                return Err(FormatError::MultiMember.into());
            }
        }
    }
    Err(FormatError::CorruptTrailer.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    // Build a fake member image: valid header, junk payload, trailer
    // whose member-size field is `claimed`.
    fn fake_member(len: usize, claimed: u64) -> Vec<u8> {
        let mut image = vec![0xA5u8; len];
        image[..4].copy_from_slice(MAGIC);
        image[4] = 1;
        image[5] = 0x10; // 64 KiB dictionary
        let t = len - 8;
        image[t..].copy_from_slice(&claimed.to_le_bytes());
        image
    }

    #[test]
    fn dict_size_decoding() {
        assert_eq!(decode_dict_size(0x0C), Some(4 * 1024));
        assert_eq!(decode_dict_size(0x1D), Some(512 * 1024 * 1024));
        // 2^19 minus 6 sixteenths: 320 KiB
        assert_eq!(decode_dict_size(0xD3), Some(320 * 1024));
        assert_eq!(decode_dict_size(0x0B), None);
        assert_eq!(decode_dict_size(0x1E), None);
    }

    #[test]
    fn header_verify_distinguishes_version_0() {
        let mut data = *b"LZIP\x01\x10";
        assert!(Header::from_bytes(data).verify().is_ok());
        data[4] = 0;
        assert_eq!(
            Header::from_bytes(data).verify(),
            Err(FormatError::Version0)
        );
        data[4] = 2;
        assert_eq!(
            Header::from_bytes(data).verify(),
            Err(FormatError::UnsupportedVersion(2))
        );
        let bad = Header::from_bytes(*b"LZIQ\x01\x10");
        assert_eq!(bad.verify(), Err(FormatError::BadMagic));
    }

    #[test]
    fn trailer_fields_are_little_endian() {
        let mut data = [0u8; TRAILER_SIZE];
        data[0..4].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        data[4..12].copy_from_slice(&1234u64.to_le_bytes());
        data[12..20].copy_from_slice(&999u64.to_le_bytes());
        let t = Trailer::from_bytes(data);
        assert_eq!(t.data_crc(), 0xDEAD_BEEF);
        assert_eq!(t.data_size(), 1234);
        assert_eq!(t.member_size(), 999);
    }

    #[test]
    fn single_member_accepts_matching_trailer() {
        let image = fake_member(100, 100);
        let mut cur = Cursor::new(image);
        assert!(verify_single_member(&mut cur, 100).is_ok());
    }

    #[test]
    fn corrupt_trailer_is_reported() {
        let image = fake_member(100, 90);
        let mut cur = Cursor::new(image);
        match verify_single_member(&mut cur, 100) {
            Err(RescueError::Format(FormatError::CorruptTrailer)) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn second_header_means_multimember() {
        let mut image = fake_member(50, 50);
        let second = fake_member(50, 50);
        image.extend_from_slice(&second);
        // trailer of the whole file claims only the second member
        let mut cur = Cursor::new(image);
        match verify_single_member(&mut cur, 100) {
            Err(RescueError::Format(FormatError::MultiMember)) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }
}
