//! The arithmetic half of the decoder: bit, tree and length decoding
//! over a buffered byte source, with member-position accounting.

use std::io::{self, Read};

use super::{
    BitModel, LenModel, BIT_MODEL_MOVE_BITS, BIT_MODEL_TOTAL, BIT_MODEL_TOTAL_BITS,
    LEN_LOW_SYMBOLS, LEN_MID_SYMBOLS, MIN_MATCH_LEN,
};
use crate::ioutil::read_full;

const RD_BUFFER_SIZE: usize = 16 * 1024;

/// Range decoder over a `Read` source.
///
/// Reads through a 16 KiB buffer. Once the source is exhausted,
/// `get_byte` returns 0xFF padding so a member truncated at the stream
/// marker runs into the trailer check instead of stalling mid-symbol.
pub struct RangeDecoder<R: Read> {
    source: R,
    buffer: Vec<u8>,
    pos: usize,
    stream_pos: usize,
    partial_member_pos: u64,
    code: u32,
    range: u32,
    at_stream_end: bool,
}

impl<R: Read> RangeDecoder<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            buffer: vec![0u8; RD_BUFFER_SIZE],
            pos: 0,
            stream_pos: 0,
            partial_member_pos: 0,
            code: 0,
            range: 0xFFFF_FFFF,
            at_stream_end: false,
        }
    }

    fn read_block(&mut self) -> io::Result<bool> {
        if !self.at_stream_end {
            let n = read_full(&mut self.source, &mut self.buffer)?;
            self.at_stream_end = n < self.buffer.len();
            self.partial_member_pos += self.pos as u64;
            self.pos = 0;
            self.stream_pos = n;
        }
        Ok(self.pos < self.stream_pos)
    }

    pub fn finished(&mut self) -> io::Result<bool> {
        if self.pos < self.stream_pos {
            return Ok(false);
        }
        Ok(!self.read_block()?)
    }

    /// Bytes consumed from the start of the member so far.
    pub fn member_position(&self) -> u64 {
        self.partial_member_pos + self.pos as u64
    }

    pub fn get_byte(&mut self) -> io::Result<u8> {
        if self.finished()? {
            return Ok(0xFF);
        }
        let b = self.buffer[self.pos];
        self.pos += 1;
        Ok(b)
    }

    /// Raw read used for the trailer; returns the bytes obtained.
    pub fn read_data(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let mut sz = 0;
        while sz < out.len() && !self.finished()? {
            let rd = (out.len() - sz).min(self.stream_pos - self.pos);
            out[sz..sz + rd].copy_from_slice(&self.buffer[self.pos..self.pos + rd]);
            self.pos += rd;
            sz += rd;
        }
        Ok(sz)
    }

    /// Prime `code` and `range`. The first byte of the LZMA stream is a
    /// pad byte and is discarded.
    pub fn load(&mut self) -> io::Result<()> {
        self.code = 0;
        self.range = 0xFFFF_FFFF;
        self.get_byte()?;
        for _ in 0..4 {
            self.code = (self.code << 8) | u32::from(self.get_byte()?);
        }
        Ok(())
    }

    pub fn normalize(&mut self) -> io::Result<()> {
        if self.range <= 0x00FF_FFFF {
            self.range <<= 8;
            self.code = (self.code << 8) | u32::from(self.get_byte()?);
        }
        Ok(())
    }

    /// Decode `num_bits` with fixed 1/2 probabilities.
    pub fn decode(&mut self, num_bits: usize) -> io::Result<u32> {
        let mut symbol = 0u32;
        for _ in 0..num_bits {
            self.normalize()?;
            self.range >>= 1;
            symbol <<= 1;
            if self.code >= self.range {
                self.code -= self.range;
                symbol |= 1;
            }
        }
        Ok(symbol)
    }

    pub fn decode_bit(&mut self, bm: &mut BitModel) -> io::Result<u32> {
        self.normalize()?;
        let bound = (self.range >> BIT_MODEL_TOTAL_BITS) * bm.probability;
        if self.code < bound {
            self.range = bound;
            bm.probability += (BIT_MODEL_TOTAL - bm.probability) >> BIT_MODEL_MOVE_BITS;
            Ok(0)
        } else {
            self.code -= bound;
            self.range -= bound;
            bm.probability -= bm.probability >> BIT_MODEL_MOVE_BITS;
            Ok(1)
        }
    }

    pub fn decode_tree(&mut self, bm: &mut [BitModel], num_bits: usize) -> io::Result<u32> {
        let mut symbol = 1u32;
        for _ in 0..num_bits {
            let bit = self.decode_bit(&mut bm[symbol as usize])?;
            symbol = (symbol << 1) | bit;
        }
        Ok(symbol - (1 << num_bits))
    }

    pub fn decode_tree_reversed(
        &mut self,
        bm: &mut [BitModel],
        num_bits: usize,
    ) -> io::Result<u32> {
        let mut model = 1u32;
        let mut symbol = 0u32;
        for i in 0..num_bits {
            let bit = self.decode_bit(&mut bm[model as usize])?;
            model = (model << 1) | bit;
            symbol |= bit << i;
        }
        Ok(symbol)
    }

    /// Decode a literal that follows a match, biased by the byte the
    /// match would have repeated.
    pub fn decode_matched(&mut self, bm: &mut [BitModel], match_byte: u8) -> io::Result<u8> {
        let mut symbol = 1u32;
        let mut match_byte = u32::from(match_byte);
        while symbol < 0x100 {
            match_byte <<= 1;
            let match_bit = match_byte & 0x100;
            let bit = self.decode_bit(&mut bm[(0x100 + symbol + match_bit) as usize])?;
            symbol = (symbol << 1) | bit;
            if (match_bit >> 8) != bit {
                while symbol < 0x100 {
                    let b = self.decode_bit(&mut bm[symbol as usize])?;
                    symbol = (symbol << 1) | b;
                }
                break;
            }
        }
        Ok((symbol & 0xFF) as u8)
    }

    pub fn decode_len(&mut self, lm: &mut LenModel, pos_state: usize) -> io::Result<u32> {
        if self.decode_bit(&mut lm.choice1)? == 0 {
            return Ok(self.decode_tree(&mut lm.bm_low[pos_state], 3)? + MIN_MATCH_LEN);
        }
        if self.decode_bit(&mut lm.choice2)? == 0 {
            return Ok(self.decode_tree(&mut lm.bm_mid[pos_state], 3)?
                + MIN_MATCH_LEN
                + LEN_LOW_SYMBOLS as u32);
        }
        Ok(self.decode_tree(&mut lm.bm_high, 8)?
            + MIN_MATCH_LEN
            + (LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS) as u32)
    }
}
