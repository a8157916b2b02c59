//! The LZ half of the decoder: dictionary replay and trailer check.
//!
//! `decode_member` consumes one complete member through a
//! [`RangeDecoder`] and reports how it ended. It never prints; the
//! engines decide what a failed trial means.

use std::collections::TryReserveError;
use std::io::{self, Read};

use super::{
    get_len_state, get_lit_state, BitModel, LenModel, RangeDecoder, State, DIS_ALIGN_BITS,
    DIS_ALIGN_SIZE, DIS_SLOT_BITS, END_DIS_MODEL, LEN_STATES, LITERAL_STATES, MIN_MATCH_LEN,
    MODELED_DISTANCES, POS_STATES, POS_STATE_MASK, START_DIS_MODEL, STATES,
};
use crate::member::{Trailer, TRAILER_SIZE};

/// How a member decode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    /// Clean End-Of-Stream marker and a trailer that matches the data.
    Done,
    /// A match referenced data outside the produced stream.
    DataError,
    /// The coded stream ran out before any End-Of-Stream marker.
    UnexpectedEof,
    /// CRC, data size or member size in the trailer disagree.
    TrailerMismatch,
    /// A marker with an unknown length code was found.
    UnsupportedMarker,
}

/// LZ decoder over a circular dictionary buffer.
pub struct LzDecoder {
    buffer: Vec<u8>,
    dictionary_size: usize,
    pos: usize,
    stream_pos: usize,
    partial_data_pos: u64,
    crc: crc32fast::Hasher,
    pos_wrapped: bool,
}

impl LzDecoder {
    /// Fails only when the dictionary buffer cannot be allocated.
    pub fn new(dictionary_size: u32) -> Result<Self, TryReserveError> {
        let dictionary_size = dictionary_size as usize;
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(dictionary_size)?;
        buffer.resize(dictionary_size, 0);
        Ok(Self {
            buffer,
            dictionary_size,
            pos: 0,
            stream_pos: 0,
            partial_data_pos: 0,
            crc: crc32fast::Hasher::new(),
            pos_wrapped: false,
        })
    }

    /// Bytes of uncompressed data produced so far.
    pub fn data_position(&self) -> u64 {
        self.partial_data_pos + self.pos as u64
    }

    fn crc(&self) -> u32 {
        self.crc.clone().finalize()
    }

    fn flush_data(&mut self) {
        if self.pos > self.stream_pos {
            self.crc.update(&self.buffer[self.stream_pos..self.pos]);
            if self.pos >= self.dictionary_size {
                self.partial_data_pos += self.pos as u64;
                self.pos = 0;
                self.pos_wrapped = true;
            }
            self.stream_pos = self.pos;
        }
    }

    fn peek_prev(&self) -> u8 {
        let i = if self.pos > 0 { self.pos } else { self.dictionary_size };
        self.buffer[i - 1]
    }

    fn peek(&self, distance: u32) -> u8 {
        let distance = distance as usize;
        let base = if self.pos > distance { 0 } else { self.dictionary_size };
        self.buffer[base + self.pos - distance - 1]
    }

    fn put_byte(&mut self, b: u8) {
        self.buffer[self.pos] = b;
        self.pos += 1;
        if self.pos >= self.dictionary_size {
            self.flush_data();
        }
    }

    fn copy_block(&mut self, distance: u32, len: u32) {
        let distance = distance as usize;
        let len = len as usize;
        let mut lpos = self.pos;
        let mut i;
        let fast;
        let fast2;
        if lpos > distance {
            i = lpos - distance - 1;
            fast = len < self.dictionary_size - lpos;
            fast2 = fast && len <= lpos - i;
        } else {
            i = self.dictionary_size + lpos - distance - 1; // (i == pos) may happen
            fast = len < self.dictionary_size - i;
            fast2 = fast && len <= i - lpos;
        }
        if fast {
            self.pos += len;
            if fast2 {
                self.buffer.copy_within(i..i + len, lpos);
            } else {
                for _ in 0..len {
                    self.buffer[lpos] = self.buffer[i];
                    lpos += 1;
                    i += 1;
                }
            }
        } else {
            for _ in 0..len {
                self.buffer[self.pos] = self.buffer[i];
                self.pos += 1;
                if self.pos >= self.dictionary_size {
                    self.flush_data();
                }
                i += 1;
                if i >= self.dictionary_size {
                    i = 0;
                }
            }
        }
    }

    fn check_trailer<R: Read>(&mut self, rdec: &mut RangeDecoder<R>) -> io::Result<MemberStatus> {
        let mut data = [0u8; TRAILER_SIZE];
        let sz = rdec.read_data(&mut data)?;
        if sz < TRAILER_SIZE {
            return Ok(MemberStatus::TrailerMismatch);
        }
        let trailer = Trailer::from_bytes(data);
        if trailer.data_crc() != self.crc()
            || trailer.data_size() != self.data_position()
            || trailer.member_size() != rdec.member_position()
        {
            return Ok(MemberStatus::TrailerMismatch);
        }
        Ok(MemberStatus::Done)
    }

    /// Decode one member whose 6 header bytes have already been consumed
    /// from `rdec`. The probability models are rebuilt here, so a fresh
    /// decoder pair per member is all the reset that is ever needed.
    pub fn decode_member<R: Read>(
        &mut self,
        rdec: &mut RangeDecoder<R>,
    ) -> io::Result<MemberStatus> {
        let mut bm_literal = [[BitModel::INIT; 0x300]; LITERAL_STATES];
        let mut bm_match = [[BitModel::INIT; POS_STATES]; STATES];
        let mut bm_rep = [BitModel::INIT; STATES];
        let mut bm_rep0 = [BitModel::INIT; STATES];
        let mut bm_rep1 = [BitModel::INIT; STATES];
        let mut bm_rep2 = [BitModel::INIT; STATES];
        let mut bm_len = [[BitModel::INIT; POS_STATES]; STATES];
        let mut bm_dis_slot = [[BitModel::INIT; 1 << DIS_SLOT_BITS]; LEN_STATES];
        let mut bm_dis = [BitModel::INIT; MODELED_DISTANCES - END_DIS_MODEL as usize + 1];
        let mut bm_align = [BitModel::INIT; DIS_ALIGN_SIZE];
        let mut match_len_model = LenModel::new();
        let mut rep_len_model = LenModel::new();
        // rep0..rep3 hold the latest four match distances
        let mut rep0: u32 = 0;
        let mut rep1: u32 = 0;
        let mut rep2: u32 = 0;
        let mut rep3: u32 = 0;
        let mut state = State::default();

        rdec.load()?;
        while !rdec.finished()? {
            let pos_state = (self.data_position() & POS_STATE_MASK) as usize;
            if rdec.decode_bit(&mut bm_match[state.get()][pos_state])? == 0 {
                // literal byte
                let models = &mut bm_literal[get_lit_state(self.peek_prev())];
                if state.is_char() {
                    let b = rdec.decode_tree(models, 8)? as u8;
                    self.put_byte(b);
                } else {
                    let b = rdec.decode_matched(models, self.peek(rep0))?;
                    self.put_byte(b);
                }
                state.set_char();
                continue;
            }
            // match or repeated match
            let len;
            if rdec.decode_bit(&mut bm_rep[state.get()])? != 0 {
                if rdec.decode_bit(&mut bm_rep0[state.get()])? == 0 {
                    if rdec.decode_bit(&mut bm_len[state.get()][pos_state])? == 0 {
                        state.set_short_rep();
                        let b = self.peek(rep0);
                        self.put_byte(b);
                        continue;
                    }
                } else {
                    let distance;
                    if rdec.decode_bit(&mut bm_rep1[state.get()])? == 0 {
                        distance = rep1;
                    } else {
                        if rdec.decode_bit(&mut bm_rep2[state.get()])? == 0 {
                            distance = rep2;
                        } else {
                            distance = rep3;
                            rep3 = rep2;
                        }
                        rep2 = rep1;
                    }
                    rep1 = rep0;
                    rep0 = distance;
                }
                state.set_rep();
                len = rdec.decode_len(&mut rep_len_model, pos_state)?;
            } else {
                len = rdec.decode_len(&mut match_len_model, pos_state)?;
                let mut distance =
                    rdec.decode_tree(&mut bm_dis_slot[get_len_state(len)], DIS_SLOT_BITS)?;
                if distance >= START_DIS_MODEL {
                    let dis_slot = distance;
                    let direct_bits = (dis_slot >> 1) as usize - 1;
                    distance = (2 | (dis_slot & 1)) << direct_bits;
                    if dis_slot < END_DIS_MODEL {
                        let off = (distance - dis_slot) as usize;
                        distance +=
                            rdec.decode_tree_reversed(&mut bm_dis[off..], direct_bits)?;
                    } else {
                        distance +=
                            rdec.decode(direct_bits - DIS_ALIGN_BITS)? << DIS_ALIGN_BITS;
                        distance += rdec.decode_tree_reversed(&mut bm_align, DIS_ALIGN_BITS)?;
                        if distance == 0xFFFF_FFFF {
                            // marker found
                            rdec.normalize()?;
                            self.flush_data();
                            if len == MIN_MATCH_LEN {
                                // End Of Stream
                                return self.check_trailer(rdec);
                            }
                            if len == MIN_MATCH_LEN + 1 {
                                // Sync Flush
                                rdec.load()?;
                                continue;
                            }
                            return Ok(MemberStatus::UnsupportedMarker);
                        }
                    }
                }
                rep3 = rep2;
                rep2 = rep1;
                rep1 = rep0;
                rep0 = distance;
                state.set_match();
                if rep0 as usize >= self.dictionary_size
                    || (rep0 as usize >= self.pos && !self.pos_wrapped)
                {
                    self.flush_data();
                    return Ok(MemberStatus::DataError);
                }
            }
            self.copy_block(rep0, len);
        }
        self.flush_data();
        Ok(MemberStatus::UnexpectedEof)
    }
}
