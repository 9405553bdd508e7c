//! Minimal RLP encoding, enough to build signed typed transactions.

use bytes::{BufMut, Bytes};
use ethereum_types::{Address, H256, U256};

pub const RLP_NULL: u8 = 0x80;
pub const RLP_EMPTY_LIST: u8 = 0xc0;

pub trait RLPEncode {
    fn encode(&self, buf: &mut dyn BufMut);

    fn length(&self) -> usize {
        self.encode_to_vec().len()
    }

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }
}

fn encode_length(len: usize, offset: u8, buf: &mut dyn BufMut) {
    if len < 56 {
        buf.put_u8(offset + len as u8);
    } else {
        let be = len.to_be_bytes();
        let start = be.iter().position(|b| *b != 0).unwrap_or(be.len());
        let len_bytes = &be[start..];
        buf.put_u8(offset + 55 + len_bytes.len() as u8);
        buf.put_slice(len_bytes);
    }
}

impl RLPEncode for [u8] {
    fn encode(&self, buf: &mut dyn BufMut) {
        match self {
            [single] if *single < RLP_NULL => buf.put_u8(*single),
            _ => {
                encode_length(self.len(), RLP_NULL, buf);
                buf.put_slice(self);
            }
        }
    }
}

impl RLPEncode for Bytes {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_ref().encode(buf)
    }
}

impl RLPEncode for str {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }
}

impl RLPEncode for bool {
    fn encode(&self, buf: &mut dyn BufMut) {
        if *self {
            buf.put_u8(0x01);
        } else {
            buf.put_u8(RLP_NULL);
        }
    }
}

impl RLPEncode for u64 {
    fn encode(&self, buf: &mut dyn BufMut) {
        let be = self.to_be_bytes();
        let start = be.iter().position(|b| *b != 0).unwrap_or(be.len());
        be[start..].encode(buf)
    }
}

impl RLPEncode for U256 {
    fn encode(&self, buf: &mut dyn BufMut) {
        let be = self.to_big_endian();
        let start = be.iter().position(|b| *b != 0).unwrap_or(be.len());
        be[start..].encode(buf)
    }
}

impl RLPEncode for Address {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }
}

impl RLPEncode for H256 {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }
}

impl<T: RLPEncode> RLPEncode for Vec<T> {
    fn encode(&self, buf: &mut dyn BufMut) {
        let mut payload = Vec::new();
        for item in self {
            item.encode(&mut payload);
        }
        encode_length(payload.len(), RLP_EMPTY_LIST, buf);
        buf.put_slice(&payload);
    }
}

/// Encodes a list field by field.
pub struct Encoder<'a> {
    buf: &'a mut dyn BufMut,
    temp_buf: Vec<u8>,
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut dyn BufMut) -> Self {
        Self {
            buf,
            temp_buf: Vec::new(),
        }
    }

    pub fn encode_field<T: RLPEncode + ?Sized>(mut self, value: &T) -> Self {
        value.encode(&mut self.temp_buf);
        self
    }

    /// Appends an already encoded item.
    pub fn encode_raw(mut self, encoded: &[u8]) -> Self {
        self.temp_buf.extend_from_slice(encoded);
        self
    }

    pub fn finish(self) {
        encode_length(self.temp_buf.len(), RLP_EMPTY_LIST, self.buf);
        self.buf.put_slice(&self.temp_buf);
    }
}
