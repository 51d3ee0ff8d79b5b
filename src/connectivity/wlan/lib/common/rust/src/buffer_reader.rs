// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    std::mem::size_of,
    zerocopy::{ByteSlice, FromBytes, LayoutVerified, Unaligned},
};

/// Sequential reader over a byte slice that hands out typed, zero-copy views of its prefix.
pub struct BufferReader<B> {
    buffer: Option<B>,
    bytes_read: usize,
}

impl<B: ByteSlice> BufferReader<B> {
    pub fn new(bytes: B) -> Self {
        Self { buffer: Some(bytes), bytes_read: 0 }
    }

    pub fn peek<T: FromBytes + Unaligned>(&self) -> Option<LayoutVerified<&[u8], T>> {
        let buffer = self.buffer.as_ref()?;
        LayoutVerified::new_unaligned_from_prefix(&buffer[..]).map(|(layout, _)| layout)
    }

    pub fn read<T: FromBytes + Unaligned>(&mut self) -> Option<LayoutVerified<B, T>> {
        let bytes = self.read_bytes(size_of::<T>())?;
        LayoutVerified::new_unaligned(bytes)
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        self.read_bytes(1).map(|bytes| bytes[0])
    }

    pub fn read_u16_le(&mut self) -> Option<u16> {
        self.read_bytes(2).map(|bytes| u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_bytes(&mut self, len: usize) -> Option<B> {
        let buffer = self.buffer.take()?;
        if buffer.len() < len {
            self.buffer = Some(buffer);
            return None;
        }
        let (head, tail) = buffer.split_at(len);
        self.buffer = Some(tail);
        self.bytes_read += len;
        Some(head)
    }

    /// Consumes the reader and returns everything that has not been read yet.
    pub fn into_remaining(self) -> Option<B> {
        self.buffer
    }

    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    pub fn bytes_remaining(&self) -> usize {
        self.buffer.as_ref().map(|b| b.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, zerocopy::AsBytes};

    #[derive(FromBytes, AsBytes, Unaligned, Debug, PartialEq)]
    #[repr(C, packed)]
    struct Pair {
        a: u8,
        b: u8,
    }

    #[test]
    fn peek_does_not_consume() {
        let reader = BufferReader::new(&[1u8, 2, 3][..]);
        let pair = reader.peek::<Pair>().expect("expected a pair");
        assert_eq!(pair.a, 1);
        assert_eq!(reader.bytes_read(), 0);
        assert_eq!(reader.bytes_remaining(), 3);
    }

    #[test]
    fn read_advances() {
        let mut reader = BufferReader::new(&[1u8, 2, 3, 4, 5][..]);
        let pair = reader.read::<Pair>().expect("expected a pair");
        assert_eq!((pair.a, pair.b), (1, 2));
        assert_eq!(reader.read_u16_le(), Some(0x0403));
        assert_eq!(reader.read_byte(), Some(5));
        assert_eq!(reader.read_byte(), None);
        assert_eq!(reader.bytes_read(), 5);
    }

    #[test]
    fn short_read_keeps_buffer() {
        let mut reader = BufferReader::new(&[7u8][..]);
        assert!(reader.read::<Pair>().is_none());
        assert_eq!(reader.bytes_remaining(), 1);
        assert_eq!(reader.into_remaining(), Some(&[7u8][..]));
    }
}
