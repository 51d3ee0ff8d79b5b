// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    super::{Header, Id, IeType},
    crate::buffer_reader::BufferReader,
    std::{convert::TryInto, mem::size_of, ops::Range},
    zerocopy::ByteSlice,
};

/// Iterates over a chain of elements, yielding `(Id, body)`. Iteration ends at the first element
/// whose declared length runs past the end of the buffer.
pub struct Reader<B>(BufferReader<B>);

impl<B: ByteSlice> Reader<B> {
    pub fn new(bytes: B) -> Self {
        Reader(BufferReader::new(bytes))
    }

    /// Bytes left once the iterator stops. Non-zero means the chain ended in a truncated element.
    pub fn bytes_remaining(&self) -> usize {
        self.0.bytes_remaining()
    }
}

impl<B: ByteSlice> Iterator for Reader<B> {
    type Item = (Id, B);

    fn next(&mut self) -> Option<Self::Item> {
        let body_len = self.0.peek::<Header>()?.body_len as usize;
        if self.0.bytes_remaining() < size_of::<Header>() + body_len {
            return None;
        }
        let header = self.0.read::<Header>()?;
        let id = header.id;
        let body = self.0.read_bytes(body_len)?;
        Some((id, body))
    }
}

/// An iterator that takes in a chain of IEs and produces a summary for each IE:
/// - The IeType
/// - The range of the rest of the IE:
///   - If the IeType is basic, this range is the IE body
///   - If the IeType is vendor, this range is the IE body without the first six bytes that
///     identify the particular vendor IE
///   - If the IeType is extended, this range is the IE body without the extension ID
pub struct IeSummaryIter<B>(BufferReader<B>);

impl<B: ByteSlice> IeSummaryIter<B> {
    pub fn new(bytes: B) -> Self {
        Self(BufferReader::new(bytes))
    }

    pub fn bytes_remaining(&self) -> usize {
        self.0.bytes_remaining()
    }
}

impl<B: ByteSlice> Iterator for IeSummaryIter<B> {
    type Item = (IeType, Range<usize>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let body_len = self.0.peek::<Header>()?.body_len as usize;
            if self.0.bytes_remaining() < size_of::<Header>() + body_len {
                return None;
            }

            let id = self.0.read::<Header>()?.id;
            let start_idx = self.0.bytes_read();
            let body = self.0.read_bytes(body_len)?;
            let ie_type = match id {
                Id::VENDOR_SPECIFIC => match body.get(0..6) {
                    Some(prefix) => prefix.try_into().ok().map(IeType::new_vendor),
                    None => None,
                },
                Id::EXTENSION => body.first().map(|ext_id| IeType::new_extended(*ext_id)),
                _ => Some(IeType::new_basic(id)),
            };
            // Elements too short to carry their own identification are skipped.
            if let Some(ie_type) = ie_type {
                return Some((ie_type, start_idx + ie_type.extra_len()..start_idx + body_len));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty() {
        assert_eq!(None, Reader::new(&[][..]).next());
    }

    #[test]
    fn less_than_header() {
        assert_eq!(None, Reader::new(&[0][..]).next());
    }

    #[test]
    fn body_too_short() {
        let mut reader = Reader::new(&[0, 2, 10][..]);
        assert_eq!(None, reader.next());
        assert_eq!(reader.bytes_remaining(), 3);
    }

    #[test]
    fn two_elements() {
        let bytes = vec![0, 2, 10, 20, 1, 3, 11, 22, 33];
        let elems: Vec<_> = Reader::new(&bytes[..]).collect();
        assert_eq!(
            &[(Id::SSID, &[10, 20][..]), (Id::SUPPORTED_RATES, &[11, 22, 33][..])],
            &elems[..]
        );
    }

    #[test]
    fn ie_summary_iter_skips_unidentifiable_elements() {
        let bytes = vec![
            0, 2, 10, 20, // SSID
            221, 3, 0x00, 0x50, 0xf2, // vendor element without a full prefix
            221, 7, 0x00, 0x50, 0xf2, 0x01, 0x01, 0x00, 0xaa, // WPA1
            255, 0, // extension element without an extension ID
            255, 2, 107, 1, // multi-link
            3, 2, 1, // truncated
        ];
        let elems: Vec<_> = IeSummaryIter::new(&bytes[..]).collect();
        assert_eq!(
            &elems[..],
            &[
                (IeType::new_basic(Id::SSID), 2..4),
                (IeType::new_vendor([0x00, 0x50, 0xf2, 0x01, 0x01, 0x00]), 17..18),
                (IeType::new_extended(107), 23..24),
            ]
        );
    }
}
