//! [IFF](https://en.wikipedia.org/wiki/Interchange_File_Format) chunks, enough for Quetzal
use std::fmt;

use crate::{error::*, fatal_error};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Body {
    Data(Vec<u8>),
    Form { sub_id: [u8; 4], chunks: Vec<Chunk> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    id: [u8; 4],
    body: Body,
}

/// Four character id, space padded or truncated
fn four_cc(id: &str) -> [u8; 4] {
    let mut cc = *b"    ";
    for (i, b) in id.bytes().take(4).enumerate() {
        cc[i] = b;
    }
    cc
}

fn four_cc_string(cc: &[u8; 4]) -> String {
    cc.iter().map(|b| *b as char).collect()
}

/// Unsigned big-endian value of `bytes`
pub fn read_be(bytes: &[u8]) -> usize {
    bytes.iter().fold(0, |v, b| (v << 8) | *b as usize)
}

/// `value` as `length` big-endian bytes, high bytes dropped
pub fn write_be(value: usize, length: usize) -> Vec<u8> {
    (0..length)
        .rev()
        .map(|i| (value >> (8 * i)) as u8)
        .collect()
}

impl Chunk {
    pub fn new_chunk(id: &str, data: Vec<u8>) -> Chunk {
        Chunk {
            id: four_cc(id),
            body: Body::Data(data),
        }
    }

    pub fn new_form(sub_id: &str, chunks: Vec<Chunk>) -> Chunk {
        Chunk {
            id: *b"FORM",
            body: Body::Form {
                sub_id: four_cc(sub_id),
                chunks,
            },
        }
    }

    pub fn id(&self) -> String {
        four_cc_string(&self.id)
    }

    /// Sub id of a FORM, empty for anything else
    pub fn sub_id(&self) -> String {
        match &self.body {
            Body::Form { sub_id, .. } => four_cc_string(sub_id),
            Body::Data(_) => String::new(),
        }
    }

    /// Length as written in the chunk header, which excludes the header and any pad byte
    pub fn length(&self) -> u32 {
        match &self.body {
            Body::Data(data) => data.len() as u32,
            Body::Form { chunks, .. } => chunks.iter().fold(4, |l, c| {
                let n = c.length();
                l + 8 + n + (n & 1)
            }),
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        match &self.body {
            Body::Form { chunks, .. } => chunks,
            Body::Data(_) => &[],
        }
    }

    pub fn data(&self) -> &[u8] {
        match &self.body {
            Body::Data(data) => data,
            Body::Form { .. } => &[],
        }
    }

    /// First immediate child with id `id`
    pub fn find_chunk(&self, id: &str) -> Option<&Chunk> {
        let id = four_cc(id);
        self.chunks().iter().find(|c| c.id == id)
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.id);
        out.extend(write_be(self.length() as usize, 4));
        match &self.body {
            Body::Data(data) => out.extend_from_slice(data),
            Body::Form { sub_id, chunks } => {
                out.extend_from_slice(sub_id);
                for c in chunks {
                    c.write(out);
                }
            }
        }
        if out.len() % 2 == 1 {
            out.push(0);
        }
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            Body::Form { chunks, .. } => write!(
                f,
                "FORM/{}: {} bytes, {} chunks",
                self.sub_id(),
                self.length(),
                chunks.len()
            ),
            Body::Data(data) => write!(f, "{}: {} bytes", self.id(), data.len()),
        }
    }
}

impl From<&Chunk> for Vec<u8> {
    fn from(value: &Chunk) -> Self {
        let mut out = Vec::new();
        value.write(&mut out);
        out
    }
}

impl TryFrom<&[u8]> for Chunk {
    type Error = RuntimeError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() < 8 {
            return fatal_error!(
                ErrorCode::IFF,
                "Chunk header needs 8 bytes, found {}",
                value.len()
            );
        }

        let mut id = [0; 4];
        id.copy_from_slice(&value[0..4]);
        let length = read_be(&value[4..8]);
        let Some(body) = value.get(8..8 + length) else {
            return fatal_error!(
                ErrorCode::IFF,
                "Chunk '{}' claims {} bytes, only {} available",
                four_cc_string(&id),
                length,
                value.len() - 8
            );
        };

        if &id != b"FORM" {
            return Ok(Chunk {
                id,
                body: Body::Data(body.to_vec()),
            });
        }

        if body.len() < 4 {
            return fatal_error!(ErrorCode::IFF, "FORM is too short for a sub id");
        }
        let mut sub_id = [0; 4];
        sub_id.copy_from_slice(&body[0..4]);

        let mut chunks = Vec::new();
        let mut rest = &body[4..];
        while rest.len() >= 8 {
            let chunk = Chunk::try_from(rest)?;
            let n = chunk.length() as usize;
            rest = rest.get(8 + n + (n & 1)..).unwrap_or_default();
            chunks.push(chunk);
        }

        Ok(Chunk {
            id,
            body: Body::Form { sub_id, chunks },
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{assert_ok, assert_some};

    use super::*;

    #[test]
    fn test_four_cc() {
        assert_eq!(&four_cc("ABCD"), b"ABCD");
        assert_eq!(&four_cc("A"), b"A   ");
        assert_eq!(&four_cc("ABCDE"), b"ABCD");
    }

    #[test]
    fn test_read_be() {
        assert_eq!(read_be(&[0x12, 0x34, 0x56]), 0x123456);
        assert_eq!(read_be(&[0xFF]), 0xFF);
        assert_eq!(read_be(&[]), 0);
    }

    #[test]
    fn test_write_be() {
        assert_eq!(write_be(0x123456, 3), &[0x12, 0x34, 0x56]);
        assert_eq!(write_be(0x12, 4), &[0, 0, 0, 0x12]);
        assert_eq!(write_be(0x123456, 2), &[0x34, 0x56]);
    }

    #[test]
    fn test_new_form_pads_odd_chunks() {
        let c1 = Chunk::new_chunk("Test", vec![1, 2, 3]);
        let c2 = Chunk::new_chunk("Foo", vec![4, 3, 2, 1]);
        let chunk = Chunk::new_form("FTst", vec![c1, c2]);
        assert_eq!(chunk.id(), "FORM");
        assert_eq!(chunk.sub_id(), "FTst");
        // 4 (sub id) + 8 + 3 + 1 (pad) + 8 + 4
        assert_eq!(chunk.length(), 28);
        assert_eq!(Vec::from(&chunk).len(), 36);
        assert!(chunk.data().is_empty());
    }

    #[test]
    fn test_round_trip() {
        let c1 = Chunk::new_chunk("Test", vec![1, 2, 3]);
        let c2 = Chunk::new_chunk("Foo", vec![4, 3, 2, 1]);
        let form = Chunk::new_form("FTst", vec![c1.clone(), c2.clone()]);
        let bytes = Vec::from(&form);
        assert_eq!(&bytes[0..12], b"FORM\x00\x00\x00\x1cFTst");
        let parsed = assert_ok!(Chunk::try_from(bytes.as_slice()));
        assert_eq!(parsed, form);
        assert_eq!(assert_some!(parsed.find_chunk("Foo")), &c2);
        assert_eq!(assert_some!(parsed.find_chunk("Test")), &c1);
        assert!(parsed.find_chunk("None").is_none());
        assert_eq!(format!("{}", parsed), "FORM/FTst: 28 bytes, 2 chunks");
    }

    #[test]
    fn test_try_from_truncated() {
        assert!(Chunk::try_from(&b"FORM"[..]).is_err());
        assert!(Chunk::try_from(&b"Test\x00\x00\x00\x10abcd"[..]).is_err());
        assert!(Chunk::try_from(&b"FORM\x00\x00\x00\x02ab"[..]).is_err());
        // Inner chunk claims more data than the form holds
        let e = Chunk::try_from(&b"FORM\x00\x00\x00\x10IFZSTest\x00\x00\x00\x10abcd"[..])
            .unwrap_err();
        assert_eq!(e.code(), ErrorCode::IFF);
    }
}
