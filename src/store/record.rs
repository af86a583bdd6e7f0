use std::io::{self, Read};

/// One entry of a segment.
///
/// ```text
/// checksum (8) | len (4) | kind (1) | key len (4) | key | value
/// ```
///
/// `len` counts everything after itself, the crc64 checksum covers the same
/// bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

const CHECKSUM_SIZE: usize = 8;
const LEN_SIZE: usize = 4;
pub const HEADER_SIZE: usize = CHECKSUM_SIZE + LEN_SIZE;
const BODY_HEADER_SIZE: usize = 1 + 4;

const KIND_PUT: u8 = 1;
const KIND_DELETE: u8 = 2;

#[derive(Debug)]
pub enum ReadOutcome {
    Record(Record, usize),
    /// Clean end of the segment.
    End,
    /// The segment stops in the middle of a record.
    Truncated,
    /// Bytes are present but do not form a valid record.
    Damaged(&'static str),
}

fn checksum(bytes: &[u8]) -> u64 {
    crc64::crc64(0, bytes)
}

impl Record {
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let (kind, key, value) = match self {
            Self::Put { key, value } => (KIND_PUT, key, value.as_slice()),
            Self::Delete { key } => (KIND_DELETE, key, &[][..]),
        };
        let body_len = BODY_HEADER_SIZE + key.len() + value.len();

        let mut buf = Vec::with_capacity(HEADER_SIZE + body_len);
        buf.extend_from_slice(&[0; CHECKSUM_SIZE]);
        buf.extend_from_slice(&(body_len as u32).to_le_bytes());
        buf.push(kind);
        buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
        buf.extend_from_slice(key);
        buf.extend_from_slice(value);

        let sum = checksum(&buf[CHECKSUM_SIZE..]);
        buf[..CHECKSUM_SIZE].clone_from_slice(&sum.to_le_bytes());
        buf
    }

    /// Reads the next record, returns it with its encoded size.
    pub fn read_from(mut reader: impl Read) -> io::Result<ReadOutcome> {
        let mut header = [0; HEADER_SIZE];
        match read_full(&mut reader, &mut header)? {
            0 => return Ok(ReadOutcome::End),
            n if n < HEADER_SIZE => return Ok(ReadOutcome::Truncated),
            _ => {}
        }
        let (sum, len) = header.split_at(CHECKSUM_SIZE);
        let sum = u64::from_le_bytes(sum.try_into().expect("cannot fail"));
        let len = u32::from_le_bytes(len.try_into().expect("cannot fail")) as usize;
        if len < BODY_HEADER_SIZE {
            return Ok(ReadOutcome::Damaged("record too short"));
        }

        let mut body = vec![0; LEN_SIZE + len];
        body[..LEN_SIZE].clone_from_slice(&header[CHECKSUM_SIZE..]);
        if read_full(&mut reader, &mut body[LEN_SIZE..])? < len {
            return Ok(ReadOutcome::Truncated);
        }
        if checksum(&body) != sum {
            return Ok(ReadOutcome::Damaged("checksum mismatch"));
        }

        match Self::decode_body(&body[LEN_SIZE..]) {
            Some(record) => Ok(ReadOutcome::Record(record, HEADER_SIZE + len)),
            None => Ok(ReadOutcome::Damaged("bad record body")),
        }
    }

    /// Decodes a record already read into `bytes`, verifying the checksum
    /// only when asked to.
    pub fn decode(bytes: &[u8], verify: bool) -> Option<Self> {
        if bytes.len() < HEADER_SIZE + BODY_HEADER_SIZE {
            return None;
        }
        let (sum, rest) = bytes.split_at(CHECKSUM_SIZE);
        if verify && checksum(rest) != u64::from_le_bytes(sum.try_into().ok()?) {
            return None;
        }
        Self::decode_body(&rest[LEN_SIZE..])
    }

    fn decode_body(body: &[u8]) -> Option<Self> {
        let (&kind, rest) = body.split_first()?;
        let (key_len, rest) = rest.split_first_chunk::<4>()?;
        let key_len = u32::from_le_bytes(*key_len) as usize;
        if key_len > rest.len() {
            return None;
        }
        let (key, value) = rest.split_at(key_len);
        match kind {
            KIND_PUT => Some(Self::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            }),
            KIND_DELETE if value.is_empty() => Some(Self::Delete { key: key.to_vec() }),
            _ => None,
        }
    }
}

fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
