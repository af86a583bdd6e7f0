use std::{fs, io, path::Path};

use super::error::Error;

pub const BLOCK_LEN: usize = 16;

pub fn padded_len(len: usize) -> usize {
    len.div_ceil(BLOCK_LEN) * BLOCK_LEN
}

/// Concatenates `parts` into a fresh buffer zero-filled up to the next
/// multiple of the cipher block.
pub fn zero_pad(parts: &[&[u8]]) -> Result<Vec<u8>, Error> {
    let len = parts.iter().map(|p| p.len()).sum::<usize>();
    let mut buf = Vec::new();
    buf.try_reserve_exact(padded_len(len))
        .map_err(|_| Error::AllocateMem)?;
    for part in parts {
        buf.extend_from_slice(part);
    }
    buf.resize(padded_len(len), 0);
    Ok(buf)
}

pub fn open_segment(path: impl AsRef<Path>, create: bool) -> io::Result<fs::File> {
    let mut open_options = fs::OpenOptions::new();
    open_options.read(true).append(true);
    if create {
        open_options.create_new(true);
    }
    open_options.open(path)
}

#[cfg(unix)]
pub fn read_at(file: &fs::File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;

    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
pub fn read_at(file: &fs::File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

// Makes file creation and removal inside `dir` durable.
#[cfg(unix)]
pub fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

// On Windows directories cannot be opened for syncing.
#[cfg(windows)]
pub fn sync_dir(dir: &Path) -> io::Result<()> {
    let _ = dir;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{padded_len, zero_pad};

    #[test]
    fn pads_to_block() {
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(1), 16);
        assert_eq!(padded_len(16), 16);
        assert_eq!(padded_len(17), 32);

        let buf = zero_pad(&[&b"abc"[..], &[0]]).unwrap();
        assert_eq!(buf.len(), 16);
        assert_eq!(&buf[..3], b"abc");
        assert!(buf[3..].iter().all(|b| *b == 0));

        let buf = zero_pad(&[&[7u8; 32][..]]).unwrap();
        assert_eq!(buf, vec![7; 32]);
    }
}
