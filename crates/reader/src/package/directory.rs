//! Locating and parsing the central directory of a packaged archive.
//!
//! ZIP containers are read from the end: find the end of central directory
//! record (searching backwards past any trailing comment), follow it to the
//! ZIP64 record when the 32-bit fields are saturated, then parse every
//! central directory header in one read.

use exn::ResultExt;
use std::io::{Cursor, Read, Seek, SeekFrom};

use super::structures::{
    EndOfCentralDirectory, LOCAL_HEADER_SIZE, Member, Zip64EndOfCentralDirectory, Zip64Locator, local_header_tail,
};
use crate::error::{ErrorKind, Result};

/// Maximum length of the trailing archive comment.
const MAX_COMMENT_SIZE: u64 = 0xFFFF;

fn read_at<R: Read + Seek>(source: &mut R, offset: u64, buf: &mut [u8]) -> Result<()> {
    source.seek(SeekFrom::Start(offset)).map_err(ErrorKind::from)?;
    source.read_exact(buf).or_raise(|| {
        ErrorKind::InvalidArchive(format!("unexpected end of file reading {} bytes at offset {offset}", buf.len()))
    })
}

fn find_end_record<R: Read + Seek>(source: &mut R, len: u64) -> Result<(EndOfCentralDirectory, u64)> {
    let record_size = EndOfCentralDirectory::SIZE as u64;
    if len < record_size {
        exn::bail!(ErrorKind::InvalidArchive("file too small to be an archive".to_string()));
    }

    // Common case: no trailing comment.
    let offset = len - record_size;
    let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
    read_at(source, offset, &mut buf)?;
    if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && buf[20..22] == [0, 0] {
        return Ok((EndOfCentralDirectory::from_bytes(&buf)?, offset));
    }

    let search_size = (MAX_COMMENT_SIZE + record_size).min(len);
    let search_start = len - search_size;
    let mut buf = vec![0u8; search_size as usize];
    read_at(source, search_start, &mut buf)?;
    for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
        if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
            continue;
        }
        let comment_len = usize::from(u16::from_le_bytes([buf[i + 20], buf[i + 21]]));
        if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
            let record = EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
            return Ok((record, search_start + i as u64));
        }
    }
    exn::bail!(ErrorKind::InvalidArchive("no end of central directory record".to_string()))
}

fn read_zip64_record<R: Read + Seek>(source: &mut R, end_offset: u64) -> Result<Zip64EndOfCentralDirectory> {
    let locator_offset = end_offset
        .checked_sub(Zip64Locator::SIZE as u64)
        .ok_or_else(|| exn::Exn::from(ErrorKind::InvalidArchive("missing ZIP64 locator".to_string())))?;
    let mut buf = vec![0u8; Zip64Locator::SIZE];
    read_at(source, locator_offset, &mut buf)?;
    let locator = Zip64Locator::from_bytes(&buf)?;

    let mut buf = vec![0u8; Zip64EndOfCentralDirectory::SIZE];
    read_at(source, locator.record_offset, &mut buf)?;
    Zip64EndOfCentralDirectory::from_bytes(&buf)
}

/// Read every member recorded in the central directory.
pub(crate) fn read_members<R: Read + Seek>(source: &mut R) -> Result<Vec<Member>> {
    let len = source.seek(SeekFrom::End(0)).map_err(ErrorKind::from)?;
    let (record, end_offset) = find_end_record(source, len)?;
    let (offset, size, total) = match record.is_zip64() {
        true => {
            let zip64 = read_zip64_record(source, end_offset)?;
            (zip64.directory_offset, zip64.directory_size, zip64.total_entries)
        },
        false => (
            u64::from(record.directory_offset),
            u64::from(record.directory_size),
            u64::from(record.total_entries),
        ),
    };
    if offset.saturating_add(size) > end_offset {
        exn::bail!(ErrorKind::InvalidArchive("central directory extends past its end record".to_string()));
    }

    let mut directory = vec![0u8; size as usize];
    read_at(source, offset, &mut directory)?;
    let mut cursor = Cursor::new(directory.as_slice());
    // Each header is at least 46 bytes; don't trust the count to size the allocation.
    let mut members = Vec::with_capacity(usize::try_from(total).unwrap_or(0).min(directory.len() / 46));
    for _ in 0..total {
        members.push(Member::read_central(&mut cursor)?);
    }
    tracing::trace!(members = members.len(), "read central directory");
    Ok(members)
}

/// Offset of the first byte of a member's (possibly compressed) data.
pub(crate) fn data_offset<R: Read + Seek>(source: &mut R, member: &Member) -> Result<u64> {
    let mut header = [0u8; LOCAL_HEADER_SIZE];
    read_at(source, member.header_offset, &mut header)?;
    let tail = local_header_tail(&header)?;
    Ok(member.header_offset + LOCAL_HEADER_SIZE as u64 + tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(members: &[Member], comment: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut placed = Vec::new();
        for member in members {
            let member = Member { header_offset: bytes.len() as u64, ..member.clone() };
            member.write_local(&mut bytes).unwrap();
            bytes.extend(std::iter::repeat_n(0xAB, member.compressed_size as usize));
            placed.push(member);
        }
        let directory_offset = bytes.len();
        for member in &placed {
            member.write_central(&mut bytes).unwrap();
        }
        let record = EndOfCentralDirectory {
            disk_entries: placed.len() as u16,
            total_entries: placed.len() as u16,
            directory_size: (bytes.len() - directory_offset) as u32,
            directory_offset: directory_offset as u32,
            comment_len: comment.len() as u16,
        };
        record.write(&mut bytes).unwrap();
        // Patch the comment length written as zero.
        let at = bytes.len() - 2;
        bytes[at..].copy_from_slice(&(comment.len() as u16).to_le_bytes());
        bytes.extend_from_slice(comment);
        bytes
    }

    fn member(name: &str, size: u64) -> Member {
        Member { name: name.to_string(), method: 0, crc32: 0, compressed_size: size, size, header_offset: 0 }
    }

    #[test]
    fn reads_members_and_data_offsets() {
        let bytes = container(&[member("C/home", 5), member("M/Title", 3)], b"");
        let mut source = Cursor::new(bytes);
        let members = read_members(&mut source).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].name, "C/home");
        assert_eq!(members[1].name, "M/Title");
        assert_eq!(data_offset(&mut source, &members[0]).unwrap(), (LOCAL_HEADER_SIZE + 6) as u64);
    }

    #[test]
    fn finds_end_record_behind_a_comment() {
        let bytes = container(&[member("C/home", 5)], b"packaged by a test");
        let members = read_members(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(members.len(), 1);
    }

    #[test]
    fn rejects_files_that_are_not_archives() {
        let err = read_members(&mut Cursor::new(b"definitely not an archive, just some text".to_vec())).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidArchive(_)));
        let err = read_members(&mut Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidArchive(_)));
    }

    #[test]
    fn rejects_truncated_directory() {
        let mut bytes = container(&[member("C/home", 5)], b"");
        // Corrupt the central directory header signature.
        let directory_start = LOCAL_HEADER_SIZE + 6 + 5;
        bytes[directory_start] = b'X';
        let err = read_members(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidArchive(_)));
    }
}
