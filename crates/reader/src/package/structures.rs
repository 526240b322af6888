//! On-disk records of the ZIP container that packages archives.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use exn::ResultExt;
use std::io::{Cursor, Write};

use crate::error::{ErrorKind, Result};

const U16_SENTINEL: u16 = 0xFFFF;
const U32_SENTINEL: u32 = 0xFFFF_FFFF;
const ZIP64_EXTRA_ID: u16 = 0x0001;
/// Bit 11: member names are UTF-8.
const FLAG_UTF8: u16 = 1 << 11;
const VERSION_NEEDED: u16 = 20;
const VERSION_NEEDED_ZIP64: u16 = 45;

fn invalid(what: &str) -> ErrorKind {
    ErrorKind::InvalidArchive(format!("truncated or corrupt {what}"))
}

/// End of central directory record, without its trailing comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EndOfCentralDirectory {
    pub disk_entries: u16,
    pub total_entries: u16,
    pub directory_size: u32,
    pub directory_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            exn::bail!(invalid("end of central directory"));
        }
        Self::read_fields(&mut Cursor::new(&data[4..])).or_raise(|| invalid("end of central directory"))
    }

    fn read_fields(cursor: &mut Cursor<&[u8]>) -> std::io::Result<Self> {
        let _disk_number = cursor.read_u16::<LittleEndian>()?;
        let _disk_with_directory = cursor.read_u16::<LittleEndian>()?;
        Ok(Self {
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            directory_size: cursor.read_u32::<LittleEndian>()?,
            directory_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == U16_SENTINEL
            || self.total_entries == U16_SENTINEL
            || self.directory_size == U32_SENTINEL
            || self.directory_offset == U32_SENTINEL
    }

    pub fn write(&self, out: &mut impl Write) -> std::io::Result<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u16::<LittleEndian>(self.disk_entries)?;
        out.write_u16::<LittleEndian>(self.total_entries)?;
        out.write_u32::<LittleEndian>(self.directory_size)?;
        out.write_u32::<LittleEndian>(self.directory_offset)?;
        out.write_u16::<LittleEndian>(0)
    }
}

/// Points from the end of the file to the ZIP64 end of central directory.
pub(crate) struct Zip64Locator {
    pub record_offset: u64,
}

impl Zip64Locator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            exn::bail!(invalid("ZIP64 locator"));
        }
        let mut cursor = Cursor::new(&data[8..]);
        let record_offset = cursor.read_u64::<LittleEndian>().or_raise(|| invalid("ZIP64 locator"))?;
        Ok(Self { record_offset })
    }

    pub fn write(&self, out: &mut impl Write) -> std::io::Result<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_u64::<LittleEndian>(self.record_offset)?;
        out.write_u32::<LittleEndian>(1)
    }
}

/// ZIP64 end of central directory record.
pub(crate) struct Zip64EndOfCentralDirectory {
    pub total_entries: u64,
    pub directory_size: u64,
    pub directory_offset: u64,
}

impl Zip64EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            exn::bail!(invalid("ZIP64 end of central directory"));
        }
        // Skip record size, versions, disk numbers and the per-disk count.
        Self::read_fields(&mut Cursor::new(&data[24..])).or_raise(|| invalid("ZIP64 end of central directory"))
    }

    fn read_fields(cursor: &mut Cursor<&[u8]>) -> std::io::Result<Self> {
        let _disk_entries = cursor.read_u64::<LittleEndian>()?;
        Ok(Self {
            total_entries: cursor.read_u64::<LittleEndian>()?,
            directory_size: cursor.read_u64::<LittleEndian>()?,
            directory_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }

    pub fn write(&self, out: &mut impl Write) -> std::io::Result<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u64::<LittleEndian>((Self::SIZE - 12) as u64)?;
        out.write_u16::<LittleEndian>(VERSION_NEEDED_ZIP64)?;
        out.write_u16::<LittleEndian>(VERSION_NEEDED_ZIP64)?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_u64::<LittleEndian>(self.total_entries)?;
        out.write_u64::<LittleEndian>(self.total_entries)?;
        out.write_u64::<LittleEndian>(self.directory_size)?;
        out.write_u64::<LittleEndian>(self.directory_offset)
    }
}

pub(crate) const CENTRAL_HEADER_SIGNATURE: &[u8] = b"PK\x01\x02";
pub(crate) const LOCAL_HEADER_SIGNATURE: &[u8] = b"PK\x03\x04";
pub(crate) const LOCAL_HEADER_SIZE: usize = 30;

/// One member of the container, as recorded in the central directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Member {
    pub name: String,
    pub method: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub size: u64,
    pub header_offset: u64,
}

impl Member {
    /// Parse one central directory file header, leaving the cursor after it.
    pub fn read_central(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        Self::try_read_central(cursor).or_raise(|| invalid("central directory file header"))
    }

    fn try_read_central(cursor: &mut Cursor<&[u8]>) -> std::io::Result<Self> {
        let mut signature = [0u8; 4];
        std::io::Read::read_exact(cursor, &mut signature)?;
        if signature != CENTRAL_HEADER_SIGNATURE {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "bad signature"));
        }
        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let _flags = cursor.read_u16::<LittleEndian>()?;
        let method = cursor.read_u16::<LittleEndian>()?;
        let _modified_time = cursor.read_u16::<LittleEndian>()?;
        let _modified_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let mut compressed_size = u64::from(cursor.read_u32::<LittleEndian>()?);
        let mut size = u64::from(cursor.read_u32::<LittleEndian>()?);
        let name_len = cursor.read_u16::<LittleEndian>()?;
        let extra_len = cursor.read_u16::<LittleEndian>()?;
        let comment_len = cursor.read_u16::<LittleEndian>()?;
        let _disk_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attributes = cursor.read_u16::<LittleEndian>()?;
        let _external_attributes = cursor.read_u32::<LittleEndian>()?;
        let mut header_offset = u64::from(cursor.read_u32::<LittleEndian>()?);

        let mut name = vec![0u8; usize::from(name_len)];
        std::io::Read::read_exact(cursor, &mut name)?;
        let name = String::from_utf8_lossy(&name).into_owned();

        // ZIP64 extra fields only carry the values whose 32-bit slot is saturated.
        let extra_end = cursor.position() + u64::from(extra_len);
        while cursor.position() + 4 <= extra_end {
            let id = cursor.read_u16::<LittleEndian>()?;
            let field_len = u64::from(cursor.read_u16::<LittleEndian>()?);
            let field_end = cursor.position() + field_len;
            if id == ZIP64_EXTRA_ID {
                if size == u64::from(U32_SENTINEL) && cursor.position() + 8 <= field_end {
                    size = cursor.read_u64::<LittleEndian>()?;
                }
                if compressed_size == u64::from(U32_SENTINEL) && cursor.position() + 8 <= field_end {
                    compressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if header_offset == u64::from(U32_SENTINEL) && cursor.position() + 8 <= field_end {
                    header_offset = cursor.read_u64::<LittleEndian>()?;
                }
            }
            cursor.set_position(field_end);
        }
        cursor.set_position(extra_end + u64::from(comment_len));

        Ok(Self { name, method, crc32, compressed_size, size, header_offset })
    }

    fn needs_zip64(&self) -> bool {
        self.size >= u64::from(U32_SENTINEL)
            || self.compressed_size >= u64::from(U32_SENTINEL)
            || self.header_offset >= u64::from(U32_SENTINEL)
    }

    fn saturate(value: u64) -> u32 {
        u32::try_from(value).ok().filter(|v| *v != U32_SENTINEL).unwrap_or(U32_SENTINEL)
    }

    fn zip64_extra(&self, include_offset: bool) -> Vec<u8> {
        let mut body = Vec::new();
        if self.size >= u64::from(U32_SENTINEL) {
            body.extend_from_slice(&self.size.to_le_bytes());
        }
        if self.compressed_size >= u64::from(U32_SENTINEL) {
            body.extend_from_slice(&self.compressed_size.to_le_bytes());
        }
        if include_offset && self.header_offset >= u64::from(U32_SENTINEL) {
            body.extend_from_slice(&self.header_offset.to_le_bytes());
        }
        if body.is_empty() {
            return body;
        }
        let mut extra = Vec::with_capacity(body.len() + 4);
        extra.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
        extra.extend_from_slice(&(body.len() as u16).to_le_bytes());
        extra.extend_from_slice(&body);
        extra
    }

    fn version_needed(&self) -> u16 {
        match self.needs_zip64() {
            true => VERSION_NEEDED_ZIP64,
            false => VERSION_NEEDED,
        }
    }

    /// Write the local file header that precedes the member's data.
    pub fn write_local(&self, out: &mut impl Write) -> std::io::Result<()> {
        let extra = self.zip64_extra(false);
        out.write_all(LOCAL_HEADER_SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.version_needed())?;
        out.write_u16::<LittleEndian>(FLAG_UTF8)?;
        out.write_u16::<LittleEndian>(self.method)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(Self::saturate(self.compressed_size))?;
        out.write_u32::<LittleEndian>(Self::saturate(self.size))?;
        out.write_u16::<LittleEndian>(self.name.len() as u16)?;
        out.write_u16::<LittleEndian>(extra.len() as u16)?;
        out.write_all(self.name.as_bytes())?;
        out.write_all(&extra)
    }

    /// Write the member's central directory file header.
    pub fn write_central(&self, out: &mut impl Write) -> std::io::Result<()> {
        let extra = self.zip64_extra(true);
        out.write_all(CENTRAL_HEADER_SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.version_needed())?;
        out.write_u16::<LittleEndian>(self.version_needed())?;
        out.write_u16::<LittleEndian>(FLAG_UTF8)?;
        out.write_u16::<LittleEndian>(self.method)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(Self::saturate(self.compressed_size))?;
        out.write_u32::<LittleEndian>(Self::saturate(self.size))?;
        out.write_u16::<LittleEndian>(self.name.len() as u16)?;
        out.write_u16::<LittleEndian>(extra.len() as u16)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(Self::saturate(self.header_offset))?;
        out.write_all(self.name.as_bytes())?;
        out.write_all(&extra)
    }
}

/// Length of the variable part of a local file header, read from its fixed part.
pub(crate) fn local_header_tail(header: &[u8]) -> Result<u64> {
    if header.len() < LOCAL_HEADER_SIZE || &header[0..4] != LOCAL_HEADER_SIGNATURE {
        exn::bail!(invalid("local file header"));
    }
    let name_len = u16::from_le_bytes([header[26], header[27]]);
    let extra_len = u16::from_le_bytes([header[28], header[29]]);
    Ok(u64::from(name_len) + u64::from(extra_len))
}
