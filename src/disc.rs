use std::io::{self, Cursor, Read, Seek, SeekFrom};

use binrw::BinReaderExt;

use crate::{
    structs::{DiscHeader, PartitionInfoEntry, WiiPartTableEntry},
    wbfs::WbfsReader,
    Result, WbfsError, DISC_HEADER_COPY_SIZE, PARTITION_INFO_OFFSET, TITLE_ID_OFFSET,
    TITLE_KEY_OFFSET,
};

/// 4 groups of at most 8 partitions exist in practice, a count far above
/// that means the image is broken and would lead to absurd allocations.
const MAX_PARTITIONS_PER_GROUP: u32 = 0x40;

/// What a read does when it hits a wbfs sector that has no backing data.
///
/// Images legitimately contain holes for unused disc regions, but reads of
/// partition data should never land in one, so failing loudly is the
/// default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoleMode {
    /// fail the read with [`WbfsError::SparseHole`]
    #[default]
    Fail,
    /// pretend the missing sector is filled with zeros
    ZeroFill,
}

/// One Wii disc inside a WBFS file, readable as if it was a plain contiguous
/// ISO even though its wbfs sectors can be anywhere in the file.
pub struct WbfsDisc<'a, RS: Read + Seek> {
    wbfs: &'a mut WbfsReader<RS>,
    slot: usize,
    origin: u64,
    sector_lookup: Vec<u16>,
    hole_mode: HoleMode,
    read_position: u64,
}

/// One piece of a logical read, covering at most one wbfs sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Chunk {
    /// wbfs sector local to the disc
    virt_sector: u64,
    /// wbfs sector inside the file, 0 marks a hole
    phys_sector: u16,
    /// where the data sits in the file, meaningless for holes
    file_offset: u64,
    /// where this piece starts in the output buffer
    buf_offset: usize,
    len: usize,
}

/// Splits a logical byte range into per sector pieces, looking every sector
/// up in the table. Translation happens separately from the io so it can be
/// tested without a backing file.
///
/// The caller has to bounds check the range against the table length first.
struct ChunkIter<'t> {
    sector_lookup: &'t [u16],
    sector_size: u64,
    cursor: u64,
    remaining: u64,
    buf_offset: usize,
}

impl<'t> ChunkIter<'t> {
    fn new(sector_lookup: &'t [u16], sector_size: u64, offset: u64, len: u64) -> Self {
        ChunkIter {
            sector_lookup,
            sector_size,
            cursor: offset,
            remaining: len,
            buf_offset: 0,
        }
    }
}

impl<'t> Iterator for ChunkIter<'t> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.remaining == 0 {
            return None;
        }
        let virt_sector = self.cursor / self.sector_size;
        let offset_in_sector = self.cursor % self.sector_size;
        let len = (self.sector_size - offset_in_sector).min(self.remaining);
        let phys_sector = self.sector_lookup[virt_sector as usize];
        let chunk = Chunk {
            virt_sector,
            phys_sector,
            file_offset: phys_sector as u64 * self.sector_size + offset_in_sector,
            buf_offset: self.buf_offset,
            len: len as usize,
        };
        self.cursor += len;
        self.remaining -= len;
        self.buf_offset += len as usize;
        Some(chunk)
    }
}

impl<'a, RS: Read + Seek> WbfsDisc<'a, RS> {
    pub(crate) fn open(wbfs: &'a mut WbfsReader<RS>, slot: usize) -> Result<Self> {
        if !wbfs.is_occupied(slot) {
            return Err(WbfsError::NoSuchDisc(slot));
        }
        let origin = slot as u64 * wbfs.hd_sector_size();
        let mut raw_lookup = vec![0; wbfs.wbfs_sectors_per_disc() as usize * 2];
        wbfs.file
            .seek(SeekFrom::Start(origin + DISC_HEADER_COPY_SIZE as u64))?;
        wbfs.file.read_exact(&mut raw_lookup)?;

        // sector 0 holds the file header, so 0 is free to mark holes
        let max_sector = wbfs.file_size() / wbfs.wbfs_sector_size();
        let mut sector_lookup = Vec::with_capacity(raw_lookup.len() / 2);
        for pair in raw_lookup.chunks_exact(2) {
            let entry = u16::from_be_bytes([pair[0], pair[1]]);
            if entry as u64 > max_sector {
                return Err(WbfsError::BadGeometry(
                    "sector lookup entry past the end of the file",
                ));
            }
            sector_lookup.push(entry);
        }
        log::debug!(
            "opened disc at slot {}: {} of {} wbfs sectors have data",
            slot,
            sector_lookup.iter().filter(|s| **s != 0).count(),
            sector_lookup.len()
        );
        Ok(WbfsDisc {
            wbfs,
            slot,
            origin,
            sector_lookup,
            hole_mode: HoleMode::default(),
            read_position: 0,
        })
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Offset into the WBFS file where this disc's header copy and sector
    /// lookup table start.
    pub fn origin(&self) -> u64 {
        self.origin
    }

    pub fn sector_lookup(&self) -> &[u16] {
        &self.sector_lookup
    }

    /// Size of the logical disc in bytes.
    pub fn size(&self) -> u64 {
        self.sector_lookup.len() as u64 * self.wbfs.wbfs_sector_size()
    }

    pub fn hole_mode(&self) -> HoleMode {
        self.hole_mode
    }

    pub fn set_hole_mode(&mut self, mode: HoleMode) {
        self.hole_mode = mode;
    }

    /// Fills the entire buffer with disc data starting at the given disc
    /// local offset, stitching the read together across wbfs sectors.
    ///
    /// Either the whole buffer gets filled or an error is returned, its
    /// contents are unspecified after a failure.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let len = buf.len() as u64;
        if offset
            .checked_add(len)
            .map_or(true, |end| end > self.size())
        {
            return Err(WbfsError::OutOfRange { offset, len });
        }
        let sector_size = self.wbfs.wbfs_sector_size();
        for chunk in ChunkIter::new(&self.sector_lookup, sector_size, offset, len) {
            let dest = &mut buf[chunk.buf_offset..][..chunk.len];
            if chunk.phys_sector == 0 {
                match self.hole_mode {
                    HoleMode::Fail => return Err(WbfsError::SparseHole(chunk.virt_sector)),
                    HoleMode::ZeroFill => dest.fill(0),
                }
            } else {
                self.wbfs.file.seek(SeekFrom::Start(chunk.file_offset))?;
                self.wbfs.file.read_exact(dest)?;
            }
        }
        Ok(())
    }

    /// Reads the specified amount of bytes from the given offset into the
    /// buffer, clearing it and ensuring proper capacity.
    /// Does not affect the current read position.
    pub fn read_into_vec(&mut self, offset: u64, length: u64, buffer: &mut Vec<u8>) -> Result<()> {
        buffer.clear();
        buffer.resize(length as usize, 0);
        self.read_at(offset, buffer)
    }

    /// Reads the 4 partition info entries, including the ones that point to
    /// no partitions at all.
    pub fn read_partition_info(&mut self) -> Result<[PartitionInfoEntry; 4]> {
        let mut raw = [0; 32];
        self.read_at(PARTITION_INFO_OFFSET, &mut raw)?;
        Ok(Cursor::new(&raw).read_be()?)
    }

    /// Reads a single partition table entry at the given disc local offset.
    /// The partition type is passed through unvalidated.
    pub fn read_partition_entry(&mut self, offset: u64) -> Result<WiiPartTableEntry> {
        let mut raw = [0; 8];
        self.read_at(offset, &mut raw)?;
        Ok(Cursor::new(&raw).read_be()?)
    }

    /// Reads all partition table entries of one info group.
    pub fn read_partition_table(
        &mut self,
        info: &PartitionInfoEntry,
    ) -> Result<Vec<WiiPartTableEntry>> {
        if info.count > MAX_PARTITIONS_PER_GROUP {
            return Err(WbfsError::OutOfRange {
                offset: *info.offset,
                len: info.count as u64 * 8,
            });
        }
        let mut raw = vec![0; info.count as usize * 8];
        self.read_at(*info.offset, &mut raw)?;
        let mut cursor = Cursor::new(raw);
        let mut entries = Vec::with_capacity(info.count as usize);
        for _ in 0..info.count {
            entries.push(cursor.read_be()?);
        }
        Ok(entries)
    }

    /// Collects the partition table entries of all 4 groups.
    pub fn read_partitions(&mut self) -> Result<Vec<WiiPartTableEntry>> {
        let infos = self.read_partition_info()?;
        let mut entries = Vec::new();
        for info in infos.iter().filter(|info| info.count != 0) {
            entries.extend(self.read_partition_table(info)?);
        }
        Ok(entries)
    }

    /// Reads the partial disc header copy stored in front of this disc's
    /// sector lookup table. This doesn't go through the sector translation,
    /// so it works even when the start of the disc itself is a hole.
    pub fn read_disc_header(&mut self) -> Result<DiscHeader> {
        let mut raw = [0; DISC_HEADER_COPY_SIZE];
        self.wbfs.file.seek(SeekFrom::Start(self.origin))?;
        self.wbfs.file.read_exact(&mut raw)?;
        Ok(Cursor::new(&raw).read_be()?)
    }

    /// Reads the encrypted title key and the title id of the partition
    /// starting at the given disc local offset. The title id makes up the
    /// first half of the iv needed to decrypt the title key, see
    /// [`decrypt_title_key`](crate::crypto::decrypt_title_key).
    pub fn read_title_key_material(
        &mut self,
        partition_offset: u64,
    ) -> Result<([u8; 16], [u8; 8])> {
        let mut title_key = [0; 16];
        self.read_at(partition_offset + TITLE_KEY_OFFSET, &mut title_key)?;
        let mut title_id = [0; 8];
        self.read_at(partition_offset + TITLE_ID_OFFSET, &mut title_id)?;
        Ok((title_key, title_id))
    }
}

fn into_io_error(err: WbfsError) -> io::Error {
    match err {
        WbfsError::Io(io_error) => io_error,
        WbfsError::Truncated => io::ErrorKind::UnexpectedEof.into(),
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

impl<'a, RS: Read + Seek> Read for WbfsDisc<'a, RS> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.size().saturating_sub(self.read_position);
        let count = (buf.len() as u64).min(remaining) as usize;
        if count == 0 {
            return Ok(0);
        }
        self.read_at(self.read_position, &mut buf[..count])
            .map_err(into_io_error)?;
        self.read_position += count as u64;
        Ok(count)
    }
}

impl<'a, RS: Read + Seek> Seek for WbfsDisc<'a, RS> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Current(off) => self.read_position as i64 + off,
            SeekFrom::Start(off) => off as i64,
            SeekFrom::End(off) => self.size() as i64 + off,
        };
        self.read_position = new_pos.clamp(0, self.size() as i64) as u64;
        Ok(self.read_position)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.read_position)
    }
}
