//! Segmented shared memory region.
//!
//! One region is created by the orchestrator and split into fixed-size
//! segments. Each sensor process writes only its own segment; the orchestrator
//! reads them all and writes the control segment.
//!
//! There is no synchronization between writers and readers. A reader may
//! observe a segment mid-write and therefore a torn snapshot; the record
//! decoders treat such snapshots like any other malformed input.

use crate::error::{ShmError, ShmResult};
use crate::platform::{attach_region_mmap, create_region_mmap, region_path};
use memmap2::MmapMut;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use vsp_common::consts::{SEGMENT_COUNT, SEGMENT_SIZE};

/// Shape of a region: `segment_count` segments of `segment_size` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    /// Bytes per segment
    pub segment_size: usize,
    /// Number of segments
    pub segment_count: usize,
}

impl SegmentLayout {
    /// Build a layout.
    pub const fn new(segment_size: usize, segment_count: usize) -> Self {
        Self {
            segment_size,
            segment_count,
        }
    }

    /// Total bytes covered by the layout.
    pub const fn total_size(&self) -> usize {
        self.segment_size * self.segment_count
    }

    /// Reject empty layouts and ones whose size overflows.
    pub fn validate(&self) -> ShmResult<()> {
        if self.segment_size == 0
            || self.segment_count == 0
            || self.segment_size.checked_mul(self.segment_count).is_none()
        {
            return Err(ShmError::InvalidLayout {
                segment_size: self.segment_size,
                segment_count: self.segment_count,
            });
        }
        Ok(())
    }

    /// Byte offset of segment `id`.
    pub fn offset_of(&self, id: usize) -> ShmResult<usize> {
        if id >= self.segment_count {
            return Err(ShmError::SegmentOutOfRange {
                id,
                count: self.segment_count,
            });
        }
        Ok(id * self.segment_size)
    }
}

impl Default for SegmentLayout {
    fn default() -> Self {
        Self::new(SEGMENT_SIZE, SEGMENT_COUNT)
    }
}

/// Owner handle on a segmented region. Dropping it removes the region.
pub struct SegmentStore {
    name: String,
    path: PathBuf,
    layout: SegmentLayout,
    mmap: Option<MmapMut>,
}

impl SegmentStore {
    /// Create the region, zero-filled.
    ///
    /// A region left behind by a crashed owner is replaced.
    pub fn create(name: &str, layout: SegmentLayout) -> ShmResult<Self> {
        layout.validate()?;
        let path = region_path(name);
        if path.exists() {
            warn!("Replacing stale shared region '{}'", name);
        }

        let mut mmap = create_region_mmap(&path, layout.total_size())?;
        mmap.fill(0);

        info!(
            "Created shared region '{}' ({} segments x {} bytes)",
            name, layout.segment_count, layout.segment_size
        );

        Ok(Self {
            name: name.to_string(),
            path,
            layout,
            mmap: Some(mmap),
        })
    }

    /// Region name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Region layout.
    pub fn layout(&self) -> SegmentLayout {
        self.layout
    }

    /// Open a view of one segment of this region.
    pub fn segment(&self, id: usize) -> ShmResult<Segment> {
        Segment::open(&self.name, self.layout, id)
    }

    /// Unmap and remove the region.
    ///
    /// Segment views opened earlier keep their mapping until dropped.
    pub fn close(mut self) -> ShmResult<()> {
        self.remove()
    }

    fn remove(&mut self) -> ShmResult<()> {
        if self.mmap.take().is_none() {
            return Ok(());
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Removed shared region '{}'", self.name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Shared region '{}' already removed", self.name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for SegmentStore {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            warn!("Failed to remove shared region '{}': {}", self.name, e);
        }
    }
}

/// Bounds-checked view of one segment.
pub struct Segment {
    id: usize,
    offset: usize,
    size: usize,
    mmap: MmapMut,
}

impl Segment {
    /// Attach to region `name` and select segment `id`.
    pub fn open(name: &str, layout: SegmentLayout, id: usize) -> ShmResult<Self> {
        layout.validate()?;
        let offset = layout.offset_of(id)?;
        let mmap = attach_region_mmap(&region_path(name), name)?;

        if mmap.len() < layout.total_size() {
            return Err(ShmError::InvalidSize {
                size: mmap.len(),
                expected: layout.total_size(),
            });
        }

        debug!("Opened segment {} of '{}'", id, name);
        Ok(Self {
            id,
            offset,
            size: layout.segment_size,
            mmap,
        })
    }

    /// Segment id within the region.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Segment size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Copy `bytes` to the start of the segment. The rest is left untouched.
    pub fn write(&mut self, bytes: &[u8]) -> ShmResult<()> {
        if bytes.len() > self.size {
            return Err(ShmError::PayloadTooLarge {
                len: bytes.len(),
                capacity: self.size,
            });
        }
        let start = self.offset;
        self.mmap[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Zero the whole segment.
    pub fn clear(&mut self) {
        let start = self.offset;
        self.mmap[start..start + self.size].fill(0);
    }

    /// Fill `buf` from the start of the segment.
    pub fn read_into(&self, buf: &mut [u8]) -> ShmResult<()> {
        if buf.len() > self.size {
            return Err(ShmError::PayloadTooLarge {
                len: buf.len(),
                capacity: self.size,
            });
        }
        buf.copy_from_slice(&self.bytes()[..buf.len()]);
        Ok(())
    }

    /// Copy of the whole segment.
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes().to_vec()
    }

    /// Detach. The region itself is untouched.
    pub fn close(self) {}

    fn bytes(&self) -> &[u8] {
        &self.mmap[self.offset..self.offset + self.size]
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("id", &self.id)
            .field("offset", &self.offset)
            .field("size", &self.size)
            .finish()
    }
}
