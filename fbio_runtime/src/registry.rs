//! I/O Registry.
//!
//! Maps symbolic point ids to their storage in one frame. Offsets are
//! resolved once through the [`FrameHandle`] at registration and never
//! re-validated per cycle.
//!
//! Point values are atomics. The RT executor writes them every cycle while
//! the diagnostic loop reads them without any lock between the two; a
//! multi-byte value may be observed half-updated there, which is accepted
//! for a display-only view.
//!
//! ## Bit writes
//!
//! Boolean points share bytes with up to seven siblings. [`IoTable::write_all`]
//! updates them with a read-modify-write of the one byte, so siblings are
//! never touched.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use fbio::consts::MAX_POINTS_PER_FRAME;
use fbio::io::{BitLocation, Direction, IoConfig, IoPointId, PointConfig, read_bit, write_bit};
use fbio_frame::{FrameError, FrameHandle};
use thiserror::Error;
use tracing::{debug, error, info};

// ─── Error Types ────────────────────────────────────────────────────

/// Point registration failure. The point is excluded from the table.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The frame provider could not resolve the id.
    #[error("cannot resolve {id}: {source}")]
    Resolution {
        /// Point id.
        id: String,
        /// Provider error.
        #[source]
        source: FrameError,
    },

    /// Resolved range does not fit the frame.
    #[error("{id}: {len} byte(s) at offset {offset} exceed the {frame_len}-byte frame")]
    OutOfBounds {
        /// Point id.
        id: String,
        /// Resolved byte offset.
        offset: usize,
        /// Point width.
        len: usize,
        /// Frame size.
        frame_len: usize,
    },

    /// Width not allowed for this kind of point.
    #[error("{id}: invalid size {size} (boolean points are 1 byte, byte points at least 1)")]
    InvalidSize {
        /// Point id.
        id: String,
        /// Requested width.
        size: usize,
    },

    /// Id already present in the table.
    #[error("{id}: already registered")]
    Duplicate {
        /// Point id.
        id: String,
    },

    /// Table capacity exhausted.
    #[error("{id}: table full ({MAX_POINTS_PER_FRAME} points)")]
    TableFull {
        /// Point id.
        id: String,
    },
}

// ─── Points ─────────────────────────────────────────────────────────

/// Storage of one point.
#[derive(Debug)]
pub enum PointStorage {
    /// `len` bytes copied verbatim from `offset`.
    Byte {
        /// Byte offset in the frame.
        offset: usize,
        /// Current value.
        value: Box<[AtomicU8]>,
    },
    /// One bit of a shared byte.
    Bit {
        /// Byte offset and bit index in the frame.
        location: BitLocation,
        /// Current value.
        value: AtomicBool,
    },
}

/// A registered I/O point.
#[derive(Debug)]
pub struct IoPoint {
    id: IoPointId,
    storage: PointStorage,
}

impl IoPoint {
    fn bit(id: IoPointId, location: BitLocation) -> Self {
        Self {
            id,
            storage: PointStorage::Bit {
                location,
                value: AtomicBool::new(false),
            },
        }
    }

    fn bytes(id: IoPointId, offset: usize, len: usize) -> Self {
        Self {
            id,
            storage: PointStorage::Byte {
                offset,
                value: (0..len).map(|_| AtomicU8::new(0)).collect(),
            },
        }
    }

    /// Point id.
    pub fn id(&self) -> &IoPointId {
        &self.id
    }

    /// Storage variant.
    pub fn storage(&self) -> &PointStorage {
        &self.storage
    }

    /// Bit-packed boolean point.
    pub fn is_boolean(&self) -> bool {
        matches!(self.storage, PointStorage::Bit { .. })
    }

    /// Width in bytes.
    pub fn size_bytes(&self) -> usize {
        match &self.storage {
            PointStorage::Byte { value, .. } => value.len(),
            PointStorage::Bit { .. } => 1,
        }
    }

    /// Boolean value. Byte points report whether their first byte is non-zero.
    #[inline]
    pub fn get_bool(&self) -> bool {
        match &self.storage {
            PointStorage::Bit { value, .. } => value.load(Ordering::Relaxed),
            PointStorage::Byte { value, .. } => value[0].load(Ordering::Relaxed) != 0,
        }
    }

    /// Set the boolean value. Byte points store it as 0/1 in their first byte.
    #[inline]
    pub fn set_bool(&self, v: bool) {
        match &self.storage {
            PointStorage::Bit { value, .. } => value.store(v, Ordering::Relaxed),
            PointStorage::Byte { value, .. } => value[0].store(u8::from(v), Ordering::Relaxed),
        }
    }

    /// First value byte. Boolean points report 0 or 1.
    pub fn first_byte(&self) -> u8 {
        match &self.storage {
            PointStorage::Byte { value, .. } => value[0].load(Ordering::Relaxed),
            PointStorage::Bit { value, .. } => u8::from(value.load(Ordering::Relaxed)),
        }
    }

    /// Copy the current value into `out`. Returns the number of bytes copied.
    pub fn copy_bytes(&self, out: &mut [u8]) -> usize {
        match &self.storage {
            PointStorage::Byte { value, .. } => {
                let n = value.len().min(out.len());
                for (dst, src) in out.iter_mut().zip(value.iter()) {
                    *dst = src.load(Ordering::Relaxed);
                }
                n
            }
            PointStorage::Bit { .. } => match out.first_mut() {
                Some(dst) => {
                    *dst = self.first_byte();
                    1
                }
                None => 0,
            },
        }
    }

    /// Replace the value from `src`. Extra source bytes are ignored.
    pub fn set_bytes(&self, src: &[u8]) {
        match &self.storage {
            PointStorage::Byte { value, .. } => {
                for (dst, byte) in value.iter().zip(src) {
                    dst.store(*byte, Ordering::Relaxed);
                }
            }
            PointStorage::Bit { value, .. } => {
                if let Some(byte) = src.first() {
                    value.store(*byte != 0, Ordering::Relaxed);
                }
            }
        }
    }

    /// Refresh the value from a frame.
    #[inline]
    fn read_from(&self, frame: &[u8]) {
        match &self.storage {
            PointStorage::Bit { location, value } => {
                if let Some(byte) = frame.get(location.byte_offset) {
                    value.store(read_bit(*byte, location.mask()), Ordering::Relaxed);
                }
            }
            PointStorage::Byte { offset, value } => {
                if let Some(src) = frame.get(*offset..*offset + value.len()) {
                    for (dst, byte) in value.iter().zip(src) {
                        dst.store(*byte, Ordering::Relaxed);
                    }
                }
            }
        }
    }

    /// Store the value into a frame.
    #[inline]
    fn write_to(&self, frame: &mut [u8]) {
        match &self.storage {
            PointStorage::Bit { location, value } => {
                if let Some(byte) = frame.get_mut(location.byte_offset) {
                    write_bit(byte, location.mask(), value.load(Ordering::Relaxed));
                }
            }
            PointStorage::Byte { offset, value } => {
                if let Some(dst) = frame.get_mut(*offset..*offset + value.len()) {
                    for (byte, src) in dst.iter_mut().zip(value.iter()) {
                        *byte = src.load(Ordering::Relaxed);
                    }
                }
            }
        }
    }
}

// ─── Per-frame table ────────────────────────────────────────────────

/// Points registered against one frame, in registration order.
#[derive(Debug)]
pub struct IoTable {
    direction: Direction,
    points: heapless::Vec<IoPoint, MAX_POINTS_PER_FRAME>,
}

impl IoTable {
    /// Empty table.
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            points: heapless::Vec::new(),
        }
    }

    /// Frame direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Resolve `id` against `frame` and add it.
    ///
    /// Boolean points resolve a bit offset, byte points a byte offset. The
    /// resolved range is checked against the frame length once, here.
    pub fn register(
        &mut self,
        frame: &FrameHandle,
        id: &IoPointId,
        size_bytes: usize,
        is_boolean: bool,
    ) -> Result<(), RegistryError> {
        let name = id.as_str();
        if (is_boolean && size_bytes != 1) || size_bytes == 0 {
            return Err(RegistryError::InvalidSize {
                id: name.to_string(),
                size: size_bytes,
            });
        }
        if self.index_of(name).is_some() {
            return Err(RegistryError::Duplicate {
                id: name.to_string(),
            });
        }

        let resolution = |source| RegistryError::Resolution {
            id: name.to_string(),
            source,
        };
        let frame_len = frame.len().map_err(resolution)?;

        let point = if is_boolean {
            let location = frame.resolve_bit(name).map_err(resolution)?;
            check_bounds(name, location.byte_offset, 1, frame_len)?;
            debug!("Registered {name} at {location} in {}", frame.frame());
            IoPoint::bit(id.clone(), location)
        } else {
            let offset = frame.resolve_offset(name).map_err(resolution)?;
            check_bounds(name, offset, size_bytes, frame_len)?;
            debug!("Registered {name} at {offset} (+{size_bytes}) in {}", frame.frame());
            IoPoint::bytes(id.clone(), offset, size_bytes)
        };

        self.points.push(point).map_err(|_| RegistryError::TableFull {
            id: name.to_string(),
        })
    }

    /// Register every point, logging and skipping the ones that fail.
    ///
    /// Returns the number of points registered.
    pub fn register_all<'a>(
        &mut self,
        frame: &FrameHandle,
        points: impl IntoIterator<Item = &'a PointConfig>,
    ) -> usize {
        let mut registered = 0;
        for point in points {
            match self.register(frame, &point.id, point.size_bytes, point.boolean) {
                Ok(()) => registered += 1,
                Err(e) => error!("Excluding {} point: {e}", self.direction),
            }
        }
        registered
    }

    /// Refresh every point from `frame`.
    #[inline]
    pub fn read_all(&self, frame: &[u8]) {
        for point in &self.points {
            point.read_from(frame);
        }
    }

    /// Store every point into `frame`.
    #[inline]
    pub fn write_all(&self, frame: &mut [u8]) {
        for point in &self.points {
            point.write_to(frame);
        }
    }

    /// Drop all points and their storage.
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Registered point count.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &IoPoint> {
        self.points.iter()
    }

    /// Point by index.
    pub fn get(&self, index: usize) -> Option<&IoPoint> {
        self.points.get(index)
    }

    /// Index of the point with this id.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.points.iter().position(|p| p.id.as_str() == id)
    }

    /// Boolean value at `index`; `false` when out of range.
    #[inline]
    pub fn bool_at(&self, index: usize) -> bool {
        self.points.get(index).is_some_and(IoPoint::get_bool)
    }

    /// Set the boolean value at `index`. Out of range is ignored.
    #[inline]
    pub fn set_bool_at(&self, index: usize, value: bool) {
        if let Some(point) = self.points.get(index) {
            point.set_bool(value);
        }
    }
}

fn check_bounds(id: &str, offset: usize, len: usize, frame_len: usize) -> Result<(), RegistryError> {
    match offset.checked_add(len) {
        Some(end) if end <= frame_len => Ok(()),
        _ => Err(RegistryError::OutOfBounds {
            id: id.to_string(),
            offset,
            len,
            frame_len,
        }),
    }
}

// ─── Registry ───────────────────────────────────────────────────────

/// Input and output tables of one processing session.
#[derive(Debug)]
pub struct IoRegistry {
    /// Points read from the input frame.
    pub inputs: IoTable,
    /// Points written to the output frame.
    pub outputs: IoTable,
}

impl Default for IoRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IoRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            inputs: IoTable::new(Direction::Input),
            outputs: IoTable::new(Direction::Output),
        }
    }

    /// Register every configured point against its frame.
    pub fn build(io: &IoConfig, input: &FrameHandle, output: &FrameHandle) -> Self {
        let mut registry = Self::new();
        let inputs = registry.inputs.register_all(input, io.points_for(Direction::Input));
        let outputs = registry.outputs.register_all(output, io.points_for(Direction::Output));
        info!(
            "IoRegistry built: {inputs} inputs, {outputs} outputs ({} configured)",
            io.points.len()
        );
        registry
    }

    /// Total registered points.
    pub fn len(&self) -> usize {
        self.inputs.len() + self.outputs.len()
    }

    /// True when neither table has points.
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    /// Inputs then outputs.
    pub fn iter(&self) -> impl Iterator<Item = &IoPoint> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Clear both tables.
    pub fn clear(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use fbio::io::config::sample_layouts;
    use fbio_frame::{AccessMode, FrameId, LocalFrameProvider};
    use std::sync::Arc;

    fn handles() -> (FrameHandle, FrameHandle) {
        let layouts = sample_layouts("DeviceBus", "1:IN", "1:OUT");
        let provider = Arc::new(LocalFrameProvider::from_layouts(&layouts).unwrap());
        let input =
            FrameHandle::acquire(provider.clone(), FrameId::new("DeviceBus", "1:IN"), AccessMode::Read).unwrap();
        let output =
            FrameHandle::acquire(provider, FrameId::new("DeviceBus", "1:OUT"), AccessMode::Write).unwrap();
        (input, output)
    }

    fn id(s: &str) -> IoPointId {
        s.parse().unwrap()
    }

    #[test]
    fn registers_bits_and_bytes() {
        let (input, _output) = handles();
        let mut table = IoTable::new(Direction::Input);
        table.register(&input, &id("DeviceBus/0.IN04"), 1, true).unwrap();
        table
            .register(&input, &id("DeviceBus/DIAG_STATUS_REG"), 2, false)
            .unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.get(0).unwrap().is_boolean());
        assert_eq!(table.get(1).unwrap().size_bytes(), 2);
        assert_eq!(table.index_of("DeviceBus/DIAG_STATUS_REG"), Some(1));
    }

    #[test]
    fn resolution_failure_excludes_point() {
        let (input, _output) = handles();
        let mut table = IoTable::new(Direction::Input);
        let err = table
            .register(&input, &id("DeviceBus/0.IN99"), 1, true)
            .unwrap_err();
        assert!(matches!(err, RegistryError::Resolution { .. }));
        assert!(table.is_empty());
    }

    #[test]
    fn range_past_frame_end_rejected() {
        let (input, _output) = handles();
        let mut table = IoTable::new(Direction::Input);
        // ~DI8 sits at offset 2 of an 8-byte frame.
        let err = table
            .register(&input, &id("DeviceBus/0.~DI8"), 7, false)
            .unwrap_err();
        assert!(matches!(err, RegistryError::OutOfBounds { offset: 2, len: 7, .. }));
    }

    #[test]
    fn boolean_must_be_one_byte_and_ids_unique() {
        let (input, _output) = handles();
        let mut table = IoTable::new(Direction::Input);
        assert!(matches!(
            table.register(&input, &id("DeviceBus/0.IN04"), 2, true),
            Err(RegistryError::InvalidSize { .. })
        ));
        table.register(&input, &id("DeviceBus/0.IN04"), 1, true).unwrap();
        assert!(matches!(
            table.register(&input, &id("DeviceBus/0.IN04"), 1, true),
            Err(RegistryError::Duplicate { .. })
        ));
    }

    #[test]
    fn read_all_extracts_bits_and_bytes() {
        let (input, _output) = handles();
        let mut table = IoTable::new(Direction::Input);
        table.register(&input, &id("DeviceBus/0.IN04"), 1, true).unwrap();
        table.register(&input, &id("DeviceBus/0.IN05"), 1, true).unwrap();
        table
            .register(&input, &id("DeviceBus/DIAG_STATUS_REG"), 2, false)
            .unwrap();

        let frame = [0xE0, 0x01, 0b0001_0000, 0, 0, 0, 0, 0];
        table.read_all(&frame);
        assert!(table.bool_at(0));
        assert!(!table.bool_at(1));
        let mut status = [0u8; 2];
        assert_eq!(table.get(2).unwrap().copy_bytes(&mut status), 2);
        assert_eq!(status, [0xE0, 0x01]);
    }

    #[test]
    fn bit_toggle_leaves_siblings() {
        let (_input, output) = handles();
        let mut table = IoTable::new(Direction::Output);
        table.register(&output, &id("DeviceBus/0.OUT05"), 1, true).unwrap();

        let mut frame = [0xFF & !0b0010_0000, 0, 0, 0, 0, 0, 0, 0];
        let before = frame[0];

        table.set_bool_at(0, true);
        table.write_all(&mut frame);
        assert_eq!(frame[0], 0xFF);

        table.read_all(&frame);
        assert!(table.bool_at(0));

        table.set_bool_at(0, false);
        table.write_all(&mut frame);
        assert_eq!(frame[0], before);
    }

    #[test]
    fn round_trip_on_unmodified_frame_is_noop() {
        let (input, _output) = handles();
        let mut table = IoTable::new(Direction::Input);
        for name in ["DeviceBus/0.IN04", "DeviceBus/0.IN07"] {
            table.register(&input, &id(name), 1, true).unwrap();
        }
        table.register(&input, &id("DeviceBus/0.~DI8"), 1, false).unwrap();
        table
            .register(&input, &id("DeviceBus/DIAG_STATUS_REG"), 2, false)
            .unwrap();

        let original = [0x12, 0x34, 0b1001_0110, 0xAA, 0, 0x55, 0, 0xFF];
        let mut frame = original;
        table.read_all(&frame);
        table.write_all(&mut frame);
        assert_eq!(frame, original);
    }

    #[test]
    fn clear_drops_everything() {
        let (input, output) = handles();
        let io = IoConfig::default();
        let mut registry = IoRegistry::build(&io, &input, &output);
        assert_eq!(registry.len(), 10);
        registry.clear();
        assert!(registry.is_empty());
    }
}
