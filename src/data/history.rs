//! Fixed-depth circular store of recent spectrum frames.
//!
//! The buffer is an arena plus a write cursor: two parallel arrays hold the
//! bin amplitudes and the center frequency of every slot, and `slice_ptr`
//! points at the slot that the next frame will overwrite. Both render
//! backends read from here; only the ingestion path writes.

use crate::sink::SpectrumFrame;

/// Sentinel stored in slots that have not been written since the last
/// reallocation. Never reported as a power value.
pub const NO_DATA: f32 = f32::NAN;

/// Default number of retained frames when neither the config nor the surface
/// asks for more.
pub const DEFAULT_HISTORY_DEPTH: usize = 1024;

/// One retained frame, borrowed from the buffer.
#[derive(Debug, Clone, Copy)]
pub struct HistoryRow<'a> {
    /// Slot index in the backing arrays.
    pub slot: usize,
    pub amplitudes: &'a [f32],
    pub center_freq: f64,
}

pub struct HistoryBuffer {
    capacity: usize,
    bin_count: usize,
    amplitudes: Vec<f32>,
    center_freqs: Vec<f64>,
    slice_ptr: usize,
    filled: usize,
    sample_rate: f64,
    generation: u64,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl HistoryBuffer {
    /// Create an empty buffer holding up to `capacity` frames.
    ///
    /// Storage for the bins is allocated lazily on the first frame, once the
    /// bin count is known.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            bin_count: 0,
            amplitudes: Vec::new(),
            center_freqs: vec![f64::NAN; capacity],
            slice_ptr: 0,
            filled: 0,
            sample_rate: 0.0,
            generation: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    /// Slot that the next ingested frame will overwrite.
    pub fn slice_ptr(&self) -> usize {
        self.slice_ptr
    }

    /// Number of slots holding real data (at most `capacity`).
    pub fn rows_filled(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Bumped every time the storage is reallocated or cleared. Backends
    /// compare it against the value they mirrored to notice stale state.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Sample rate (bandwidth) of the most recently ingested frame.
    pub fn latest_sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Write a frame at the cursor and advance it.
    ///
    /// Returns `false` when the frame was ignored (no bins). A bin count that
    /// differs from the current layout discards all history first.
    pub fn ingest(&mut self, frame: SpectrumFrame) -> bool {
        let SpectrumFrame {
            center_freq,
            sample_rate,
            bins,
        } = frame;
        if bins.is_empty() {
            return false;
        }
        if bins.len() != self.bin_count {
            tracing::debug!(
                old = self.bin_count,
                new = bins.len(),
                "spectrum bin count changed, reallocating history"
            );
            self.reallocate(bins.len());
        }

        let start = self.slice_ptr * self.bin_count;
        self.amplitudes[start..start + self.bin_count].copy_from_slice(&bins);
        self.center_freqs[self.slice_ptr] = center_freq;
        self.sample_rate = sample_rate;
        self.slice_ptr = (self.slice_ptr + 1) % self.capacity;
        self.filled = (self.filled + 1).min(self.capacity);
        true
    }

    /// Row `offset` frames before the newest one; `row_at(0)` is the newest.
    ///
    /// Returns `None` for slots that were never written (or were discarded
    /// by a reallocation).
    pub fn row_at(&self, offset: usize) -> Option<HistoryRow<'_>> {
        if offset >= self.filled {
            return None;
        }
        let slot = (self.slice_ptr + self.capacity - 1 - offset) % self.capacity;
        self.slot(slot)
    }

    pub fn newest(&self) -> Option<HistoryRow<'_>> {
        self.row_at(0)
    }

    /// Direct access by slot index, used by backends that mirror the arena
    /// layout (e.g. one texture row per slot).
    pub fn slot(&self, slot: usize) -> Option<HistoryRow<'_>> {
        if slot >= self.capacity || self.bin_count == 0 {
            return None;
        }
        let center_freq = self.center_freqs[slot];
        if center_freq.is_nan() {
            return None;
        }
        let start = slot * self.bin_count;
        Some(HistoryRow {
            slot,
            amplitudes: &self.amplitudes[start..start + self.bin_count],
            center_freq,
        })
    }

    /// Retained rows from oldest to newest.
    pub fn iter_oldest_first(&self) -> impl Iterator<Item = HistoryRow<'_>> + '_ {
        (0..self.filled).rev().filter_map(move |offset| self.row_at(offset))
    }

    /// Change the depth, keeping the newest rows that still fit.
    pub fn resize_capacity(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        if capacity == self.capacity {
            return;
        }
        let keep = self.filled.min(capacity);
        let mut amplitudes = vec![NO_DATA; capacity * self.bin_count];
        let mut center_freqs = vec![f64::NAN; capacity];
        // newest row lands in slot keep-1, so the cursor ends up at `keep`
        for offset in 0..keep {
            if let Some(row) = self.row_at(offset) {
                let dst = keep - 1 - offset;
                amplitudes[dst * self.bin_count..(dst + 1) * self.bin_count]
                    .copy_from_slice(row.amplitudes);
                center_freqs[dst] = row.center_freq;
            }
        }
        self.amplitudes = amplitudes;
        self.center_freqs = center_freqs;
        self.capacity = capacity;
        self.slice_ptr = keep % capacity;
        self.filled = keep;
        self.generation += 1;
    }

    /// Forget every row but keep the current layout.
    pub fn clear(&mut self) {
        self.amplitudes.fill(NO_DATA);
        self.center_freqs.fill(f64::NAN);
        self.slice_ptr = 0;
        self.filled = 0;
        self.generation += 1;
    }

    fn reallocate(&mut self, bin_count: usize) {
        self.bin_count = bin_count;
        self.amplitudes = vec![NO_DATA; self.capacity * bin_count];
        self.center_freqs = vec![f64::NAN; self.capacity];
        self.slice_ptr = 0;
        self.filled = 0;
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(center: f64, value: f32, bins: usize) -> SpectrumFrame {
        SpectrumFrame::new(center, 1e6, vec![value; bins])
    }

    #[test]
    fn zero_length_frame_is_ignored() {
        let mut h = HistoryBuffer::new(4);
        assert!(h.ingest(frame(1.0, 0.0, 8)));
        assert!(!h.ingest(SpectrumFrame::new(2.0, 1e6, Vec::new())));
        assert_eq!(h.slice_ptr(), 1);
        assert_eq!(h.rows_filled(), 1);
        assert_eq!(h.bin_count(), 8);
    }

    #[test]
    fn resize_keeps_newest_rows() {
        let mut h = HistoryBuffer::new(4);
        for i in 0..6 {
            h.ingest(frame(i as f64, i as f32, 2));
        }
        h.resize_capacity(8);
        assert_eq!(h.rows_filled(), 4);
        assert_eq!(h.row_at(0).unwrap().center_freq, 5.0);
        assert_eq!(h.row_at(3).unwrap().center_freq, 2.0);
        h.ingest(frame(6.0, 6.0, 2));
        assert_eq!(h.row_at(0).unwrap().center_freq, 6.0);
        assert_eq!(h.row_at(4).unwrap().center_freq, 2.0);

        h.resize_capacity(2);
        assert_eq!(h.rows_filled(), 2);
        assert_eq!(h.row_at(1).unwrap().center_freq, 5.0);
        assert!(h.row_at(2).is_none());
    }

    #[test]
    fn clear_bumps_generation() {
        let mut h = HistoryBuffer::new(4);
        h.ingest(frame(1.0, 1.0, 2));
        let g = h.generation();
        h.clear();
        assert!(h.generation() > g);
        assert!(h.newest().is_none());
        assert_eq!(h.bin_count(), 2);
    }
}
