//! Fixed-capacity sliding windows
//!
//! [`SampleWindow`] backs the RMS monitor, [`MaxWindow`] the look-ahead
//! limiter. Storage is allocated once at construction and both run in
//! constant (amortized) time per push.

/// Sliding window with a running sum of squares
#[derive(Debug, Clone)]
pub struct SampleWindow {
    data: Box<[f32]>,
    write_pos: usize,
    len: usize,
    /// Running sum of squares over the live entries
    sum_squares: f64,
}

impl SampleWindow {
    /// Create an empty window (capacity is raised to at least 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity.max(1)].into_boxed_slice(),
            write_pos: 0,
            len: 0,
            sum_squares: 0.0,
        }
    }

    /// Append a value, evicting the oldest one when the window is full
    #[inline]
    pub fn push(&mut self, value: f32) {
        let capacity = self.data.len();
        if self.len == capacity {
            let evicted = self.data[self.write_pos] as f64;
            self.sum_squares -= evicted * evicted;
        } else {
            self.len += 1;
        }

        self.data[self.write_pos] = value;
        self.sum_squares += value as f64 * value as f64;

        self.write_pos += 1;
        if self.write_pos == capacity {
            self.write_pos = 0;
            // Re-derive the running sum once per lap so rounding error can't accumulate
            self.sum_squares = self.data[..self.len]
                .iter()
                .map(|&v| v as f64 * v as f64)
                .sum();
        }
    }

    /// Root mean square of the held values (0.0 when empty)
    #[inline]
    pub fn rms(&self) -> f32 {
        if self.len == 0 {
            return 0.0;
        }
        (self.sum_squares.max(0.0) / self.len as f64).sqrt() as f32
    }
}

/// Maximum over the last `capacity` pushes
///
/// Keeps a monotonic queue of candidates (sequence number, value) with
/// values strictly decreasing from front to back, stored in a ring the size
/// of the window. The front is always the current maximum.
#[derive(Debug, Clone)]
pub struct MaxWindow {
    candidates: Box<[(u64, f32)]>,
    head: usize,
    len: usize,
    pushed: u64,
}

impl MaxWindow {
    /// Create an empty window (capacity is raised to at least 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            candidates: vec![(0, 0.0); capacity.max(1)].into_boxed_slice(),
            head: 0,
            len: 0,
            pushed: 0,
        }
    }

    #[inline]
    fn slot(&self, offset: usize) -> usize {
        (self.head + offset) % self.candidates.len()
    }

    /// Append a value; the entry pushed `capacity` calls ago leaves the window
    #[inline]
    pub fn push(&mut self, value: f32) {
        let capacity = self.candidates.len();
        let seq = self.pushed;
        self.pushed += 1;

        // At most one candidate expires per push
        if self.len > 0 && self.candidates[self.head].0 + capacity as u64 <= seq {
            self.head = self.slot(1);
            self.len -= 1;
        }

        // Smaller values behind the new one can never be the maximum again
        while self.len > 0 && self.candidates[self.slot(self.len - 1)].1 <= value {
            self.len -= 1;
        }

        let tail = self.slot(self.len);
        self.candidates[tail] = (seq, value);
        self.len += 1;
    }

    /// Largest value in the window (0.0 when empty)
    #[inline]
    pub fn max(&self) -> f32 {
        if self.len == 0 {
            0.0
        } else {
            self.candidates[self.head].1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest_when_full() {
        let mut window = MaxWindow::new(3);
        for v in [0.9, 0.1, 0.2] {
            window.push(v);
        }
        assert_eq!(window.max(), 0.9);

        // 0.9 falls out
        window.push(0.3);
        assert_eq!(window.max(), 0.3);
    }

    #[test]
    fn test_max_matches_scan_over_window() {
        let capacity = 16;
        let mut window = MaxWindow::new(capacity);
        let values: Vec<f32> = (0..1000)
            .map(|i| ((i * 7919) % 101) as f32 / 100.0)
            .collect();

        for (i, &v) in values.iter().enumerate() {
            window.push(v);
            let start = (i + 1).saturating_sub(capacity);
            let expected = values[start..=i].iter().fold(0.0f32, |acc, &x| acc.max(x));
            assert_eq!(window.max(), expected, "at push {}", i);
        }
    }

    #[test]
    fn test_equal_values_stay_until_they_age_out() {
        let mut window = MaxWindow::new(2);
        window.push(0.5);
        window.push(0.5);
        window.push(0.1);
        assert_eq!(window.max(), 0.5);
        window.push(0.1);
        assert_eq!(window.max(), 0.1);
    }

    #[test]
    fn test_rms_of_partial_window() {
        let mut window = SampleWindow::new(8);
        window.push(3.0);
        window.push(4.0);
        // sqrt((9 + 16) / 2)
        assert!((window.rms() - 12.5f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_rms_stays_exact_over_many_laps() {
        let mut window = SampleWindow::new(441);
        for i in 0..100_000 {
            window.push(if i % 2 == 0 { 0.7 } else { 0.1 });
        }
        for _ in 0..441 {
            window.push(0.25);
        }
        assert!((window.rms() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let mut window = MaxWindow::new(0);
        window.push(0.5);
        window.push(0.25);
        assert_eq!(window.max(), 0.25);

        let mut rms = SampleWindow::new(0);
        assert_eq!(rms.rms(), 0.0);
        rms.push(0.5);
        rms.push(0.25);
        assert_eq!(rms.rms(), 0.25);
    }
}
