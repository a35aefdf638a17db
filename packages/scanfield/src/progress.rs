//! Load progress accounting and its three-digit presentation.

use anyhow::{bail, Result};

/// Number of settled items out of the total.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadProgress {
    total_items: usize,
    loaded_count: usize,
}

impl LoadProgress {
    pub fn new(total_items: usize) -> Self {
        Self {
            total_items,
            loaded_count: 0,
        }
    }

    pub fn total_items(&self) -> usize {
        self.total_items
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded_count
    }

    pub fn is_complete(&self) -> bool {
        self.loaded_count == self.total_items
    }

    /// Record one successfully settled item.
    pub fn advance(&mut self) -> Result<()> {
        if self.loaded_count >= self.total_items {
            bail!(
                "progress overflow: {} of {} items already loaded",
                self.loaded_count,
                self.total_items
            );
        }
        self.loaded_count += 1;
        Ok(())
    }

    /// Loaded fraction as a percentage in `[0, 100]`.
    pub fn percent(&self) -> f64 {
        if self.total_items == 0 {
            return 100.0;
        }
        self.loaded_count as f64 / self.total_items as f64 * 100.0
    }
}

/// Slots of the on-screen counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DigitSlot {
    Hundred,
    Ten,
    One,
}

impl DigitSlot {
    pub const ALL: [DigitSlot; 3] = [DigitSlot::Hundred, DigitSlot::Ten, DigitSlot::One];

    /// Value of the `data-ui` attribute marking this slot in the page.
    pub fn data_ui(self) -> &'static str {
        match self {
            DigitSlot::Hundred => "preloader-count-digit-hundred",
            DigitSlot::Ten => "preloader-count-digit-ten",
            DigitSlot::One => "preloader-count-digit-one",
        }
    }
}

/// A percentage split into three display digits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressDigits {
    pub hundreds: u8,
    pub tens: u8,
    pub ones: u8,
}

impl ProgressDigits {
    /// Split a percentage with floor-modulo arithmetic.
    ///
    /// The hundreds digit is `floor((p / 100) % 100)`. The divisor is wider
    /// than a single digit needs; for the `[0, 100]` range it only ever
    /// yields 0 or 1, and it would keep counting past 199 instead of
    /// wrapping at 10.
    pub fn from_percent(percent: f64) -> Self {
        let hundreds = ((percent / 100.0) % 100.0).floor();
        let tens = ((percent / 10.0) % 10.0).floor();
        let ones = (percent % 10.0).floor();
        Self {
            hundreds: hundreds as u8,
            tens: tens as u8,
            ones: ones as u8,
        }
    }

    pub fn get(&self, slot: DigitSlot) -> u8 {
        match slot {
            DigitSlot::Hundred => self.hundreds,
            DigitSlot::Ten => self.tens,
            DigitSlot::One => self.ones,
        }
    }
}

/// Presentation layer for the load counter.
pub trait ProgressIndicator {
    fn show(&mut self, digits: ProgressDigits) -> Result<()>;
}

/// Indicator for headless builds; writes the counter to the log.
#[derive(Debug, Default)]
pub struct LogProgressIndicator;

impl ProgressIndicator for LogProgressIndicator {
    fn show(&mut self, digits: ProgressDigits) -> Result<()> {
        log::info!("Loading {}{}{}%", digits.hundreds, digits.tens, digits.ones);
        Ok(())
    }
}

/// Indicator that remembers every update; useful for hosts that poll.
#[derive(Debug, Default)]
pub struct RecordingProgressIndicator {
    pub history: Vec<ProgressDigits>,
}

impl ProgressIndicator for RecordingProgressIndicator {
    fn show(&mut self, digits: ProgressDigits) -> Result<()> {
        self.history.push(digits);
        Ok(())
    }
}

impl<T: ProgressIndicator + ?Sized> ProgressIndicator for &mut T {
    fn show(&mut self, digits: ProgressDigits) -> Result<()> {
        (**self).show(digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digits(h: u8, t: u8, o: u8) -> ProgressDigits {
        ProgressDigits {
            hundreds: h,
            tens: t,
            ones: o,
        }
    }

    #[test]
    fn test_digit_boundaries() {
        assert_eq!(ProgressDigits::from_percent(0.0), digits(0, 0, 0));
        assert_eq!(ProgressDigits::from_percent(99.0), digits(0, 9, 9));
        assert_eq!(ProgressDigits::from_percent(100.0), digits(1, 0, 0));
    }

    #[test]
    fn test_fractional_percent_floors() {
        // 1 of 3 items
        assert_eq!(ProgressDigits::from_percent(100.0 / 3.0), digits(0, 3, 3));
        assert_eq!(ProgressDigits::from_percent(99.999), digits(0, 9, 9));
    }

    #[test]
    fn test_wide_hundreds_divisor_does_not_wrap_at_ten() {
        // Outside the normal range the hundreds digit keeps counting.
        assert_eq!(ProgressDigits::from_percent(1234.0).hundreds, 12);
        assert_eq!(ProgressDigits::from_percent(250.0), digits(2, 5, 0));
    }

    #[test]
    fn test_decomposition_is_idempotent() {
        let a = ProgressDigits::from_percent(57.3);
        let b = ProgressDigits::from_percent(57.3);
        assert_eq!(a, b);
        assert_eq!(a, digits(0, 5, 7));
    }

    #[test]
    fn test_progress_advances_to_total() {
        let mut progress = LoadProgress::new(3);
        assert_eq!(progress.percent(), 0.0);
        progress.advance().unwrap();
        progress.advance().unwrap();
        progress.advance().unwrap();
        assert!(progress.is_complete());
        assert_eq!(progress.percent(), 100.0);
        assert!(progress.advance().is_err());
        assert_eq!(progress.loaded_count(), 3);
    }

    #[test]
    fn test_slot_lookup() {
        let d = digits(1, 2, 3);
        let values: Vec<u8> = DigitSlot::ALL.iter().map(|s| d.get(*s)).collect();
        assert_eq!(values, vec![1, 2, 3]);
        assert_eq!(DigitSlot::Ten.data_ui(), "preloader-count-digit-ten");
    }
}
