use std::{fmt::Display, ops::Deref};

use chrono::Duration;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percentage(f64);

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

impl Percentage {
    pub fn new_opt(value: f64) -> Option<Percentage> {
        if value < 0. {
            None
        } else {
            Some(Percentage(value))
        }
    }
}

impl Deref for Percentage {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub fn duration_percentage(value: Duration, whole: Duration) -> Percentage {
    Percentage::new_opt(value.num_seconds() as f64 / whole.num_seconds() as f64 * 100.)
        .expect("Percentage should always be at least 0")
}

/// Share of `part` in `whole`, as used for response rates. A whole of zero is
/// reported as 0% instead of a division error.
pub fn count_percentage(part: u32, whole: u32) -> Percentage {
    if whole == 0 {
        Percentage(0.)
    } else {
        Percentage(part as f64 / whole as f64 * 100.)
    }
}

#[cfg(test)]
mod tests {
    use super::count_percentage;

    #[test]
    fn test_count_percentage_zero_whole() {
        assert_eq!(*count_percentage(5, 0), 0.);
    }

    #[test]
    fn test_count_percentage_half() {
        assert_eq!(*count_percentage(2, 4), 50.);
    }
}
