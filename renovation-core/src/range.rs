use regex::Regex;
use std::sync::LazyLock;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("valid number pattern"));

/// Inclusive square-footage band chosen in the wizard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SquareFootageRange {
    pub low: f64,
    pub high: f64,
}

impl SquareFootageRange {
    /// Parses wizard labels such as `"100-200 sq ft"`, `"Under 50 sq ft"` or
    /// `"2,000+ sq ft"`. Returns `None` for labels without a usable number.
    pub fn parse(label: &str) -> Option<Self> {
        let numbers: Vec<f64> = NUMBER
            .find_iter(label)
            .filter_map(|m| m.as_str().replace(',', "").parse::<f64>().ok())
            .filter(|n| n.is_finite())
            .collect();

        let lowered = label.to_ascii_lowercase();
        match numbers.as_slice() {
            [] => None,
            [x] if lowered.contains("under")
                || lowered.contains("less than")
                || lowered.contains('<') =>
            {
                Some(Self::new(x / 2.0, *x))
            }
            [x] if lowered.contains('+')
                || lowered.contains("over")
                || lowered.contains("more than") =>
            {
                Some(Self::new(*x, x * 1.5))
            }
            [x] => Some(Self::new(*x, *x)),
            [a, b, ..] => Some(Self::new(*a, *b)),
        }
    }

    fn new(a: f64, b: f64) -> Self {
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }

    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) / 2.0
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.low, self.high)
    }
}
