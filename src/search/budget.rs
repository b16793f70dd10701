//! Budget bands as labelled in the artist search UI.
//!
//! Labels use dot thousands separators and a trailing currency:
//! `"200.000 VND - 300.000 VND"`, `"Dưới 200.000 VND"`, `"Trên 2.000.000 VND"`.

use std::fmt;
use std::str::FromStr;

use crate::errors::ClientError;

const BELOW: &str = "dưới";
const ABOVE: &str = "trên";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Range {
    /// Inclusive on both ends.
    Between(u64, u64),
    Below(u64),
    Above(u64),
}

/// One selectable price band, in VND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetBand {
    label: String,
    range: Range,
}

impl BudgetBand {
    pub fn between(min: u64, max: u64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            label: format!("{} VND - {} VND", format_vnd(min), format_vnd(max)),
            range: Range::Between(min, max),
        }
    }

    pub fn below(max: u64) -> Self {
        Self {
            label: format!("Dưới {} VND", format_vnd(max)),
            range: Range::Below(max),
        }
    }

    pub fn above(min: u64) -> Self {
        Self {
            label: format!("Trên {} VND", format_vnd(min)),
            range: Range::Above(min),
        }
    }

    /// The label sent to the server.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn contains(&self, price: u64) -> bool {
        match self.range {
            Range::Between(min, max) => (min..=max).contains(&price),
            Range::Below(max) => price < max,
            Range::Above(min) => price > min,
        }
    }
}

impl FromStr for BudgetBand {
    type Err = ClientError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let trimmed = label.trim();
        let lowered = trimmed.to_lowercase();

        let range = if let Some(rest) = lowered.strip_prefix(BELOW) {
            Range::Below(parse_amount(rest)?)
        } else if let Some(rest) = lowered.strip_prefix(ABOVE) {
            Range::Above(parse_amount(rest)?)
        } else {
            let (min, max) = lowered.split_once('-').ok_or_else(|| {
                ClientError::Validation(format!("Unrecognized budget band: {}", label))
            })?;
            let (min, max) = (parse_amount(min)?, parse_amount(max)?);
            if min > max {
                return Err(ClientError::Validation(format!(
                    "Budget band bounds are reversed: {}",
                    label
                )));
            }
            Range::Between(min, max)
        };

        Ok(Self {
            label: trimmed.to_string(),
            range,
        })
    }
}

impl fmt::Display for BudgetBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

fn parse_amount(text: &str) -> Result<u64, ClientError> {
    let digits: String = text
        .trim()
        .trim_end_matches("vnd")
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | ' '))
        .collect();
    digits
        .parse()
        .map_err(|_| ClientError::Validation(format!("Invalid amount: {}", text.trim())))
}

/// `1200000` -> `"1.200.000"`.
fn format_vnd(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_closed_band() {
        let band: BudgetBand = "200.000 VND - 300.000 VND".parse().unwrap();
        assert!(band.contains(200_000));
        assert!(band.contains(250_000));
        assert!(band.contains(300_000));
        assert!(!band.contains(300_001));
        assert_eq!(band.label(), "200.000 VND - 300.000 VND");
    }

    #[test]
    fn test_parse_open_bands() {
        let below: BudgetBand = "Dưới 200.000 VND".parse().unwrap();
        assert!(below.contains(199_000));
        assert!(!below.contains(200_000));

        let above: BudgetBand = "Trên 2.000.000 VND".parse().unwrap();
        assert!(above.contains(2_500_000));
        assert!(!above.contains(2_000_000));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            "cheap".parse::<BudgetBand>(),
            Err(ClientError::Validation(_))
        ));
        assert!("300.000 VND - 200.000 VND".parse::<BudgetBand>().is_err());
    }

    #[test]
    fn test_constructed_labels_round_trip() {
        let band = BudgetBand::between(800_000, 1_200_000);
        assert_eq!(band.label(), "800.000 VND - 1.200.000 VND");
        assert_eq!(band.label().parse::<BudgetBand>().unwrap(), band);
        assert_eq!(BudgetBand::below(200_000).to_string(), "Dưới 200.000 VND");
    }
}
