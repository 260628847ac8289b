//! Slice file naming: `prefix + digits + extension`.
//!
//! Inputs are ordered by the parsed numeric index, never by directory
//! order. Outputs reuse the first input's prefix and extension, number
//! consecutively from the first input's index, and zero-pad to at least
//! [`MIN_PAD`] digits.

/// Extensions recognized as slice images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "bmp"];

/// Minimum zero-padding of output indices.
pub const MIN_PAD: usize = 3;

/// A parsed slice file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceName {
    /// Everything before the trailing digit run of the stem.
    pub prefix: String,
    /// The trailing digit run, parsed.
    pub index: u64,
    /// Length of the digit run as written.
    pub digits: usize,
    /// Extension without the dot, as written.
    pub extension: String,
}

impl SliceName {
    /// Parse `file_name`, returning `None` unless it is an image file
    /// whose stem ends in digits.
    #[must_use]
    pub fn parse(file_name: &str) -> Option<Self> {
        let (stem, extension) = file_name.rsplit_once('.')?;
        if !IMAGE_EXTENSIONS
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
        {
            return None;
        }
        let prefix = stem.trim_end_matches(|c: char| c.is_ascii_digit());
        let digits = &stem[prefix.len()..];
        if digits.is_empty() {
            return None;
        }
        Some(Self {
            prefix: prefix.to_string(),
            index: digits.parse().ok()?,
            digits: digits.len(),
            extension: extension.to_string(),
        })
    }
}

/// How output slices are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNaming {
    /// Shared prefix.
    pub prefix: String,
    /// Shared extension.
    pub extension: String,
    /// Index of the first output slice.
    pub first_index: u64,
    /// Zero-padding width.
    pub pad: usize,
}

impl OutputNaming {
    /// Naming for `count` outputs mirroring the sorted `inputs`.
    ///
    /// Returns `None` when `inputs` is empty.
    #[must_use]
    pub fn for_inputs(inputs: &[SliceName], count: usize) -> Option<Self> {
        let first = inputs.first()?;
        let steps = u64::try_from(count.saturating_sub(1)).unwrap_or(u64::MAX);
        let last_index = first.index.saturating_add(steps);
        Some(Self {
            prefix: first.prefix.clone(),
            extension: first.extension.clone(),
            first_index: first.index,
            pad: MIN_PAD.max(decimal_digits(last_index)),
        })
    }

    /// File name for the output at `position` (0-based).
    #[must_use]
    pub fn file_name(&self, position: usize) -> String {
        let offset = u64::try_from(position).unwrap_or(u64::MAX);
        let index = self.first_index.saturating_add(offset);
        format!(
            "{}{index:0pad$}.{}",
            self.prefix,
            self.extension,
            pad = self.pad
        )
    }
}

const fn decimal_digits(mut n: u64) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefix_digits_extension() {
        let name = SliceName::parse("chapter_01_0042.PNG").unwrap();
        assert_eq!(name.prefix, "chapter_01_");
        assert_eq!(name.index, 42);
        assert_eq!(name.digits, 4);
        assert_eq!(name.extension, "PNG");
    }

    #[test]
    fn rejects_unindexed_and_non_image_names() {
        assert_eq!(SliceName::parse("cover.png"), None);
        assert_eq!(SliceName::parse("notes12.txt"), None);
        assert_eq!(SliceName::parse("12"), None);
    }

    #[test]
    fn bare_digits_have_empty_prefix() {
        let name = SliceName::parse("7.jpg").unwrap();
        assert_eq!(name.prefix, "");
        assert_eq!(name.index, 7);
    }

    #[test]
    fn output_pads_to_at_least_three() {
        let inputs = vec![SliceName::parse("p5.webp").unwrap()];
        let naming = OutputNaming::for_inputs(&inputs, 4).unwrap();
        assert_eq!(naming.file_name(0), "p005.webp");
        assert_eq!(naming.file_name(3), "p008.webp");
    }

    #[test]
    fn output_pads_to_largest_index() {
        let inputs = vec![SliceName::parse("img_998.png").unwrap()];
        let naming = OutputNaming::for_inputs(&inputs, 5).unwrap();
        assert_eq!(naming.pad, 4);
        assert_eq!(naming.file_name(0), "img_0998.png");
        assert_eq!(naming.file_name(4), "img_1002.png");
    }

    #[test]
    fn no_inputs_no_naming() {
        assert_eq!(OutputNaming::for_inputs(&[], 3), None);
    }
}
