//! Bundle boundary arithmetic.

/// Number of consecutive block numbers covered by one merged file.
pub const BUNDLE_SIZE: u64 = 100;

/// Floor of the bundle containing `number`.
pub fn lower_boundary(number: u64) -> u64 {
    number - (number % BUNDLE_SIZE)
}

/// Canonical merged file name for a bundle: 10-digit, zero-padded low boundary.
///
/// Extensions are the store's business, see [`crate::store::KeyBuilder`].
pub fn bundle_filename(low_boundary: u64) -> String {
    format!("{:010}", low_boundary)
}

/// Last block number belonging to the bundle starting at `low_boundary`.
///
/// The topmost bundle is cut short at `u64::MAX`.
pub(crate) fn last_in_bundle(low_boundary: u64) -> u64 {
    low_boundary.saturating_add(BUNDLE_SIZE - 1)
}
