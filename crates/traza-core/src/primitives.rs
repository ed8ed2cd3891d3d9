//! # Primitives
//!
//! Hardcoded limits of the Traza engine.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! They mirror the request limits enforced at the boundary of the
//! accreditation platform so that library callers see the same rules.

// =============================================================================
// RELATION METADATA
// =============================================================================

/// Minimum length of a relation justification, in characters.
pub const JUSTIFICATION_MIN_LEN: usize = 10;

/// Maximum length of a relation justification, in characters.
pub const JUSTIFICATION_MAX_LEN: usize = 1000;

// =============================================================================
// BATCH LIMITS
// =============================================================================

/// Maximum number of candidates in a single batch creation call.
///
/// Larger requests are rejected as a whole before any validation runs. The
/// same limit applies to all three relation kinds.
pub const MAX_BATCH_SIZE: usize = 50;

// =============================================================================
// STATISTICS
// =============================================================================

/// Coverage is stored as an integer number of hundredths of a percent.
///
/// `10_000` hundredths == 100.00%.
pub const COVERAGE_SCALE: u64 = 10_000;
