//! I/O buffer sizes shared by the VCF and GFF3 codecs.

/// Output buffer for annotated VCF (2 MB).
pub const DEFAULT_OUTPUT_BUFFER: usize = 2 * 1024 * 1024;

/// Input buffer for VCF and GFF3 readers (256 KB).
pub const DEFAULT_INPUT_BUFFER: usize = 256 * 1024;

/// Initial capacity of the reusable line buffer. VCF lines with many
/// samples grow it on first use.
pub const DEFAULT_LINE_BUFFER: usize = 1024;
