//! Error taxonomy for the programmer. Each variant corresponds to one of the
//! failure classes a run of `ujprog` could exit with; `exit_code()` is used
//! by `main` to preserve the "0 success, non-zero failure" contract.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProgError {
    /// No JTAG cable could be opened (neither USB nor, where supported, PPI).
    #[error("Cannot find JTAG cable.")]
    NoCable,

    /// A write or read to the cable failed, or returned a short count.
    #[error("{0}")]
    CableIo(String),

    /// SVF tokenisation, parenthesis or hex-field error.
    #[error("{0}")]
    BadSvf(String),

    /// A recognised SVF keyword was used with rejected arguments.
    #[error("{0}")]
    Invalid(String),

    /// An unrecognised SVF keyword was encountered.
    #[error("{0}")]
    Unsupported(String),

    /// The JED bitstream is structurally invalid.
    #[error("Invalid bitstream file: {0}")]
    BadBitstream(String),

    /// The JED file names a device not present in the device table.
    #[error("Bitstream for unsupported target: {0}")]
    UnsupportedTarget(String),

    /// TDO readback did not match the expected value under MASK.
    #[error(
        "Received and expected data do not match!\nTDO: {received} Expected: {expected}{}",
        .mask.as_deref().map(|m| format!(" mask: {m}")).unwrap_or_default()
    )]
    CompareFail {
        received: String,
        expected: String,
        mask: Option<String>,
    },

    /// The TAP engine was asked for a transition it does not know how to make.
    #[error("Don't know how to proceed: {from} -> {to}")]
    TapStuck { from: String, to: String },
}

impl ProgError {
    /// Exit code to use from `main`. The original tool only ever exits 0 or
    /// 1; we keep that contract rather than inventing a code-per-variant
    /// scheme the spec does not call for.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

pub type Result<T> = std::result::Result<T, ProgError>;
