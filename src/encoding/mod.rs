//! Binary encoding for node contents and account records.

mod rlp;

pub use rlp::{RlpDecoder, RlpEncoder, RlpError, RlpItem};
