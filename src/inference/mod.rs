pub mod bi_encoder;

pub use bi_encoder::{normalize_rows, BiEncoderModel};
