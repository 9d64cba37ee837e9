pub mod swiss;

pub use swiss::{generate_round, Pairing, PairingHistory, PairingOptions, SwissPlayer};
