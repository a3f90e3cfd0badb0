//! Typed, checksummed command messages over TCP and UDP.
//!
//! A message is one command byte plus an ordered list of typed arguments
//! (integers, floats, booleans, strings, byte arrays). netcomm frames it with
//! SOH/STX/ETX/EOT markers and an XOR checksum, parses it back incrementally
//! from arbitrarily fragmented reads, and runs one receive thread per socket
//! with stall detection for frames that stop halfway.
//!
//! # Crate Structure
//!
//! - [`transport`]: blocking TCP/UDP sockets and endpoint addresses
//! - [`frame`]: typed values, frame builder, incremental parser
//! - [`peer`]: connection and listener workers (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use netcomm_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use netcomm_frame::*;
}

/// Re-export connection types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use netcomm_peer::*;
}
