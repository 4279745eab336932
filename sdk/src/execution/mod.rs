//! # Execution Module
//!
//! Submitting frozen transactions to the network and surviving node
//! failures along the way.
//!
//! ## Architecture
//!
//! ```text
//! transport.rs   — Transport trait (send bytes to one node) and TcpTransport
//! status.rs      — remote Status codes, NodeResponse decoding
//! executable.rs  — Executable trait, Executor retry loop, ExecuteError
//! metrics.rs     — Prometheus counters for the retry loop
//! ```
//!
//! ## Outcome Classification
//!
//! | Outcome                         | Node health     | Engine                    |
//! |---------------------------------|-----------------|---------------------------|
//! | transport error / bad response  | failure         | back off, try next node   |
//! | transient status (`BUSY`, ...)  | failure         | back off, try next node   |
//! | any other non-`OK` status       | success         | stop, return `Rejected`   |
//! | `OK`                            | success         | stop, return the response |

pub mod executable;
pub mod metrics;
pub mod status;
pub mod transport;

pub use executable::{
    AttemptError, Executable, ExecuteError, ExecuteOptions, ExecutionState, Executor,
    TransactionResponse,
};
pub use metrics::ExecutionMetrics;
pub use status::{NodeResponse, Status};
pub use transport::{read_frame, write_frame, TcpTransport, Transport, TransportError};
