pub mod bgp;
pub mod codec;
pub mod config;
pub mod feedback;
pub mod fields;
pub mod log;
pub mod mutation;
pub mod oracle;
pub mod transport;
pub mod tree;

pub use config::FuzzConfig;
pub use feedback::{Feedback, UniqueResponseFeedback};
pub use fields::{FieldKind, IpPrefix, LeafValue, LengthField};
pub use mutation::{MutationRecord, MutationWeights, Mutator, WeightedFieldMutator};
pub use oracle::{BugReport, Oracle, SessionOracle};
pub use transport::{FileTransport, RecordingTransport, SendStatus, TcpTransport, Transport};
pub use tree::{FieldError, FieldTree, NodeId};
