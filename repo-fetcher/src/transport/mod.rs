pub mod https;
pub mod rrdp;
pub mod rsync;

pub use https::HttpsTransport;
pub use rrdp::{RrdpTransport, Snapshot};
pub use rsync::RsyncTransport;
