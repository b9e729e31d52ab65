pub mod format;
pub mod error;
pub mod header;
pub mod transform;
pub mod index;
pub mod source;
pub mod io_stream;
pub mod archive;

pub use error::{Result, TcfError};
pub use header::Header;
pub use index::{Entry, Index};
pub use io_stream::{TcfReader, TcfWriter};
pub use archive::{inspect, list, pack, unpack, verify, PackOptions, PackSummary};
