//! File transfers: uploads into the store and downloads out of it

mod download;
mod helpers;
mod upload;

pub use download::ChunkStream;
pub use upload::UploadFrame;

pub(crate) use download::open_download;
pub(crate) use helpers::generate_transfer_id;
pub(crate) use upload::receive_upload;
