//! Request shaping: options, descriptors and the per-operation builders.

pub mod builder;
pub mod descriptor;
pub mod filter;
pub mod options;

pub use builder::{
    build_delete, build_get, build_list_keys, build_move, build_post, build_put, build_upload,
    key_path,
};
pub use descriptor::{Body, FilePart, RequestDescriptor};
pub use filter::KeyFilter;
pub use options::{GetOptions, PostOptions, PutOptions, TransmissionFlags};
