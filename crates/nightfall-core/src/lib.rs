pub mod block;
pub mod blocks;
pub mod consts;
pub mod error;
pub mod image;
pub mod io;
pub mod pipeline;
pub mod registry;
pub mod stack;
pub mod value;
