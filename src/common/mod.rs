pub mod bitstream;
pub mod gf;
pub mod rs;

pub(crate) use bitstream::*;
pub(crate) use gf::*;
pub(crate) use rs::*;
