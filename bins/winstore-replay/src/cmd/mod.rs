pub mod decode;
pub mod replay;
