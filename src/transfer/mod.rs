//! The transfer protocol: frame codec, sending client, receiving server

mod client;
mod framing;
mod server;

pub use client::{SendReport, TransferClient};
pub use framing::{read_frame, write_frame, FrameLimits, TransferFrame};
pub use server::{ServerOptions, TransferServer};
