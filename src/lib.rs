//! Work time tracker. A small daemon keeps the only copy of today's state, counts time while
//! you work and keeps a human readable history of every change. The cli talks to it over a
//! loopback socket.

pub mod cli;
pub mod daemon;
pub mod storage;
pub mod tracker;
pub mod utils;
