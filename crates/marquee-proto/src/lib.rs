//! Shared pieces of mpd-marquee: configuration, protocol types, the label
//! builder and the circular scroller.

pub mod config;
pub mod error;
pub mod label;
pub mod platform;
pub mod protocol;
pub mod scroll;
pub mod source;
pub mod state;
