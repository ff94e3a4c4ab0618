//! A pure Rust implementation of the MikroTik RouterOS management API
//! protocol, for talking to a single router over TCP or TLS.
//!
//! ```no_run
//! use routeros::{Client, ClientOptions};
//!
//! fn main() -> routeros::Result<()> {
//!     let mut client = Client::new(ClientOptions::new("192.168.88.1"));
//!     client.connect()?;
//!     client.login("admin", "password")?;
//!
//!     for interface in client.run_command("/interface/print", &[])? {
//!         println!("{:?}", interface.get("name"));
//!     }
//!
//!     client.close()
//! }
//! ```

#![warn(
    anonymous_parameters,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_qualifications,
    variant_size_differences
)]

pub mod client;
pub mod protocol;

pub use client::{
    Client, ClientError, ClientOptions, Emitter, Event, EventKind, Listener, Result,
};
pub use protocol::{Record, Sentence};
