//! # Events Module
//!
//! Progress reporting for ingestion and bulk scans.
//!
//! ## Design
//! The core library emits events through channels, so the CLI (or any
//! other front end) can subscribe without the engine knowing about it.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = event_channel();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Scan(ScanEvent::Progress(p)) = event {
//!             println!("{}/{}", p.processed, p.total);
//!         }
//!     }
//! });
//!
//! let scanner = BatchScanner::builder().events(sender).build()?;
//! ```

mod channel;
mod types;

pub use channel::{event_channel, EventReceiver, EventSender};
pub use types::*;
