// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Reader of MySql binary logs, relay logs and replication streams.
//!
//! The crate turns a stream of bytes into typed events: format descriptions,
//! queries, transaction markers, GTIDs, table maps and row changes. Readers are
//! pull based and resumable: a read that runs out of bytes returns
//! [`Error::NotYetAvailable`] and a repeated call continues where it stopped.
//!
//! ```no_run
//! use mysql_binlog_stream::binlog::{EventData, EventReader, LogStreamConfig, LogStreamEventReader};
//!
//! # fn main() -> mysql_binlog_stream::Result<()> {
//! let config = LogStreamConfig::new("/var/lib/mysql", "mysql-bin.").with_start_file_num(1);
//! let mut reader = LogStreamEventReader::new(config);
//! loop {
//!     match reader.next_event() {
//!         Ok(decoded) => {
//!             if let EventData::Query(query) = decoded.event.data() {
//!                 println!("{}", query.query());
//!             }
//!         }
//!         Err(err) if err.is_retryable() => std::thread::sleep(std::time::Duration::from_secs(1)),
//!         Err(err) => return Err(err),
//!     }
//! }
//! # }
//! ```

pub mod binlog;
pub mod constants;
pub mod error;
pub mod io;
pub mod source;

pub use crate::error::{DecodeError, Error, Result};
