// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use std::{borrow::Cow, convert::TryFrom};

use crate::{
    binlog::raw::RawEvent,
    constants::StatusVarKey,
    error::DecodeError,
    io::ParseBuf,
};

/// Maximum number of updated databases listed in a query event.
const MAX_DBS_IN_EVENT_MTS: u8 = 16;
/// Updated databases count meaning "too many to list".
const OVER_MAX_DBS_IN_EVENT_MTS: u8 = 254;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AutoIncrement {
    pub increment: u16,
    pub offset: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Charset {
    pub client: u16,
    pub connection: u16,
    pub server: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Invoker {
    pub user: Vec<u8>,
    pub host: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UpdatedDbNames {
    Names(Vec<Vec<u8>>),
    /// More databases were updated than a query event can list.
    TooMany,
}

/// Status variables of a query event. Absent variables are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StatusVars {
    pub flags2: Option<u32>,
    pub sql_mode: Option<u64>,
    pub catalog: Option<Vec<u8>>,
    pub auto_increment: Option<AutoIncrement>,
    pub charset: Option<Charset>,
    pub time_zone: Option<Vec<u8>>,
    pub lc_time_names: Option<u16>,
    pub charset_database: Option<u16>,
    pub table_map_for_update: Option<u64>,
    pub master_data_written: Option<u32>,
    pub invoker: Option<Invoker>,
    pub updated_db_names: Option<UpdatedDbNames>,
    pub microseconds: Option<u32>,
    pub explicit_defaults_for_timestamp: Option<u8>,
    pub ddl_logged_with_xid: Option<u64>,
    pub default_collation_for_utf8mb4: Option<u16>,
    pub sql_require_primary_key: Option<u8>,
    pub default_table_encryption: Option<u8>,
}

impl StatusVars {
    /// Parses a status variables block. Unknown keys are an error since their size
    /// can't be known.
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut buf = ParseBuf(bytes);
        let mut vars = StatusVars::default();

        while !buf.is_empty() {
            let code = buf.eat_u8()?;
            let key = StatusVarKey::try_from(code)
                .map_err(|_| DecodeError::UnknownStatusVar(code))?;
            match key {
                StatusVarKey::Flags2 => vars.flags2 = Some(buf.eat_u32_le()?),
                StatusVarKey::SqlMode => vars.sql_mode = Some(buf.eat_u64_le()?),
                StatusVarKey::Catalog => {
                    let catalog = buf.eat_u8_str()?;
                    if buf.eat_u8()? != 0 {
                        return Err(DecodeError::invalid("catalog is not null-terminated"));
                    }
                    vars.catalog = Some(catalog.to_vec());
                }
                StatusVarKey::AutoIncrement => {
                    vars.auto_increment = Some(AutoIncrement {
                        increment: buf.eat_u16_le()?,
                        offset: buf.eat_u16_le()?,
                    })
                }
                StatusVarKey::Charset => {
                    vars.charset = Some(Charset {
                        client: buf.eat_u16_le()?,
                        connection: buf.eat_u16_le()?,
                        server: buf.eat_u16_le()?,
                    })
                }
                StatusVarKey::TimeZone => vars.time_zone = Some(buf.eat_u8_str()?.to_vec()),
                StatusVarKey::CatalogNz => vars.catalog = Some(buf.eat_u8_str()?.to_vec()),
                StatusVarKey::LcTimeNames => vars.lc_time_names = Some(buf.eat_u16_le()?),
                StatusVarKey::CharsetDatabase => {
                    vars.charset_database = Some(buf.eat_u16_le()?)
                }
                StatusVarKey::TableMapForUpdate => {
                    vars.table_map_for_update = Some(buf.eat_u64_le()?)
                }
                StatusVarKey::MasterDataWritten => {
                    vars.master_data_written = Some(buf.eat_u32_le()?)
                }
                StatusVarKey::Invoker => {
                    vars.invoker = Some(Invoker {
                        user: buf.eat_u8_str()?.to_vec(),
                        host: buf.eat_u8_str()?.to_vec(),
                    })
                }
                StatusVarKey::UpdatedDbNames => {
                    let count = buf.eat_u8()?;
                    vars.updated_db_names = Some(if count == OVER_MAX_DBS_IN_EVENT_MTS {
                        UpdatedDbNames::TooMany
                    } else if count > MAX_DBS_IN_EVENT_MTS {
                        return Err(DecodeError::Invalid(format!(
                            "invalid updated databases count {}",
                            count
                        )));
                    } else {
                        let mut names = Vec::with_capacity(count as usize);
                        for _ in 0..count {
                            names.push(buf.eat_null_str()?.to_vec());
                        }
                        UpdatedDbNames::Names(names)
                    });
                }
                StatusVarKey::Microseconds => vars.microseconds = Some(buf.eat_u24_le()?),
                StatusVarKey::ExplicitDefaultsForTimestamp => {
                    vars.explicit_defaults_for_timestamp = Some(buf.eat_u8()?)
                }
                StatusVarKey::DdlLoggedWithXid => {
                    vars.ddl_logged_with_xid = Some(buf.eat_u64_le()?)
                }
                StatusVarKey::DefaultCollationForUtf8mb4 => {
                    vars.default_collation_for_utf8mb4 = Some(buf.eat_u16_le()?)
                }
                StatusVarKey::SqlRequirePrimaryKey => {
                    vars.sql_require_primary_key = Some(buf.eat_u8()?)
                }
                StatusVarKey::DefaultTableEncryption => {
                    vars.default_table_encryption = Some(buf.eat_u8()?)
                }
                StatusVarKey::CommitTs | StatusVarKey::CommitTs2 => {
                    return Err(DecodeError::UnknownStatusVar(code))
                }
            }
        }

        Ok(vars)
    }
}

/// A query event is created for each query that modifies the database,
/// unless the query is logged row-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryEvent {
    thread_id: u32,
    execution_time: u32,
    error_code: u16,
    status_vars_raw: Vec<u8>,
    status_vars: StatusVars,
    schema: Vec<u8>,
    query: Vec<u8>,
}

impl QueryEvent {
    /// Thread id, execution time, schema length, error code, status vars length.
    pub const POST_HEADER_LEN: usize = 4 + 4 + 1 + 2 + 2;

    pub fn parse(raw: &RawEvent) -> Result<Self, DecodeError> {
        let mut fixed = ParseBuf(raw.fixed_length_data());
        let thread_id = fixed.eat_u32_le()?;
        let execution_time = fixed.eat_u32_le()?;
        let schema_len = fixed.eat_u8()? as usize;
        let error_code = fixed.eat_u16_le()?;
        let status_vars_len = fixed.eat_u16_le()? as usize;

        let mut buf = ParseBuf(raw.variable_length_data());
        if status_vars_len + schema_len + 1 > buf.len() {
            return Err(DecodeError::NotEnoughBytes {
                needed: status_vars_len + schema_len + 1,
                available: buf.len(),
            });
        }
        let status_vars_raw = buf.eat(status_vars_len)?;
        let status_vars = StatusVars::parse(status_vars_raw)?;
        let schema = buf.eat(schema_len)?.to_vec();
        if buf.eat_u8()? != 0 {
            return Err(DecodeError::invalid("schema name is not null-terminated"));
        }
        let query = buf.eat_all().to_vec();

        Ok(Self {
            thread_id,
            execution_time,
            error_code,
            status_vars_raw: status_vars_raw.to_vec(),
            status_vars,
            schema,
            query,
        })
    }

    /// Id of the thread that issued this statement.
    pub fn thread_id(&self) -> u32 {
        self.thread_id
    }

    /// Seconds from the statement start to the time it was written to the binlog.
    pub fn execution_time(&self) -> u32 {
        self.execution_time
    }

    pub fn error_code(&self) -> u16 {
        self.error_code
    }

    pub fn status_vars(&self) -> &StatusVars {
        &self.status_vars
    }

    pub fn status_vars_raw(&self) -> &[u8] {
        &self.status_vars_raw
    }

    /// Returns the default database as a byte slice.
    pub fn schema_raw(&self) -> &[u8] {
        &self.schema
    }

    /// Returns the default database as a string (lossy converted).
    pub fn schema(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.schema)
    }

    pub fn query_raw(&self) -> &[u8] {
        &self.query
    }

    pub fn query(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.query)
    }
}
