// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use std::{fmt, sync::Arc};

use bitvec::prelude::*;

use crate::{error::DecodeError, io::ParseBuf};

use super::{
    events::TableContext,
    fields::{ColumnDescriptor, Value},
};

/// Representation of a binlog row.
///
/// Values are aligned to the used columns of the rows event the row belongs to.
#[derive(Clone, PartialEq)]
pub struct BinlogRow {
    values: Vec<Option<Value>>,
    columns: Arc<[ColumnDescriptor]>,
}

impl BinlogRow {
    pub fn new(values: Vec<Option<Value>>, columns: Arc<[ColumnDescriptor]>) -> Self {
        Self { values, columns }
    }

    /// Returns length of a row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the row has a length of 0.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns columns of this row.
    pub fn columns_ref(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Returns columns of this row.
    pub fn columns(&self) -> Arc<[ColumnDescriptor]> {
        self.columns.clone()
    }

    /// Returns reference to the value at `index` if it exists and wasn't taken
    /// by `BinlogRow::take` method.
    pub fn as_ref(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(|x| x.as_ref())
    }

    /// Returns the value of the table column `column` if this row has it.
    pub fn get_by_column(&self, column: usize) -> Option<&Value> {
        self.columns
            .iter()
            .position(|x| x.index() == column)
            .and_then(|i| self.as_ref(i))
    }

    /// Takes the value at `index` if it exists and wasn't taken earlier.
    pub fn take(&mut self, index: usize) -> Option<Value> {
        self.values.get_mut(index).and_then(|x| x.take())
    }

    /// Unwraps values of a row. Taken values are `None`.
    pub fn into_values(self) -> Vec<Option<Value>> {
        self.values
    }

    /// Reads a single row image: a null bitmap over `columns` followed by every
    /// non-null value.
    pub(crate) fn read(
        buf: &mut ParseBuf<'_>,
        columns: &Arc<[ColumnDescriptor]>,
        table: &TableContext,
    ) -> Result<Self, DecodeError> {
        let null_bitmap = buf.eat((columns.len() + 7) / 8)?;
        let null_bitmap = null_bitmap.view_bits::<Lsb0>();

        let mut values = Vec::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if null_bitmap[i] {
                if !column.is_nullable() {
                    return Err(DecodeError::NullInNonNullableColumn {
                        table: table.table().into_owned(),
                        column: column.index(),
                    });
                }
                values.push(Some(Value::Null));
            } else {
                values.push(Some(column.parse_value(buf)?));
            }
        }

        Ok(BinlogRow::new(values, columns.clone()))
    }
}

impl fmt::Debug for BinlogRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("BinlogRow");
        for (val, column) in self.values.iter().zip(self.columns.iter()) {
            // column name – `@<i>` where i is a column offset in a table
            let name = format!("@{}", column.index());
            match *val {
                Some(ref val) => {
                    debug.field(&name, val);
                }
                None => {
                    debug.field(&name, &"<taken>");
                }
            }
        }
        debug.finish()
    }
}
