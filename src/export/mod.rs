// SPDX-License-Identifier: Apache-2.0

pub mod csv;
pub mod dump;
pub mod import;

pub use csv::table_to_csv;
pub use dump::database_to_sql;
pub use import::import_sql;
